//! Annex upload tray.
//!
//! Files are accepted as multipart, registered in the console's tray and
//! forwarded to the file service in the background.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::client::AnnexUpload;
use crate::client::upload::{UploadEntry, UploadError, UploadStatus, run_upload};
use crate::console;
use crate::error::{AppError, AppResult};
use crate::gate::require_session_marker;
use crate::state::AppState;

/// Headroom for multipart framing on top of the file bytes.
const BODY_SLACK: usize = 64 * 1024;

/// Create the uploads router.
pub fn router(state: AppState) -> Router<AppState> {
    let limit = usize::try_from(state.config().upload_max_total_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_SLACK);

    Router::new()
        .route("/api/uploads", get(list).post(upload))
        .route("/api/uploads/{id}/cancel", post(cancel))
        .route("/api/uploads/{id}", delete(remove))
        .layer(DefaultBodyLimit::max(limit))
        .route_layer(from_fn_with_state(state, require_session_marker))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    entries: Vec<UploadEntry>,
}

/// GET /api/uploads
async fn list(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<UploadResponse>> {
    let context = state.console(&session).await?;
    let uploads = context.read().uploads();
    Ok(Json(UploadResponse {
        entries: uploads.list(),
    }))
}

struct PendingFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// POST /api/uploads
///
/// Form fields: `object`, `objectFieldId`, `fkId`, `cName`, and one or
/// more `file` parts.
async fn upload(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let context = state.console(&session).await?;

    let mut related_object = String::new();
    let mut related_field = String::new();
    let mut related_id = String::new();
    let mut custom_name = String::new();
    let mut files = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed upload form");
                return Err(AppError::BadRequest("Failed to read upload form".to_string()));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            match field.bytes().await {
                Ok(bytes) => files.push(PendingFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                }),
                Err(e) => {
                    warn!(error = %e, "failed to read upload data");
                    return Err(AppError::BadRequest("Failed to read file data".to_string()));
                }
            }
            continue;
        }

        let value = field.text().await.unwrap_or_default();
        match name.as_str() {
            "object" => related_object = value,
            "objectFieldId" => related_field = value,
            "fkId" => related_id = value,
            "cName" => custom_name = value,
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No file provided".to_string()));
    }

    let (tracker, token) = {
        let ctx = context.read();
        (ctx.uploads(), ctx.token().to_string())
    };

    let mut accepted = Vec::with_capacity(files.len());
    for file in files {
        let size = file.bytes.len() as u64;
        let (id, cancel) = match tracker.register(file.file_name.clone(), size) {
            Ok(registered) => registered,
            Err(e) => {
                debug!(file = %file.file_name, error = %e, "upload refused");
                state.metrics().record_upload("refused");
                return Err(e.into());
            }
        };

        let name = if custom_name.is_empty() {
            file.file_name.clone()
        } else {
            custom_name.clone()
        };
        let upload = AnnexUpload {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
            related_object: related_object.clone(),
            related_field: related_field.clone(),
            related_id: related_id.clone(),
            custom_name: name,
        };

        let task_state = state.clone();
        let task_tracker = tracker.clone();
        let task_context = context.clone();
        let task_session = session.clone();
        let api = state.api_handle();
        let task_token = token.clone();
        tokio::spawn(async move {
            let result = run_upload(task_tracker, api, task_token, id, cancel, upload).await;
            let status = match result {
                Ok(status) => status,
                Err(e) => {
                    // Runs after the response, so the record is saved explicitly.
                    console::expire_session(&task_context, &task_session, &e).await;
                    if let Err(e) = task_session.save().await {
                        error!(error = %e, "failed to save expired session");
                    }
                    UploadStatus::Failed
                }
            };
            task_state.metrics().record_upload(status.as_str());
        });

        if let Some(entry) = tracker.get(id) {
            accepted.push(entry);
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse { entries: accepted }),
    )
        .into_response())
}

/// POST /api/uploads/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let context = state.console(&session).await?;
    let tracker = context.read().uploads();

    tracker.cancel(id)?;
    Ok(match tracker.get(id) {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /api/uploads/{id}
///
/// Removes the file from the tray and soft-deletes it upstream if it
/// had already been stored.
async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let context = state.console(&session).await?;
    let (tracker, token) = {
        let ctx = context.read();
        (ctx.uploads(), ctx.token().to_string())
    };

    let entry = tracker.remove(id).ok_or(UploadError::Unknown(id))?;

    if let Some(annex_id) = &entry.annex_id
        && let Err(e) = state.api().delete_annex(&token, annex_id).await
    {
        warn!(%id, %annex_id, error = %e, "annex delete failed");
        if e.is_unauthorized() {
            console::expire_session(&context, &session, &e).await;
        }
        return Err(e.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
