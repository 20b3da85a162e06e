//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::client::upload::UploadError;
use crate::console::TreeLoadError;
use crate::gate::LOGIN_PATH;
use crate::tree::TreeError;

/// Application errors.
///
/// Client-facing variants render as `{"error": ...}` JSON; store and
/// template failures are logged and reported as a bare 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// No usable session; the client should go to the login page.
    #[error("login required")]
    LoginRequired,

    /// An upstream service failed for a reason other than the session.
    #[error("{}", .0.notice_text())]
    Upstream(ApiError),

    #[error("session store error")]
    Session(#[from] tower_sessions::session::Error),

    #[error("template error")]
    Template(#[from] tera::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::LoginRequired => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            AppError::Session(e) => {
                tracing::error!(error = %e, "session store error");
                (status, "internal server error").into_response()
            }
            AppError::Template(e) => {
                tracing::error!(error = ?e, "template error");
                (status, "internal server error").into_response()
            }
            AppError::LoginRequired => (
                status,
                Json(json!({ "error": self.to_string(), "redirect": LOGIN_PATH })),
            )
                .into_response(),
            _ => (status, Json(json!({ "error": self.to_string() }))).into_response(),
        }
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        if e.is_unauthorized() {
            AppError::LoginRequired
        } else {
            AppError::Upstream(e)
        }
    }
}

impl From<TreeError> for AppError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::UnknownKey(_) => AppError::NotFound(e.to_string()),
            TreeError::DuplicateKey(_) | TreeError::RemoveRoot => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

impl From<TreeLoadError> for AppError {
    fn from(e: TreeLoadError) -> Self {
        match e {
            TreeLoadError::Tree(e) => e.into(),
            TreeLoadError::Api(e) => e.into(),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Unknown(_) => AppError::NotFound(e.to_string()),
            UploadError::NotRunning(_) => AppError::Conflict(e.to_string()),
            UploadError::TooManyFiles { .. } | UploadError::TooLarge { .. } => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Failures talking to the upstream account/permission services.
///
/// Every variant is recoverable: callers surface a notice and fall back to
/// default state rather than aborting the request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, timeout, or unexpected status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP 200 with `success: false`.
    #[error("{message}")]
    Rejected { message: String },

    /// HTTP 401 from any endpoint.
    #[error("{message}")]
    Unauthorized { message: String },

    /// HTTP 400 from any endpoint.
    #[error("bad format request")]
    BadRequest,

    /// The payload did not match the expected schema.
    #[error("malformed response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl ApiError {
    /// Message shown to the user for this failure.
    pub fn notice_text(&self) -> String {
        match self {
            ApiError::Transport(_) | ApiError::Decode { .. } => "Api service exception.".to_string(),
            ApiError::Rejected { message } | ApiError::Unauthorized { message } => {
                if message.is_empty() {
                    "Request rejected.".to_string()
                } else {
                    message.clone()
                }
            }
            ApiError::BadRequest => "Bad format request".to_string(),
        }
    }

    /// Whether this failure must clear the current session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}
