//! Public pages: home, result pages, and the not-found fallback.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use tower_sessions::Session;

use crate::gate::FORBIDDEN_PATH;
use crate::routes::helpers::{load_console, page_context, render_with_status};
use crate::state::AppState;

/// Create the public pages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/success", get(success))
        .route(FORBIDDEN_PATH, get(unauthorized))
}

async fn page(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    template: &str,
) -> Response {
    let context = match load_console(state, session).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    let page = {
        let mut ctx = context.write();
        page_context(state, &mut ctx)
    };
    render_with_status(state, status, template, &page)
}

/// GET /
async fn home(State(state): State<AppState>, session: Session) -> Response {
    page(&state, &session, StatusCode::OK, "home.html").await
}

/// GET /success
async fn success(State(state): State<AppState>, session: Session) -> Response {
    page(&state, &session, StatusCode::OK, "success.html").await
}

/// GET /401
async fn unauthorized(State(state): State<AppState>, session: Session) -> Response {
    page(&state, &session, StatusCode::UNAUTHORIZED, "unauthorized.html").await
}

/// Fallback for every unmatched path.
pub async fn not_found(State(state): State<AppState>, session: Session) -> Response {
    page(&state, &session, StatusCode::NOT_FOUND, "not_found.html").await
}
