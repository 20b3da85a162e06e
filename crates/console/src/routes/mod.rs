//! HTTP route handlers.

pub mod api;
pub mod auth;
pub mod health;
pub mod helpers;
pub mod metrics;
pub mod pages;
pub mod shell;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

/// Every console route, with the not-found page as fallback.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(pages::router())
        .merge(auth::router())
        .merge(shell::router(state.clone()))
        .merge(api::router(state.clone()))
        .merge(uploads::router(state))
        .merge(health::router())
        .merge(metrics::router())
        .fallback(pages::not_found)
}
