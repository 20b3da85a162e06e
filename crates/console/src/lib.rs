//! Tyr Console
//!
//! Session handling, permission-driven navigation, and the console shell
//! for the Tyr admin platform. The `tyr-console` binary serves this router;
//! the library is exposed for integration testing.

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod navigation;
pub mod registry;
pub mod routes;
pub mod session;
pub mod shell;
pub mod state;
pub mod theme;
pub mod tree;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::warn;

use crate::config::Config;
use crate::state::AppState;

/// Build the console application around a session layer.
///
/// Layers run outermost first: trace, session, request metrics, routes.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    routes::router(state.clone())
        .layer(from_fn_with_state(
            state.clone(),
            routes::metrics::track_requests,
        ))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins.
///
/// A lone `*` allows any origin without credentials. Explicit origins get
/// credentials, which rules out wildcard headers.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(true)
    }
}
