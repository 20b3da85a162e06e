//! Access gate.
//!
//! Two independent checks protect the console:
//! - route guards ([`Guard`]) evaluated against the in-memory session of the
//!   console context
//! - [`require_session_marker`], which only looks at the token persisted in
//!   the browser session record

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use tower_sessions::Session;
use tracing::debug;

use crate::auth::marker;
use crate::error::AppError;
use crate::state::AppState;

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where authenticated but under-privileged visitors are sent.
pub const FORBIDDEN_PATH: &str = "/401";

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    Guest,
    /// Authenticated without the admin role.
    Member,
    Admin,
}

impl AccessState {
    pub fn of(authenticated: bool, admin: bool) -> Self {
        match (authenticated, admin) {
            (false, _) => AccessState::Guest,
            (true, false) => AccessState::Member,
            (true, true) => AccessState::Admin,
        }
    }
}

/// Requirement attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Authenticated,
    AdminOnly,
}

impl Guard {
    pub fn as_str(self) -> &'static str {
        match self {
            Guard::Authenticated => "authenticated",
            Guard::AdminOnly => "admin_only",
        }
    }
}

/// Result of checking one guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

/// Check a single guard.
pub fn evaluate(guard: Guard, state: AccessState) -> GateDecision {
    match (guard, state) {
        (_, AccessState::Guest) => GateDecision::Redirect(LOGIN_PATH),
        (Guard::AdminOnly, AccessState::Member) => GateDecision::Redirect(FORBIDDEN_PATH),
        _ => GateDecision::Allow,
    }
}

/// Check guards from the outermost route inward; the first redirect wins.
pub fn evaluate_chain(guards: &[Guard], state: AccessState) -> Result<(), (Guard, &'static str)> {
    for &guard in guards {
        if let GateDecision::Redirect(to) = evaluate(guard, state) {
            return Err((guard, to));
        }
    }
    Ok(())
}

/// Middleware for routes that need a logged-in user.
pub async fn require_authenticated(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
    next: Next,
) -> Response {
    guarded(state, session, Guard::Authenticated, request, next).await
}

/// Middleware for routes that need the admin role.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
    next: Next,
) -> Response {
    guarded(state, session, Guard::AdminOnly, request, next).await
}

async fn guarded(
    state: AppState,
    session: Session,
    guard: Guard,
    request: Request<Body>,
    next: Next,
) -> Response {
    let context = match state.console(&session).await {
        Ok(context) => context,
        Err(e) => return e.into_response(),
    };
    let access = context.read().access();

    match evaluate(guard, access) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(to) => {
            debug!(path = %request.uri().path(), guard = guard.as_str(), to, "gate redirect");
            state.metrics().record_gate_redirect(guard, to);
            Redirect::to(to).into_response()
        }
    }
}

/// Middleware for the JSON surface: only the persisted token is consulted.
pub async fn require_session_marker(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
    next: Next,
) -> Response {
    if marker::is_permanent(&session).await {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "no session marker");
    state.metrics().record_marker_rejection();
    AppError::LoginRequired.into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn redirect_table() {
        use AccessState::*;
        use GateDecision::*;

        assert_eq!(evaluate(Guard::Authenticated, Guest), Redirect("/login"));
        assert_eq!(evaluate(Guard::Authenticated, Member), Allow);
        assert_eq!(evaluate(Guard::Authenticated, Admin), Allow);

        assert_eq!(evaluate(Guard::AdminOnly, Guest), Redirect("/login"));
        assert_eq!(evaluate(Guard::AdminOnly, Member), Redirect("/401"));
        assert_eq!(evaluate(Guard::AdminOnly, Admin), Allow);
    }

    #[test]
    fn access_state_requires_token_for_admin() {
        assert_eq!(AccessState::of(false, true), AccessState::Guest);
        assert_eq!(AccessState::of(true, false), AccessState::Member);
        assert_eq!(AccessState::of(true, true), AccessState::Admin);
    }

    #[test]
    fn chain_stops_at_first_redirect() {
        let guards = [Guard::Authenticated, Guard::AdminOnly];
        assert_eq!(
            evaluate_chain(&guards, AccessState::Member),
            Err((Guard::AdminOnly, "/401"))
        );
        assert_eq!(
            evaluate_chain(&guards, AccessState::Guest),
            Err((Guard::Authenticated, "/login"))
        );
        assert_eq!(evaluate_chain(&guards, AccessState::Admin), Ok(()));
        assert_eq!(evaluate_chain(&[], AccessState::Guest), Ok(()));
    }
}
