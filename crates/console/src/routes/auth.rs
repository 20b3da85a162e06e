//! Login and logout routes.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_sessions::Session;
use tracing::warn;

use crate::auth::login::{LoginError, LoginForm};
use crate::auth::marker;
use crate::client::VerificationCode;
use crate::console::{self, RefreshOutcome};
use crate::error::AppResult;
use crate::routes::helpers::{load_console, page_context, render_with_status};
use crate::state::AppState;

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .route("/login/code", get(verification_code))
        .route("/logout", post(logout))
}

/// GET /login
async fn login_form(State(state): State<AppState>, session: Session) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    if context.read().session().is_authenticated() {
        return Redirect::to("/main").into_response();
    }
    render_login(&state, &session, &context, "", StatusCode::OK).await
}

/// POST /login
async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let result = console::sign_in(
        state.api(),
        state.registry(),
        &context,
        &session,
        &form,
    )
    .await;

    match result {
        Ok(outcome) => {
            state.metrics().record_login("success");
            state.record_refresh(outcome);
            if outcome == RefreshOutcome::Unauthorized {
                return Redirect::to("/login").into_response();
            }
            Redirect::to("/main").into_response()
        }
        Err(e) => {
            state.metrics().record_login(e.outcome());
            let status = match &e {
                LoginError::MissingField(_) => StatusCode::BAD_REQUEST,
                LoginError::Api(_) => StatusCode::UNAUTHORIZED,
            };
            render_login(&state, &session, &context, form.logid.trim(), status).await
        }
    }
}

async fn render_login(
    state: &AppState,
    session: &Session,
    context: &console::SharedContext,
    logid: &str,
    status: StatusCode,
) -> Response {
    let token = marker::persisted_token(session).await;
    let code = match state.api().verification_code(&token).await {
        Ok(code) => code.code,
        Err(e) => {
            warn!(error = %e, "verification code unavailable");
            String::new()
        }
    };

    let mut page = {
        let mut ctx = context.write();
        page_context(state, &mut ctx)
    };
    page.insert("logid", logid);
    page.insert("code", &code);
    render_with_status(state, status, "login.html", &page)
}

/// GET /login/code
///
/// A fresh verification image, base64 encoded.
async fn verification_code(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<VerificationCode>> {
    let token = marker::persisted_token(&session).await;
    let code = state.api().verification_code(&token).await?;
    Ok(Json(code))
}

/// POST /logout
async fn logout(State(state): State<AppState>, session: Session) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    console::sign_out(&context, &session).await;
    if let Err(e) = state.discard_console(&session).await {
        warn!(error = %e, "failed to discard console context");
    }
    Redirect::to("/login").into_response()
}
