//! Console shell routes under `/main`.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tower_sessions::Session;
use tracing::debug;
use url::Url;

use crate::console::{ConsoleContext, SharedContext};
use crate::gate::{evaluate_chain, require_admin, require_authenticated};
use crate::navigation::{Element, TRAY_PATH};
use crate::routes::helpers::{
    load_console, page_context, render, render_screen_body, render_with_status, shell_context,
};
use crate::shell::{ShellAction, TrayContent};
use crate::state::AppState;

/// Create the shell router.
pub fn router(state: AppState) -> Router<AppState> {
    let members = Router::new()
        .route("/main", get(main_page))
        .route("/main/dashboard", get(dashboard))
        .route("/main/trays", get(trays))
        .route("/main/nav/{id}", post(nav))
        .route("/main/toggle/{id}", post(toggle))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated));

    let admins = Router::new()
        .route("/main/settings", get(settings))
        .route_layer(from_fn_with_state(state, require_admin));

    // Guards for permission-tree screens come from the route table.
    let screens = Router::new().route("/main/{*path}", get(screen));

    members.merge(admins).merge(screens)
}

fn render_shell<F>(
    state: &AppState,
    context: &SharedContext,
    template: &str,
    prepare: F,
) -> Response
where
    F: FnOnce(&mut ConsoleContext),
{
    let page = {
        let mut ctx = context.write();
        prepare(&mut ctx);
        shell_context(state, &mut ctx)
    };
    render(state, template, &page)
}

/// GET /main
async fn main_page(State(state): State<AppState>, session: Session) -> Response {
    match load_console(&state, &session).await {
        Ok(context) => render_shell(&state, &context, "main.html", |ctx| {
            ctx.shell_mut().enter_main()
        }),
        Err(response) => response,
    }
}

/// GET /main/dashboard
async fn dashboard(State(state): State<AppState>, session: Session) -> Response {
    match load_console(&state, &session).await {
        Ok(context) => render_shell(&state, &context, "dashboard.html", |ctx| {
            ctx.shell_mut().enter_dashboard()
        }),
        Err(response) => response,
    }
}

/// GET /main/settings
async fn settings(State(state): State<AppState>, session: Session) -> Response {
    match load_console(&state, &session).await {
        Ok(context) => render_shell(&state, &context, "settings.html", |_| {}),
        Err(response) => response,
    }
}

/// GET /main/trays
///
/// Shows whatever the last menu click put into the shared tray slot.
async fn trays(State(state): State<AppState>, session: Session) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let page = {
        let mut ctx = context.write();
        ctx.shell_mut().enter_tray();
        let tray = ctx.shell().tray().clone();
        let body = match render_screen_body(&state, &ctx, &tray) {
            Ok(body) => body,
            Err(e) => return e.into_response(),
        };
        let mut page = shell_context(&state, &mut ctx);
        page.insert("screen_body", &body);
        page
    };
    render(&state, "tray.html", &page)
}

/// POST /main/nav/{id}
async fn nav(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let action = {
        let mut ctx = context.write();
        let (shell, menus) = ctx.shell_and_menus();
        shell.click(menus, &id, state.registry())
    };

    match action {
        Some(ShellAction::Navigate(url)) => Redirect::to(&url).into_response(),
        Some(ShellAction::Tray) => Redirect::to(TRAY_PATH).into_response(),
        // Grouping nodes only expand or collapse; the page stays put.
        Some(ShellAction::Toggle) => stay(&headers),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /main/toggle/{id}
async fn toggle(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };
    context.write().shell_mut().toggle(&id);
    stay(&headers)
}

/// Back to the referring console page, or 204 when there is none.
fn stay(headers: &HeaderMap) -> Response {
    match headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(referer_path)
    {
        Some(back) => Redirect::to(&back).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Local path of a Referer value. Only the path and query are kept, so
/// the redirect never leaves this host.
fn referer_path(referer: &str) -> Option<String> {
    if referer.starts_with('/') && !referer.starts_with("//") {
        return Some(referer.to_string());
    }
    let url = Url::parse(referer).ok()?;
    match url.query() {
        Some(query) => Some(format!("{}?{query}", url.path())),
        None => Some(url.path().to_string()),
    }
}

/// GET /main/{*path}
///
/// Resolved against the console's current route table.
async fn screen(
    State(state): State<AppState>,
    session: Session,
    Path(path): Path<String>,
) -> Response {
    let context = match load_console(&state, &session).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let full = format!("/main/{path}");
    let (found, access, loading) = {
        let ctx = context.read();
        (ctx.routes().resolve(&full), ctx.access(), ctx.is_loading())
    };

    let Some(found) = found else {
        return not_found(&state, &context);
    };

    if let Err((guard, to)) = evaluate_chain(&found.guards, access) {
        debug!(path = %full, guard = guard.as_str(), to, "route guard redirect");
        state.metrics().record_gate_redirect(guard, to);
        return Redirect::to(to).into_response();
    }

    match found.element {
        Element::Redirect { to } => Redirect::to(&to).into_response(),
        Element::Screen { screen, .. } => {
            let tray = TrayContent::for_screen(screen);
            let page = {
                let mut ctx = context.write();
                let body = if loading {
                    String::new()
                } else {
                    match render_screen_body(&state, &ctx, &tray) {
                        Ok(body) => body,
                        Err(e) => return e.into_response(),
                    }
                };
                let mut page = shell_context(&state, &mut ctx);
                page.insert("tray", &tray);
                page.insert("screen_body", &body);
                page
            };
            render(&state, "screen.html", &page)
        }
        Element::Page { .. } => not_found(&state, &context),
    }
}

fn not_found(state: &AppState, context: &SharedContext) -> Response {
    let page = {
        let mut ctx = context.write();
        page_context(state, &mut ctx)
    };
    render_with_status(state, StatusCode::NOT_FOUND, "not_found.html", &page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referer_keeps_only_the_local_path() {
        assert_eq!(referer_path("/main/trays").as_deref(), Some("/main/trays"));
        assert_eq!(
            referer_path("https://console.example/main/groups?page=2").as_deref(),
            Some("/main/groups?page=2")
        );
        assert_eq!(referer_path("//evil.example/x"), None);
        assert_eq!(referer_path("not a url"), None);
    }
}
