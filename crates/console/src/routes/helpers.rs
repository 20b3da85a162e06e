//! Shared route helpers for page rendering.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tower_sessions::Session;

use crate::console::{ConsoleContext, SharedContext};
use crate::error::AppError;
use crate::registry::Screen;
use crate::shell::TrayContent;
use crate::state::AppState;
use crate::tree::TreeKind;

/// The console context for this request, or an error response.
pub async fn load_console(state: &AppState, session: &Session) -> Result<SharedContext, Response> {
    state.console(session).await.map_err(IntoResponse::into_response)
}

/// Variables every page needs: base path, pending notices, login state.
///
/// Drains the context's notices.
pub fn page_context(state: &AppState, ctx: &mut ConsoleContext) -> tera::Context {
    let mut context = tera::Context::new();
    context.insert("base_path", &state.config().base_path);
    context.insert("authenticated", &ctx.session().is_authenticated());
    context.insert("notices", &ctx.notices_mut().drain());
    context
}

/// Page variables plus the shell: user, menus, breadcrumbs, tray.
pub fn shell_context(state: &AppState, ctx: &mut ConsoleContext) -> tera::Context {
    let mut context = page_context(state, ctx);
    context.insert("user", ctx.user());
    context.insert("menus", ctx.menus());
    context.insert("active_id", &ctx.shell().active_id());
    context.insert("expanded", &ctx.shell().expanded());
    context.insert("breadcrumbs", ctx.shell().breadcrumbs());
    context.insert("tray", ctx.shell().tray());
    context.insert("loading", &ctx.is_loading());
    context.insert(
        "loaded_at",
        &ctx.loaded_at().map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    );
    context.insert("dropped", ctx.dropped());
    context.insert("screen_body", "");
    context
}

/// Management tree backing a screen, if it has one.
pub fn tree_kind_for(screen: Screen) -> Option<TreeKind> {
    match screen {
        Screen::GroupTree => Some(TreeKind::Group),
        Screen::ModuleTree => Some(TreeKind::Module),
        _ => None,
    }
}

/// Render the body of a mounted screen.
pub fn render_screen_body(
    state: &AppState,
    ctx: &ConsoleContext,
    tray: &TrayContent,
) -> Result<String, AppError> {
    let Some(screen) = tray.screen else {
        return Ok(String::new());
    };

    let mut context = tera::Context::new();
    context.insert("tray", tray);
    if let Some(kind) = tree_kind_for(screen) {
        context.insert("tree_kind", kind.as_str());
        context.insert("tree", &ctx.tree(kind).and_then(|t| t.view()));
    }
    Ok(state.theme().render(screen.template(), &context)?)
}

/// Render a template to an HTML response.
pub fn render(state: &AppState, template: &str, context: &tera::Context) -> Response {
    render_with_status(state, StatusCode::OK, template, context)
}

pub fn render_with_status(
    state: &AppState,
    status: StatusCode,
    template: &str,
    context: &tera::Context,
) -> Response {
    match state.theme().render(template, context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => AppError::Template(e).into_response(),
    }
}
