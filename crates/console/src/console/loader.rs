//! Upstream-driven transitions of a console context.
//!
//! The context lock is taken only to read inputs and to apply results;
//! it is never held across an upstream call. Refreshes are not fenced, so
//! when two overlap the one that completes last is what the context shows.

use thiserror::Error;
use tower_sessions::Session;
use tracing::{error, info, warn};

use super::SharedContext;
use crate::auth::login::{LoginError, LoginForm, login};
use crate::auth::{UserInfo, marker};
use crate::client::ConsoleApi;
use crate::error::ApiError;
use crate::navigation::assemble;
use crate::registry::ComponentRegistry;
use crate::tree::{TreeError, TreeKind, TreeView};

const MENU_REJECTED: &str = "Failed to get module-menu";
const MENU_FAILED: &str = "Error fetching dynamic routes";

/// How a permission refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Menus and routes rebuilt from the permission tree.
    Applied { dropped: usize },
    /// Upstream said no; authenticated defaults applied.
    Rejected,
    /// Upstream returned 401; the session was cleared.
    Unauthorized,
    /// Transport, decode, or bad-request failure; defaults applied.
    Failed,
    /// Nothing to refresh: no token, or the session ended meanwhile.
    Skipped,
}

impl RefreshOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshOutcome::Applied { .. } => "applied",
            RefreshOutcome::Rejected => "rejected",
            RefreshOutcome::Unauthorized => "unauthorized",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::Skipped => "skipped",
        }
    }
}

/// Fetch the permission tree and rebuild menus and routes.
pub async fn refresh_navigation(
    api: &dyn ConsoleApi,
    registry: &ComponentRegistry,
    context: &SharedContext,
    session: &Session,
) -> RefreshOutcome {
    let token = {
        let mut ctx = context.write();
        if !ctx.session().is_authenticated() {
            return RefreshOutcome::Skipped;
        }
        ctx.begin_refresh();
        ctx.token().to_string()
    };

    let result = api.session_resources(&token).await;

    let outcome = {
        let mut ctx = context.write();
        if !ctx.session().is_authenticated() {
            // Logged out while the request was in flight.
            ctx.end_refresh();
            return RefreshOutcome::Skipped;
        }

        let outcome = match result {
            Ok(payload) => {
                ctx.set_user_if_guest(UserInfo::from(payload.user));
                let nav = assemble(&payload.modules, registry, ctx.user().is_admin());
                let dropped = nav.dropped.len();
                ctx.apply_navigation(nav);
                info!(user_id = %ctx.user().id, dropped, "navigation refreshed");
                RefreshOutcome::Applied { dropped }
            }
            Err(ApiError::Rejected { message }) => {
                warn!(%message, "permission tree rejected");
                ctx.notices_mut().error(MENU_REJECTED);
                ctx.apply_defaults();
                RefreshOutcome::Rejected
            }
            Err(e @ ApiError::Unauthorized { .. }) => {
                warn!("session token rejected during refresh");
                ctx.reset_to_guest();
                ctx.notices_mut().error(e.notice_text());
                RefreshOutcome::Unauthorized
            }
            Err(ApiError::BadRequest) => {
                ctx.notices_mut().error(ApiError::BadRequest.notice_text());
                ctx.apply_defaults();
                RefreshOutcome::Failed
            }
            Err(e) => {
                error!(error = %e, "permission tree fetch failed");
                ctx.notices_mut().error(MENU_FAILED);
                ctx.apply_defaults();
                RefreshOutcome::Failed
            }
        };
        ctx.end_refresh();
        outcome
    };

    if outcome == RefreshOutcome::Unauthorized {
        forget_marker(session).await;
    }
    outcome
}

/// Log in, persist the token marker, and load navigation.
pub async fn sign_in(
    api: &dyn ConsoleApi,
    registry: &ComponentRegistry,
    context: &SharedContext,
    session: &Session,
    form: &LoginForm,
) -> Result<RefreshOutcome, LoginError> {
    let payload = match login(api, form).await {
        Ok(payload) => payload,
        Err(e) => {
            context.write().notices_mut().error(e.notice_text());
            return Err(e);
        }
    };

    if let Err(e) = marker::persist_token(session, &payload.token).await {
        error!(error = %e, "failed to persist session marker");
    }

    context
        .write()
        .begin_session(payload.token, UserInfo::from(payload.user));

    Ok(refresh_navigation(api, registry, context, session).await)
}

/// End the session: guest context, marker removed.
pub async fn sign_out(context: &SharedContext, session: &Session) {
    {
        let mut ctx = context.write();
        info!(user_id = %ctx.user().id, "signing out");
        ctx.reset_to_guest();
    }
    forget_marker(session).await;
}

/// Restore a guest context from the persisted marker.
///
/// Returns `None` when there is nothing to restore.
pub async fn rehydrate(
    api: &dyn ConsoleApi,
    registry: &ComponentRegistry,
    context: &SharedContext,
    session: &Session,
) -> Option<RefreshOutcome> {
    let token = marker::persisted_token(session).await;
    {
        let mut ctx = context.write();
        if token.is_empty() || ctx.session().is_authenticated() {
            return None;
        }
        ctx.restore_token(token);
    }
    info!("restoring console from session marker");
    Some(refresh_navigation(api, registry, context, session).await)
}

#[derive(Debug, Error)]
pub enum TreeLoadError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Load a node's children at most once, then return the whole tree.
pub async fn expand_tree(
    api: &dyn ConsoleApi,
    context: &SharedContext,
    session: &Session,
    kind: TreeKind,
    key: &str,
) -> Result<Option<TreeView>, TreeLoadError> {
    let (claimed, token) = {
        let mut ctx = context.write();
        let claimed = ctx.tree_mut(kind).begin_load(key)?;
        (claimed, ctx.token().to_string())
    };

    if claimed {
        let result = api.tree_children(&token, kind, key).await;
        let failure = {
            let mut ctx = context.write();
            match result {
                Ok(children) => {
                    ctx.tree_mut(kind).add_children(key, children)?;
                    None
                }
                Err(e) => {
                    ctx.tree_mut(kind).abort_load(key);
                    if !e.is_unauthorized() {
                        ctx.notices_mut().error(e.notice_text());
                    }
                    Some(e)
                }
            }
        };

        if let Some(e) = failure {
            if e.is_unauthorized() {
                expire_session(context, session, &e).await;
            }
            return Err(e.into());
        }
    }

    Ok(context.read().tree(kind).and_then(|t| t.view()))
}

/// Drop the session after an upstream 401 outside a refresh: guest
/// context, running uploads stopped, marker removed.
pub async fn expire_session(context: &SharedContext, session: &Session, cause: &ApiError) {
    {
        let mut ctx = context.write();
        warn!(user_id = %ctx.user().id, "session token rejected upstream");
        ctx.reset_to_guest();
        ctx.notices_mut().error(cause.notice_text());
    }
    forget_marker(session).await;
}

async fn forget_marker(session: &Session) {
    if let Err(e) = marker::clear_token(session).await {
        error!(error = %e, "failed to clear session marker");
    }
}
