//! JSON surface for navigation state and management trees.
//!
//! Every route here sits behind the session-marker check rather than the
//! in-memory route guards.

use axum::extract::{Path, State};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::debug;

use crate::console::{self, RefreshOutcome};
use crate::error::{AppError, AppResult};
use crate::gate::require_session_marker;
use crate::state::AppState;
use crate::tree::{TreeKind, TreeNodeData, TreeView};

/// Create the API router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/navigation", get(navigation))
        .route("/api/navigation/refresh", post(refresh))
        .route("/api/trees/{kind}", get(tree))
        .route(
            "/api/trees/{kind}/{key}",
            get(node).patch(rename_node).delete(remove_node),
        )
        .route("/api/trees/{kind}/{key}/expand", post(expand))
        .route("/api/trees/{kind}/{key}/nodes", post(insert_node))
        .route_layer(from_fn_with_state(state, require_session_marker))
}

fn tree_kind(raw: &str) -> AppResult<TreeKind> {
    TreeKind::parse(raw).ok_or_else(|| AppError::NotFound(format!("no tree named '{raw}'")))
}

/// GET /api/navigation
async fn navigation(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let context = state.console(&session).await?;
    let snapshot = context.write().snapshot();
    Ok(Json(snapshot).into_response())
}

/// POST /api/navigation/refresh
async fn refresh(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let context = state.console(&session).await?;

    let outcome = state.refresh(&context, &session).await;
    if outcome == RefreshOutcome::Unauthorized {
        return Err(AppError::LoginRequired);
    }

    let snapshot = context.write().snapshot();
    Ok(Json(json!({ "outcome": outcome.as_str(), "console": snapshot })).into_response())
}

/// GET /api/trees/{kind}
async fn tree(
    State(state): State<AppState>,
    session: Session,
    Path(kind): Path<String>,
) -> AppResult<Json<Option<TreeView>>> {
    let kind = tree_kind(&kind)?;
    let context = state.console(&session).await?;
    let view = context.read().tree(kind).and_then(|t| t.view());
    Ok(Json(view))
}

/// POST /api/trees/{kind}/{key}/expand
///
/// Children are fetched from upstream only the first time a node expands.
async fn expand(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Json<Option<TreeView>>> {
    let kind = tree_kind(&kind)?;
    let context = state.console(&session).await?;
    let view = console::expand_tree(state.api(), &context, &session, kind, &key).await?;
    Ok(Json(view))
}

/// Where a node sits in its tree.
#[derive(Debug, Serialize)]
struct NodePlacement {
    key: String,
    title: String,
    parent: Option<String>,
    children: Vec<String>,
}

/// GET /api/trees/{kind}/{key}
async fn node(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Json<NodePlacement>> {
    let kind = tree_kind(&kind)?;
    let context = state.console(&session).await?;
    let ctx = context.read();
    let Some(tree) = ctx.tree(kind) else {
        return Err(AppError::NotFound(format!("no tree named '{}'", kind.as_str())));
    };

    let parent = tree.parent_of(&key)?.map(str::to_string);
    let children = tree
        .children_of(&key)?
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Json(NodePlacement {
        title: tree.title(&key).unwrap_or_default().to_string(),
        key,
        parent,
        children,
    }))
}

/// Body of a node created through an upstream dialog.
#[derive(Debug, Deserialize)]
struct NewNode {
    key: String,
    title: String,
    #[serde(rename = "isLeaf", default)]
    is_leaf: Option<bool>,
}

/// POST /api/trees/{kind}/{key}/nodes
///
/// Mirrors a node the upstream service already created under `key`.
async fn insert_node(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
    Json(node): Json<NewNode>,
) -> AppResult<Json<Option<TreeView>>> {
    let kind = tree_kind(&kind)?;
    if node.key.trim().is_empty() {
        return Err(AppError::BadRequest("node key is required".to_string()));
    }
    let context = state.console(&session).await?;

    let mut ctx = context.write();
    let tree = ctx.tree_mut(kind);
    tree.insert(
        &key,
        TreeNodeData {
            title: node.title,
            key: node.key,
            is_leaf: node.is_leaf,
        },
    )?;
    debug!(kind = kind.as_str(), parent = %key, "tree node inserted");
    Ok(Json(tree.view()))
}

#[derive(Debug, Deserialize)]
struct Rename {
    title: String,
}

/// PATCH /api/trees/{kind}/{key}
async fn rename_node(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
    Json(rename): Json<Rename>,
) -> AppResult<Json<Option<TreeView>>> {
    let kind = tree_kind(&kind)?;
    let context = state.console(&session).await?;

    let mut ctx = context.write();
    let tree = ctx.tree_mut(kind);
    tree.rename(&key, rename.title)?;
    Ok(Json(tree.view()))
}

/// DELETE /api/trees/{kind}/{key}
///
/// Drops the node and its subtree; the reply names the parent so the
/// client can select it.
async fn remove_node(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let kind = tree_kind(&kind)?;
    let context = state.console(&session).await?;

    let mut ctx = context.write();
    let tree = ctx.tree_mut(kind);
    let parent = tree.parent_of(&key)?.map(str::to_string);
    let removed = tree.remove(&key)?;
    debug!(kind = kind.as_str(), %key, removed, "tree node removed");
    Ok(Json(json!({ "removed": removed, "parent": parent, "tree": tree.view() })).into_response())
}
