//! Per-browser console contexts.
//!
//! A [`ConsoleContext`] holds everything one browser session sees: the
//! in-memory auth session, its menus and route table, shell state, notices,
//! management trees, and the upload tray. Contexts live in the
//! [`ConsoleHub`], keyed by a client id stored in the tower session.

mod loader;
pub mod notice;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tower_sessions::Session;
use tracing::debug;
use uuid::Uuid;

pub use loader::{
    RefreshOutcome, TreeLoadError, expand_tree, expire_session, refresh_navigation, rehydrate,
    sign_in, sign_out,
};
pub use notice::{Notice, NoticeQueue, Severity};

use crate::auth::{SessionStore, UserInfo};
use crate::client::upload::UploadTracker;
use crate::gate::AccessState;
use crate::navigation::{AssembledNavigation, MenuNode, RouteTable};
use crate::shell::NavigationShell;
use crate::tree::{ManagementTree, TreeKind};

/// Session key holding the console client id.
pub const CLIENT_ID_KEY: &str = "console_client";

/// A context shared between concurrent requests of one browser.
pub type SharedContext = Arc<RwLock<ConsoleContext>>;

/// Everything one browser session sees.
pub struct ConsoleContext {
    session: SessionStore,
    routes: RouteTable,
    menus: Vec<MenuNode>,
    dropped: Vec<String>,
    /// Permission refreshes in flight.
    refreshing: u32,
    loaded_at: Option<DateTime<Utc>>,
    applied: u64,
    shell: NavigationShell,
    notices: NoticeQueue,
    trees: HashMap<TreeKind, ManagementTree>,
    uploads: Arc<UploadTracker>,
}

impl ConsoleContext {
    /// A fresh guest context.
    pub fn new(uploads: Arc<UploadTracker>) -> Self {
        Self {
            session: SessionStore::new(),
            routes: RouteTable::guest(),
            menus: Vec::new(),
            dropped: Vec::new(),
            refreshing: 0,
            loaded_at: None,
            applied: 0,
            shell: NavigationShell::new(),
            notices: NoticeQueue::default(),
            trees: fresh_trees(),
            uploads,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn access(&self) -> AccessState {
        self.session.access()
    }

    pub fn token(&self) -> &str {
        self.session.token()
    }

    pub fn user(&self) -> &UserInfo {
        self.session.user()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn menus(&self) -> &[MenuNode] {
        &self.menus
    }

    /// Component ids dropped by the last applied refresh.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Whether a permission refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.refreshing > 0
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Number of navigation results applied so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn shell(&self) -> &NavigationShell {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut NavigationShell {
        &mut self.shell
    }

    /// Shell plus menus, for click handling.
    pub fn shell_and_menus(&mut self) -> (&mut NavigationShell, &[MenuNode]) {
        (&mut self.shell, &self.menus)
    }

    pub fn notices_mut(&mut self) -> &mut NoticeQueue {
        &mut self.notices
    }

    pub fn tree(&self, kind: TreeKind) -> Option<&ManagementTree> {
        self.trees.get(&kind)
    }

    pub fn tree_mut(&mut self, kind: TreeKind) -> &mut ManagementTree {
        self.trees
            .entry(kind)
            .or_insert_with(|| ManagementTree::new(kind))
    }

    pub fn uploads(&self) -> Arc<UploadTracker> {
        Arc::clone(&self.uploads)
    }

    /// Start an authenticated session. Routes fall back to the defaults
    /// until the permission tree arrives.
    pub(crate) fn begin_session(&mut self, token: String, user: UserInfo) {
        self.session.set_token(token);
        self.session.set_user(user);
        self.routes = RouteTable::defaults();
        self.menus.clear();
    }

    pub(crate) fn restore_token(&mut self, token: String) {
        self.session.set_token(token);
        self.routes = RouteTable::defaults();
    }

    pub(crate) fn begin_refresh(&mut self) {
        self.refreshing += 1;
    }

    pub(crate) fn end_refresh(&mut self) {
        self.refreshing = self.refreshing.saturating_sub(1);
    }

    pub(crate) fn set_user_if_guest(&mut self, user: UserInfo) {
        if self.session.user().is_guest() {
            self.session.set_user(user);
        }
    }

    pub(crate) fn apply_navigation(&mut self, nav: AssembledNavigation) {
        self.menus = nav.menus;
        self.routes = nav.routes;
        self.dropped = nav.dropped;
        self.loaded_at = Some(Utc::now());
        self.applied += 1;
    }

    /// Authenticated defaults with no server menus.
    pub(crate) fn apply_defaults(&mut self) {
        self.menus = crate::navigation::with_fixed_entries(Vec::new(), self.user().is_admin());
        self.routes = RouteTable::defaults();
        self.dropped.clear();
        self.applied += 1;
    }

    /// Back to a fresh guest context. Running uploads are stopped.
    pub(crate) fn reset_to_guest(&mut self) {
        self.uploads.cancel_all();
        let uploads = Arc::clone(&self.uploads);
        let notices = std::mem::take(&mut self.notices);
        *self = Self::new(uploads);
        self.notices = notices;
    }

    /// Serializable view for the JSON surface. Drains pending notices.
    pub fn snapshot(&mut self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            user: self.session.user().clone(),
            access: self.access(),
            loading: self.is_loading(),
            loaded_at: self.loaded_at,
            menus: self.menus.clone(),
            routes: self.routes.paths(),
            dropped: self.dropped.clone(),
            shell: self.shell.clone(),
            notices: self.notices.drain(),
        }
    }
}

fn fresh_trees() -> HashMap<TreeKind, ManagementTree> {
    TreeKind::ALL
        .into_iter()
        .map(|kind| (kind, ManagementTree::new(kind)))
        .collect()
}

/// JSON view of a context.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleSnapshot {
    pub user: UserInfo,
    pub access: AccessState,
    pub loading: bool,
    pub loaded_at: Option<DateTime<Utc>>,
    pub menus: Vec<MenuNode>,
    pub routes: Vec<String>,
    pub dropped: Vec<String>,
    pub shell: NavigationShell,
    pub notices: Vec<Notice>,
}

struct HubEntry {
    context: SharedContext,
    last_seen: Instant,
}

/// All live console contexts.
///
/// Entries idle for longer than the session expiry are dropped by
/// [`ConsoleHub::evict_idle`].
pub struct ConsoleHub {
    contexts: DashMap<Uuid, HubEntry>,
    idle: Duration,
    upload_max_files: usize,
    upload_max_bytes: u64,
}

impl ConsoleHub {
    pub fn new(idle: Duration, upload_max_files: usize, upload_max_bytes: u64) -> Self {
        Self {
            contexts: DashMap::new(),
            idle,
            upload_max_files,
            upload_max_bytes,
        }
    }

    /// The context for `client`, created on first use.
    pub fn context(&self, client: Uuid) -> SharedContext {
        let mut entry = self.contexts.entry(client).or_insert_with(|| {
            debug!(%client, "creating console context");
            HubEntry {
                context: Arc::new(RwLock::new(ConsoleContext::new(Arc::new(
                    UploadTracker::new(self.upload_max_files, self.upload_max_bytes),
                )))),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        Arc::clone(&entry.context)
    }

    /// Drop a context, stopping its uploads.
    pub fn discard(&self, client: Uuid) -> bool {
        match self.contexts.remove(&client) {
            Some((_, entry)) => {
                entry.context.read().uploads.cancel_all();
                true
            }
            None => false,
        }
    }

    /// Drop contexts unused for longer than the idle limit.
    pub fn evict_idle(&self) -> usize {
        match Instant::now().checked_sub(self.idle) {
            Some(cutoff) => self.evict_idle_since(cutoff),
            None => 0,
        }
    }

    /// Drop contexts last used before `cutoff`. Returns how many went.
    pub fn evict_idle_since(&self, cutoff: Instant) -> usize {
        let mut evicted = 0;
        self.contexts.retain(|client, entry| {
            if entry.last_seen >= cutoff {
                return true;
            }
            debug!(%client, "evicting idle console context");
            entry.context.read().uploads.cancel_all();
            evicted += 1;
            false
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// The browser's client id, assigned on first request.
pub async fn client_id(session: &Session) -> Result<Uuid, tower_sessions::session::Error> {
    if let Some(id) = session.get::<Uuid>(CLIENT_ID_KEY).await? {
        return Ok(id);
    }
    let id = Uuid::now_v7();
    session.insert(CLIENT_ID_KEY, id).await?;
    Ok(id)
}
