//! Lazily loaded management trees (groups, modules/menus).
//!
//! Nodes live in an arena indexed by key. Each slot keeps its parent and
//! child indices, so insert/rename are O(1) and removal only relinks the
//! parent's child list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Key of the synthetic root.
pub const ROOT_KEY: &str = "root";

/// Title of the synthetic root.
pub const ROOT_TITLE: &str = "Root";

/// Which management tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    Group,
    Module,
}

impl TreeKind {
    pub const ALL: [TreeKind; 2] = [TreeKind::Group, TreeKind::Module];

    /// Upstream path prefix; the node key is appended as the last segment.
    pub fn lazy_endpoint(self) -> &'static str {
        match self {
            TreeKind::Group => "group/lazyantdtreedata",
            TreeKind::Module => "module/lazytree",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TreeKind::Group => "group",
            TreeKind::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// A node as returned by the lazy-load endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNodeData {
    pub title: String,
    pub key: String,
    #[serde(rename = "isLeaf", default)]
    pub is_leaf: Option<bool>,
}

impl TreeNodeData {
    pub fn new(title: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            key: key.into(),
            is_leaf: None,
        }
    }

    pub fn leaf(mut self) -> Self {
        self.is_leaf = Some(true);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("no tree node with key '{0}'")]
    UnknownKey(String),

    #[error("tree node key '{0}' already exists")]
    DuplicateKey(String),

    #[error("the root node cannot be removed")]
    RemoveRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug, Clone)]
struct Slot {
    title: String,
    key: String,
    parent: Option<usize>,
    children: Vec<usize>,
    is_leaf: bool,
    load: LoadState,
}

/// Nested rendering of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    pub title: String,
    pub key: String,
    pub is_leaf: bool,
    pub load: LoadState,
    pub children: Vec<TreeView>,
}

/// One lazily loaded tree.
#[derive(Debug, Clone)]
pub struct ManagementTree {
    kind: TreeKind,
    slots: Vec<Option<Slot>>,
    index: HashMap<String, usize>,
}

impl ManagementTree {
    /// A tree holding only the unloaded root.
    pub fn new(kind: TreeKind) -> Self {
        let root = Slot {
            title: ROOT_TITLE.to_string(),
            key: ROOT_KEY.to_string(),
            parent: None,
            children: Vec::new(),
            is_leaf: false,
            load: LoadState::Unloaded,
        };
        Self {
            kind,
            slots: vec![Some(root)],
            index: HashMap::from([(ROOT_KEY.to_string(), 0)]),
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn position(&self, key: &str) -> Result<usize, TreeError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| TreeError::UnknownKey(key.to_string()))
    }

    fn slot(&self, pos: usize) -> Option<&Slot> {
        self.slots.get(pos).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, pos: usize) -> Option<&mut Slot> {
        self.slots.get_mut(pos).and_then(Option::as_mut)
    }

    pub fn title(&self, key: &str) -> Option<&str> {
        let pos = self.index.get(key)?;
        self.slot(*pos).map(|s| s.title.as_str())
    }

    pub fn load_state(&self, key: &str) -> Option<LoadState> {
        let pos = self.index.get(key)?;
        self.slot(*pos).map(|s| s.load)
    }

    /// Claim the right to fetch `key`'s children.
    ///
    /// Returns `true` exactly once per node until the fetch fails; leaves
    /// and loaded or in-flight nodes return `false`.
    pub fn begin_load(&mut self, key: &str) -> Result<bool, TreeError> {
        let pos = self.position(key)?;
        let Some(slot) = self.slot_mut(pos) else {
            return Err(TreeError::UnknownKey(key.to_string()));
        };
        if slot.is_leaf || slot.load != LoadState::Unloaded {
            return Ok(false);
        }
        slot.load = LoadState::Loading;
        Ok(true)
    }

    /// Release a claim after a failed fetch so it can be retried.
    pub fn abort_load(&mut self, key: &str) {
        if let Some(&pos) = self.index.get(key)
            && let Some(slot) = self.slot_mut(pos)
            && slot.load == LoadState::Loading
        {
            slot.load = LoadState::Unloaded;
        }
    }

    /// Attach fetched children and mark the parent loaded.
    ///
    /// Keys already present elsewhere in the tree are skipped.
    pub fn add_children(
        &mut self,
        parent_key: &str,
        children: Vec<TreeNodeData>,
    ) -> Result<usize, TreeError> {
        let parent = self.position(parent_key)?;
        let mut added = 0;
        for child in children {
            if self.index.contains_key(&child.key) {
                warn!(kind = self.kind.as_str(), key = %child.key, "skipping duplicate tree key");
                continue;
            }
            self.link(parent, child);
            added += 1;
        }

        if let Some(slot) = self.slot_mut(parent) {
            slot.load = LoadState::Loaded;
            slot.is_leaf = slot.children.is_empty();
        }
        debug!(kind = self.kind.as_str(), parent = parent_key, added, "tree children loaded");
        Ok(added)
    }

    /// Add one node created through an upstream dialog.
    pub fn insert(&mut self, parent_key: &str, node: TreeNodeData) -> Result<(), TreeError> {
        let parent = self.position(parent_key)?;
        if self.index.contains_key(&node.key) {
            return Err(TreeError::DuplicateKey(node.key));
        }
        self.link(parent, node);
        if let Some(slot) = self.slot_mut(parent) {
            slot.is_leaf = false;
        }
        Ok(())
    }

    fn link(&mut self, parent: usize, node: TreeNodeData) {
        let pos = self.slots.len();
        self.index.insert(node.key.clone(), pos);
        self.slots.push(Some(Slot {
            title: node.title,
            key: node.key,
            parent: Some(parent),
            children: Vec::new(),
            is_leaf: node.is_leaf.unwrap_or(false),
            load: LoadState::Unloaded,
        }));
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.push(pos);
        }
    }

    pub fn rename(&mut self, key: &str, title: impl Into<String>) -> Result<(), TreeError> {
        let pos = self.position(key)?;
        if let Some(slot) = self.slot_mut(pos) {
            slot.title = title.into();
        }
        Ok(())
    }

    /// Remove a node and its whole subtree.
    ///
    /// The parent's leaf flag is recomputed from its remaining children.
    pub fn remove(&mut self, key: &str) -> Result<usize, TreeError> {
        let pos = self.position(key)?;
        let parent = self.slot(pos).and_then(|s| s.parent);
        let Some(parent) = parent else {
            return Err(TreeError::RemoveRoot);
        };

        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|&c| c != pos);
            slot.is_leaf = slot.children.is_empty();
        }

        let mut removed = 0;
        let mut stack = vec![pos];
        while let Some(next) = stack.pop() {
            if let Some(slot) = self.slots.get_mut(next).and_then(Option::take) {
                self.index.remove(&slot.key);
                stack.extend(slot.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Key of the node's parent; `None` for the root.
    pub fn parent_of(&self, key: &str) -> Result<Option<&str>, TreeError> {
        let pos = self.position(key)?;
        Ok(self
            .slot(pos)
            .and_then(|s| s.parent)
            .and_then(|p| self.slot(p))
            .map(|p| p.key.as_str()))
    }

    /// Keys of the node's direct children, in insertion order.
    pub fn children_of(&self, key: &str) -> Result<Vec<&str>, TreeError> {
        let pos = self.position(key)?;
        Ok(self
            .slot(pos)
            .map(|s| {
                s.children
                    .iter()
                    .filter_map(|&c| self.slot(c))
                    .map(|c| c.key.as_str())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn view(&self) -> Option<TreeView> {
        self.view_at(0)
    }

    fn view_at(&self, pos: usize) -> Option<TreeView> {
        let slot = self.slot(pos)?;
        Some(TreeView {
            title: slot.title.clone(),
            key: slot.key.clone(),
            is_leaf: slot.is_leaf,
            load: slot.load,
            children: slot
                .children
                .iter()
                .filter_map(|&c| self.view_at(c))
                .collect(),
        })
    }
}
