//! Navigation shell state: active item, breadcrumb trail, the shared tray
//! slot, and which submenus are expanded.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::navigation::{MenuNode, find_menu, menu_ancestry};
use crate::registry::{ComponentRegistry, Screen, ScreenKind};

/// One breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

impl Breadcrumb {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// How the tray slot renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayKind {
    Tabular,
    Form,
    Other,
    /// Nothing mounted.
    Blank,
}

impl From<ScreenKind> for TrayKind {
    fn from(kind: ScreenKind) -> Self {
        match kind {
            ScreenKind::Tabular => TrayKind::Tabular,
            ScreenKind::Form => TrayKind::Form,
            ScreenKind::Other => TrayKind::Other,
        }
    }
}

/// The single content slot shown at the tray path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrayContent {
    pub title: String,
    pub subheader: String,
    pub screen: Option<Screen>,
    pub kind: TrayKind,
}

impl TrayContent {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            subheader: String::new(),
            screen: None,
            kind: TrayKind::Blank,
        }
    }

    /// A screen mounted directly by its own route.
    pub fn for_screen(screen: Screen) -> Self {
        Self {
            title: screen.title().to_string(),
            subheader: String::new(),
            screen: Some(screen),
            kind: screen.kind().into(),
        }
    }

    fn mounted(node: &MenuNode, screen: Screen) -> Self {
        Self {
            title: node.label.clone(),
            subheader: screen.title().to_string(),
            screen: Some(screen),
            kind: screen.kind().into(),
        }
    }

    fn missing(node: &MenuNode) -> Self {
        Self {
            title: node.label.clone(),
            subheader: format!("Not found element for {}", node.id),
            screen: None,
            kind: TrayKind::Blank,
        }
    }
}

impl Default for TrayContent {
    fn default() -> Self {
        Self::blank()
    }
}

/// What the caller should do after a menu click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum ShellAction {
    /// Real navigation (fixed entries).
    Navigate(String),
    /// Tray slot updated; show the tray.
    Tray,
    /// Grouping node; expansion flipped.
    Toggle,
}

/// Per-console shell state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationShell {
    active_id: Option<String>,
    breadcrumbs: Vec<Breadcrumb>,
    tray: TrayContent,
    expanded: BTreeSet<String>,
}

impl NavigationShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn tray(&self) -> &TrayContent {
        &self.tray
    }

    /// Ids of expanded submenus.
    pub fn expanded(&self) -> Vec<&str> {
        self.expanded.iter().map(String::as_str).collect()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Handle a sidebar click. Returns `None` for ids not in `menus`.
    pub fn click(
        &mut self,
        menus: &[MenuNode],
        id: &str,
        registry: &ComponentRegistry,
    ) -> Option<ShellAction> {
        let node = find_menu(menus, id)?;
        self.active_id = Some(node.id.clone());

        if node.is_grouping() {
            self.toggle(id);
            return Some(ShellAction::Toggle);
        }

        if let Some(chain) = menu_ancestry(menus, id) {
            self.breadcrumbs = chain
                .into_iter()
                .map(|n| Breadcrumb::new(&n.label, &n.url))
                .collect();
        }

        if node.is_reserved() {
            return Some(ShellAction::Navigate(node.url.clone()));
        }

        let screen = registry
            .find_by_path(&node.url)
            .or_else(|| {
                node.component
                    .as_deref()
                    .and_then(|name| registry.lookup(name))
            })
            .map(|entry| entry.screen);

        self.tray = match screen {
            Some(screen) => TrayContent::mounted(node, screen),
            None => {
                debug!(id, url = %node.url, "no screen for menu entry");
                TrayContent::missing(node)
            }
        };
        Some(ShellAction::Tray)
    }

    /// Flip expansion of a submenu.
    pub fn toggle(&mut self, id: &str) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    /// Landing on the blank main page.
    pub fn enter_main(&mut self) {
        self.breadcrumbs.clear();
    }

    /// Landing on the tray.
    pub fn enter_tray(&mut self) {
        self.active_id = None;
    }

    /// Landing on the dashboard.
    pub fn enter_dashboard(&mut self) {
        self.breadcrumbs = vec![Breadcrumb::new("Dashboard", "")];
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
