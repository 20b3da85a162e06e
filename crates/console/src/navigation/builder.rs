//! Route tree builder.
//!
//! Walks the permission tree once, producing the sidebar menu (same shape
//! as the input) and a flat list of route descriptors for every record that
//! names a screen, regardless of how deep it sits.

use serde::Serialize;
use tracing::debug;

use super::path::effective_path;
use super::record::ModuleRecord;

/// Menu id of the always-present dashboard entry.
pub const DASHBOARD_ID: &str = "react_vite_tyr_dashboard";

/// Menu id of the admin-only settings entry.
pub const SETTINGS_ID: &str = "react_vite_tyr_settings";

/// Path of the dashboard page.
pub const DASHBOARD_PATH: &str = "/main/dashboard";

/// Path of the settings page.
pub const SETTINGS_PATH: &str = "/main/settings";

/// The one route that hosts every dynamically selected screen.
pub const TRAY_PATH: &str = "/main/trays";

/// A flattened record that names a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub name: String,
    pub path: String,
    pub component: String,
    pub children: Vec<RouteDescriptor>,
}

impl RouteDescriptor {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            component: component.into(),
            children: Vec::new(),
        }
    }
}

/// Sidebar icon choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuIcon {
    Dashboard,
    Settings,
    /// Top-level module with sub-menus.
    Folder,
    /// Top-level module without sub-menus.
    Screen,
    /// Nested menu entry.
    Code,
}

/// A sidebar node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    pub id: String,
    pub label: String,
    /// Navigation target; empty for pure grouping nodes.
    pub url: String,
    pub icon: MenuIcon,
    /// Screen id carried by the source record, if any.
    pub component: Option<String>,
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    /// Whether clicking this node performs a real navigation.
    pub fn is_reserved(&self) -> bool {
        is_reserved_id(&self.id)
    }

    /// Grouping nodes only expand and collapse.
    pub fn is_grouping(&self) -> bool {
        self.url.is_empty()
    }
}

/// Whether `id` names one of the fixed, non-server menu entries.
pub fn is_reserved_id(id: &str) -> bool {
    id == DASHBOARD_ID || id == SETTINGS_ID
}

/// Output of one builder pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationBuild {
    pub descriptors: Vec<RouteDescriptor>,
    pub menus: Vec<MenuNode>,
}

/// Build the menu tree and flat descriptor list from server records.
///
/// Only server-provided entries are produced; see [`with_fixed_entries`]
/// for the dashboard/settings augmentation.
pub fn build_navigation(modules: &[ModuleRecord]) -> NavigationBuild {
    let mut descriptors = Vec::new();
    let menus = modules
        .iter()
        .map(|module| {
            let icon = if module.menus.is_empty() {
                MenuIcon::Screen
            } else {
                MenuIcon::Folder
            };
            collect(module, icon, &mut descriptors)
        })
        .collect();

    debug!(
        modules = modules.len(),
        descriptors = descriptors.len(),
        "built navigation from permission tree"
    );

    NavigationBuild { descriptors, menus }
}

fn collect(
    record: &ModuleRecord,
    icon: MenuIcon,
    descriptors: &mut Vec<RouteDescriptor>,
) -> MenuNode {
    let path = effective_path(&record.url);

    // Empty url: grouping node, never a navigation target.
    if let Some(component) = record.component_id()
        && !path.is_empty()
    {
        descriptors.push(RouteDescriptor::new(&record.name, &path, component));
    }

    let children = record
        .menus
        .iter()
        .map(|menu| collect(menu, MenuIcon::Code, descriptors))
        .collect();

    MenuNode {
        id: record.id.clone(),
        label: record.name.clone(),
        url: path,
        icon,
        component: record.component_id().map(str::to_string),
        children,
    }
}

/// The dashboard menu entry.
pub fn dashboard_entry() -> MenuNode {
    MenuNode {
        id: DASHBOARD_ID.to_string(),
        label: "Dashboard".to_string(),
        url: DASHBOARD_PATH.to_string(),
        icon: MenuIcon::Dashboard,
        component: None,
        children: Vec::new(),
    }
}

/// The settings menu entry.
pub fn settings_entry() -> MenuNode {
    MenuNode {
        id: SETTINGS_ID.to_string(),
        label: "Settings".to_string(),
        url: SETTINGS_PATH.to_string(),
        icon: MenuIcon::Settings,
        component: None,
        children: Vec::new(),
    }
}

/// Prepend the dashboard and, for admins, append settings.
pub fn with_fixed_entries(menus: Vec<MenuNode>, is_admin: bool) -> Vec<MenuNode> {
    let mut all = Vec::with_capacity(menus.len() + 2);
    all.push(dashboard_entry());
    all.extend(menus);
    if is_admin {
        all.push(settings_entry());
    }
    all
}

/// Find a node anywhere in the forest.
pub fn find_menu<'a>(menus: &'a [MenuNode], id: &str) -> Option<&'a MenuNode> {
    menus.iter().find_map(|node| {
        if node.id == id {
            Some(node)
        } else {
            find_menu(&node.children, id)
        }
    })
}

/// The chain of nodes from a root down to `id`, inclusive.
pub fn menu_ancestry<'a>(menus: &'a [MenuNode], id: &str) -> Option<Vec<&'a MenuNode>> {
    for node in menus {
        if node.id == id {
            return Some(vec![node]);
        }
        if let Some(mut chain) = menu_ancestry(&node.children, id) {
            chain.insert(0, node);
            return Some(chain);
        }
    }
    None
}
