//! Component registry - the closed set of screens the console can render.
//!
//! The permission tree names screens by symbolic string ids. Those strings
//! become typed [`Screen`] values exactly once, in [`Screen::from_name`];
//! everything downstream matches on the enum.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

/// How a screen is framed when it is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    /// Query/list screens, framed by the table layout.
    Tabular,
    /// Edit/detail screens, framed by the form layout.
    Form,
    /// Self-framing screens, mounted as-is.
    Other,
}

/// Every screen the console knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Screen {
    UserList,
    NewUser,
    Profile,
    GroupTree,
    ModuleTree,
    Purview,
    Deployments,
    TreeTable,
    SalesReport,
}

impl Screen {
    /// All screens, in registration order.
    pub const ALL: [Screen; 9] = [
        Screen::UserList,
        Screen::NewUser,
        Screen::Profile,
        Screen::GroupTree,
        Screen::ModuleTree,
        Screen::Purview,
        Screen::Deployments,
        Screen::TreeTable,
        Screen::SalesReport,
    ];

    /// Symbolic id used by the permission service.
    pub fn name(self) -> &'static str {
        match self {
            Screen::UserList => "UserListPage",
            Screen::NewUser => "NewUserPage",
            Screen::Profile => "ProfilePage",
            Screen::GroupTree => "GroupManagementTreePage",
            Screen::ModuleTree => "ModuleManagementTreePage",
            Screen::Purview => "PurviewPage",
            Screen::Deployments => "DeploymentsList",
            Screen::TreeTable => "TreeTable",
            Screen::SalesReport => "SalesReport",
        }
    }

    /// Parse a symbolic id from the permission service.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn kind(self) -> ScreenKind {
        match self {
            Screen::UserList | Screen::Deployments | Screen::TreeTable | Screen::SalesReport => {
                ScreenKind::Tabular
            }
            Screen::NewUser | Screen::Profile => ScreenKind::Form,
            Screen::GroupTree | Screen::ModuleTree | Screen::Purview => ScreenKind::Other,
        }
    }

    /// Human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            Screen::UserList => "Users",
            Screen::NewUser => "New User",
            Screen::Profile => "Profile",
            Screen::GroupTree => "Groups",
            Screen::ModuleTree => "Modules & Menus",
            Screen::Purview => "Purview",
            Screen::Deployments => "Deployments",
            Screen::TreeTable => "Tree Table",
            Screen::SalesReport => "Sales Report",
        }
    }

    /// Route path the screen registers on its own, relative to `/main`.
    ///
    /// Screens without one are reachable only through the permission tree.
    pub fn declared_path(self) -> Option<&'static str> {
        match self {
            Screen::Profile => Some("settings/profile"),
            _ => None,
        }
    }

    /// Template that renders the screen body.
    pub fn template(self) -> &'static str {
        match self {
            Screen::GroupTree | Screen::ModuleTree => "screens/tree.html",
            _ => "screens/screen.html",
        }
    }
}

/// A registry entry: the screen plus its resolved display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub screen: Screen,
    pub kind: ScreenKind,
    pub path: Option<String>,
}

impl RegistryEntry {
    fn for_screen(screen: Screen) -> Self {
        Self {
            screen,
            kind: screen.kind(),
            path: screen.declared_path().map(str::to_string),
        }
    }
}

/// Read-only lookup from symbolic id to screen, built once at startup.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    by_name: HashMap<&'static str, RegistryEntry>,
    order: Vec<&'static str>,
}

impl ComponentRegistry {
    /// Registry containing every [`Screen`].
    pub fn builtin() -> Self {
        Self::with_screens(&Screen::ALL)
    }

    /// Registry restricted to the given screens.
    pub fn with_screens(screens: &[Screen]) -> Self {
        let mut by_name = HashMap::with_capacity(screens.len());
        let mut order = Vec::with_capacity(screens.len());
        for &screen in screens {
            if by_name
                .insert(screen.name(), RegistryEntry::for_screen(screen))
                .is_none()
            {
                order.push(screen.name());
            }
        }
        debug!(entries = order.len(), "built component registry");
        Self { by_name, order }
    }

    /// Look up an entry by symbolic id.
    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry> {
        self.by_name.get(name)
    }

    /// First entry (in registration order) declaring `path`.
    pub fn find_by_path(&self, path: &str) -> Option<&RegistryEntry> {
        self.entries().find(|e| e.path.as_deref() == Some(path))
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
