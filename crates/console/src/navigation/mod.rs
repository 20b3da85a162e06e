//! Permission-driven navigation.
//!
//! The account service returns a tree of module/menu records per user. From
//! it this module produces:
//! - the sidebar menu (same hierarchy, plus fixed dashboard/settings entries)
//! - a routing table whose screens are resolved through the
//!   [`ComponentRegistry`](crate::registry::ComponentRegistry)

mod builder;
mod path;
mod record;
mod routes;

pub use builder::{
    DASHBOARD_ID, DASHBOARD_PATH, MenuIcon, MenuNode, NavigationBuild, RouteDescriptor,
    SETTINGS_ID, SETTINGS_PATH, TRAY_PATH, build_navigation, dashboard_entry, find_menu,
    is_reserved_id, menu_ancestry, settings_entry, with_fixed_entries,
};
pub use path::{effective_path, join_route_path};
pub use record::{AccountRole, AccountUser, LoginPayload, ModuleRecord, ResourcesPayload};
pub use routes::{
    Element, Layout, Page, Resolution, ResolvedRoute, RouteMatch, RouteTable,
    registry_descriptors, resolve_routes,
};

use crate::registry::ComponentRegistry;

/// Menus and routes assembled for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledNavigation {
    pub menus: Vec<MenuNode>,
    pub routes: RouteTable,
    /// Component ids that were dropped during resolution.
    pub dropped: Vec<String>,
}

/// Run the full pipeline for one permission tree.
///
/// Registry-declared routes come first, then the server's, so a server
/// route reusing a registry path is shadowed.
pub fn assemble(
    modules: &[ModuleRecord],
    registry: &ComponentRegistry,
    is_admin: bool,
) -> AssembledNavigation {
    let build = build_navigation(modules);

    let mut descriptors = registry_descriptors(registry);
    descriptors.extend(build.descriptors);

    let resolution = resolve_routes(&descriptors, registry);

    AssembledNavigation {
        menus: with_fixed_entries(build.menus, is_admin),
        routes: RouteTable::with_dynamic(resolution.routes),
        dropped: resolution.dropped,
    }
}
