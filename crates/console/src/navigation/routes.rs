//! Resolved route tables.
//!
//! A [`RouteTable`] pairs paths with what to render there and which guard
//! applies. Tables are rebuilt wholesale whenever the session or the
//! permission tree changes; they are never patched in place.

use serde::Serialize;
use tracing::warn;

use super::builder::RouteDescriptor;
use super::path::join_route_path;
use crate::gate::Guard;
use crate::registry::{ComponentRegistry, Screen, ScreenKind};

/// Built-in pages that exist independently of the permission tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Home,
    Login,
    Success,
    Unauthorized,
    /// Shell chrome (sidebar, header) around `/main` children.
    MainLayout,
    /// Blank landing page inside the shell.
    Main,
    Trays,
    Dashboard,
    Settings,
    NotFound,
}

/// Frame wrapped around a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Table,
    Form,
}

impl Layout {
    /// Frame for a screen kind; `Other` screens are mounted unwrapped.
    pub fn for_kind(kind: ScreenKind) -> Option<Self> {
        match kind {
            ScreenKind::Tabular => Some(Layout::Table),
            ScreenKind::Form => Some(Layout::Form),
            ScreenKind::Other => None,
        }
    }
}

/// What a route renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Page { page: Page },
    Screen { screen: Screen, layout: Option<Layout> },
    Redirect { to: String },
}

impl Element {
    fn page(page: Page) -> Self {
        Element::Page { page }
    }
}

/// A node of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRoute {
    pub path: String,
    pub element: Element,
    pub guard: Option<Guard>,
    /// Index route (rendered at the parent's own path).
    pub index: bool,
    pub children: Vec<ResolvedRoute>,
}

impl ResolvedRoute {
    pub fn new(path: impl Into<String>, element: Element) -> Self {
        Self {
            path: path.into(),
            element,
            guard: None,
            index: false,
            children: Vec::new(),
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn as_index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn with_children(mut self, children: Vec<ResolvedRoute>) -> Self {
        self.children = children;
        self
    }
}

/// Outcome of resolving descriptors against the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub routes: Vec<ResolvedRoute>,
    /// Component ids that did not resolve.
    pub dropped: Vec<String>,
}

/// Pair each descriptor with its registry entry.
///
/// Unknown components are logged and skipped; their siblings are kept.
pub fn resolve_routes(descriptors: &[RouteDescriptor], registry: &ComponentRegistry) -> Resolution {
    let mut resolution = Resolution::default();
    for descriptor in descriptors {
        let Some(entry) = registry.lookup(&descriptor.component) else {
            warn!(
                component = %descriptor.component,
                path = %descriptor.path,
                "no registered screen for component; route ignored"
            );
            resolution.dropped.push(descriptor.component.clone());
            continue;
        };

        let nested = resolve_routes(&descriptor.children, registry);
        resolution.dropped.extend(nested.dropped);

        resolution.routes.push(
            ResolvedRoute::new(
                descriptor.path.clone(),
                Element::Screen {
                    screen: entry.screen,
                    layout: Layout::for_kind(entry.kind),
                },
            )
            .guarded(Guard::Authenticated)
            .with_children(nested.routes),
        );
    }
    resolution
}

/// Descriptors for registry entries that declare their own path.
pub fn registry_descriptors(registry: &ComponentRegistry) -> Vec<RouteDescriptor> {
    registry
        .entries()
        .filter_map(|entry| {
            entry
                .path
                .as_ref()
                .map(|path| RouteDescriptor::new(entry.screen.name(), path, entry.screen.name()))
        })
        .collect()
}

/// A successful path lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub path: String,
    pub element: Element,
    /// Guards from the outermost route inward.
    pub guards: Vec<Guard>,
}

/// The routing table handed to the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    routes: Vec<ResolvedRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<ResolvedRoute>) -> Self {
        Self { routes }
    }

    /// Routes available to a visitor without a session.
    pub fn guest() -> Self {
        Self::new(vec![
            ResolvedRoute::new("/login", Element::page(Page::Login)),
            ResolvedRoute::new("/", Element::page(Page::Home)),
            ResolvedRoute::new("/main", Element::page(Page::MainLayout)).with_children(vec![
                ResolvedRoute::new("", Element::page(Page::Main))
                    .as_index()
                    .guarded(Guard::Authenticated),
            ]),
            ResolvedRoute::new(
                "*",
                Element::Redirect {
                    to: "/login".to_string(),
                },
            ),
        ])
    }

    /// Static routes for an authenticated session.
    ///
    /// Also used when the permission tree cannot be loaded.
    pub fn defaults() -> Self {
        Self::new(default_routes())
    }

    /// Defaults plus a `/main` layout carrying the dynamic screens.
    pub fn with_dynamic(dynamic: Vec<ResolvedRoute>) -> Self {
        let mut routes = default_routes();
        routes.push(
            ResolvedRoute::new("/main", Element::page(Page::MainLayout)).with_children(dynamic),
        );
        Self::new(routes)
    }

    pub fn routes(&self) -> &[ResolvedRoute] {
        &self.routes
    }

    /// Find what renders at `path`.
    ///
    /// Exact paths are matched depth-first in declaration order, so a later
    /// duplicate is shadowed by an earlier one. A `*` route only applies
    /// when nothing else matched.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize(path);
        let mut fallback = None;
        let found = find(&self.routes, "", &[], &path, &mut fallback);
        found.or(fallback)
    }

    /// Every concrete (non-layout, non-catch-all) path in the table.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_paths(&self.routes, "", &mut out);
        out
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::guest()
    }
}

fn default_routes() -> Vec<ResolvedRoute> {
    vec![
        ResolvedRoute::new("/", Element::page(Page::Home)),
        ResolvedRoute::new("/login", Element::page(Page::Login)),
        ResolvedRoute::new("/success", Element::page(Page::Success)),
        ResolvedRoute::new("/401", Element::page(Page::Unauthorized)),
        ResolvedRoute::new("/main", Element::page(Page::MainLayout)).with_children(vec![
            ResolvedRoute::new("", Element::page(Page::Main))
                .as_index()
                .guarded(Guard::Authenticated),
            ResolvedRoute::new("trays", Element::page(Page::Trays)).guarded(Guard::Authenticated),
            ResolvedRoute::new("dashboard", Element::page(Page::Dashboard))
                .guarded(Guard::Authenticated),
            ResolvedRoute::new("settings", Element::page(Page::Settings))
                .guarded(Guard::AdminOnly),
        ]),
        ResolvedRoute::new("*", Element::page(Page::NotFound)),
    ]
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn is_layout(route: &ResolvedRoute) -> bool {
    matches!(
        route.element,
        Element::Page {
            page: Page::MainLayout
        }
    )
}

fn find(
    routes: &[ResolvedRoute],
    base: &str,
    guards: &[Guard],
    target: &str,
    fallback: &mut Option<RouteMatch>,
) -> Option<RouteMatch> {
    for route in routes {
        let mut chain = guards.to_vec();
        chain.extend(route.guard);

        if route.path == "*" {
            if fallback.is_none() {
                *fallback = Some(RouteMatch {
                    path: target.to_string(),
                    element: route.element.clone(),
                    guards: chain,
                });
            }
            continue;
        }

        let full = if route.index {
            join_route_path(base, "")
        } else {
            join_route_path(base, &route.path)
        };

        if !is_layout(route) && full == target {
            return Some(RouteMatch {
                path: full,
                element: route.element.clone(),
                guards: chain,
            });
        }

        if let Some(found) = find(&route.children, &full, &chain, target, fallback) {
            return Some(found);
        }
    }
    None
}

fn collect_paths(routes: &[ResolvedRoute], base: &str, out: &mut Vec<String>) {
    for route in routes {
        if route.path == "*" {
            continue;
        }
        let full = if route.index {
            join_route_path(base, "")
        } else {
            join_route_path(base, &route.path)
        };
        if !is_layout(route) {
            out.push(full.clone());
        }
        collect_paths(&route.children, &full, out);
    }
}
