//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::gate::Guard;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Single outcome label.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

/// Gate redirect labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct GateLabels {
    pub guard: String,
    pub target: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Permission tree refreshes by outcome.
    pub navigation_refreshes: Family<OutcomeLabels, Counter>,

    /// Login attempts by outcome.
    pub logins: Family<OutcomeLabels, Counter>,

    /// Gate redirects by guard and target.
    pub gate_redirects: Family<GateLabels, Counter>,

    /// API requests rejected for lack of a session marker.
    pub marker_rejections: Counter,

    /// Routes dropped because their component is not registered.
    pub dropped_routes: Counter,

    /// Finished uploads by final status.
    pub uploads: Family<OutcomeLabels, Counter>,

    /// Live console contexts.
    pub console_contexts: Gauge,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let navigation_refreshes = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "navigation_refreshes",
            "Permission tree refreshes by outcome",
            navigation_refreshes.clone(),
        );

        let logins = Family::<OutcomeLabels, Counter>::default();
        registry.register("logins", "Login attempts by outcome", logins.clone());

        let gate_redirects = Family::<GateLabels, Counter>::default();
        registry.register(
            "gate_redirects",
            "Navigation attempts redirected by the access gate",
            gate_redirects.clone(),
        );

        let marker_rejections = Counter::default();
        registry.register(
            "marker_rejections",
            "API requests without a session marker",
            marker_rejections.clone(),
        );

        let dropped_routes = Counter::default();
        registry.register(
            "dropped_routes",
            "Routes dropped for unregistered components",
            dropped_routes.clone(),
        );

        let uploads = Family::<OutcomeLabels, Counter>::default();
        registry.register("uploads", "Uploads by final status", uploads.clone());

        let console_contexts = Gauge::default();
        registry.register(
            "console_contexts",
            "Live console contexts",
            console_contexts.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            navigation_refreshes,
            logins,
            gate_redirects,
            marker_rejections,
            dropped_routes,
            uploads,
            console_contexts,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a permission refresh and how many routes it dropped.
    pub fn record_refresh(&self, outcome: &str, dropped: usize) {
        self.navigation_refreshes
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
        self.dropped_routes.inc_by(dropped as u64);
    }

    pub fn record_login(&self, outcome: &str) {
        self.logins
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_gate_redirect(&self, guard: Guard, target: &str) {
        self.gate_redirects
            .get_or_create(&GateLabels {
                guard: guard.as_str().to_string(),
                target: target.to_string(),
            })
            .inc();
    }

    pub fn record_marker_rejection(&self) {
        self.marker_rejections.inc();
    }

    pub fn record_upload(&self, status: &str) {
        self.uploads
            .get_or_create(&OutcomeLabels {
                outcome: status.to_string(),
            })
            .inc();
    }

    pub fn set_console_contexts(&self, count: usize) {
        self.console_contexts.set(count as i64);
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse per-id path segments so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    if let [_, "main", "nav" | "toggle", id] = segments.as_mut_slice() {
        *id = ":id";
    } else if let [_, "api", "uploads", id, ..] = segments.as_mut_slice() {
        *id = ":id";
    } else if let [_, "api", "trees", _, key, ..] = segments.as_mut_slice() {
        *key = ":key";
    } else if let [_, "main", rest @ ..] = segments.as_slice()
        && !rest.is_empty()
        && !matches!(rest, ["dashboard"] | ["settings"] | ["trays"])
    {
        return "/main/:screen".to_string();
    }
    segments.join("/")
}
