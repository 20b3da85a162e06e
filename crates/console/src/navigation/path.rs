//! Path derivation for module/menu `url` fields.

use serde::Deserialize;

#[derive(Deserialize)]
struct UrlDescriptor {
    url: String,
}

/// Derive the navigation path for a record's `url` field.
///
/// Two encodings are accepted: a JSON descriptor `{"url":"a.b.c"}`, whose
/// dotted path becomes `a/b/c`, and a plain string, returned unchanged.
/// Anything that is not a descriptor is treated as a plain string.
pub fn effective_path(raw: &str) -> String {
    match serde_json::from_str::<UrlDescriptor>(raw) {
        Ok(descriptor) => descriptor.url.replace('.', "/"),
        Err(_) => raw.to_string(),
    }
}

/// Join a route path onto a parent path.
///
/// Absolute children are kept as-is; the empty child is the parent itself.
pub fn join_route_path(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return child.to_string();
    }
    let parent = parent.trim_end_matches('/');
    if child.is_empty() {
        return if parent.is_empty() {
            "/".to_string()
        } else {
            parent.to_string()
        };
    }
    format!("{parent}/{child}")
}
