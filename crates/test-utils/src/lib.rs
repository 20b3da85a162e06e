//! Tyr test utilities.
//!
//! Helpers for integration testing: upstream payload fixtures in the wire
//! format the account and platform services use, plus assertion helpers.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// Wrap a payload in a successful `{success, message, data}` envelope.
pub fn envelope_ok(data: JsonValue) -> JsonValue {
    json!({ "success": true, "message": null, "data": data })
}

/// An envelope the upstream rejected.
pub fn envelope_rejected(message: &str) -> JsonValue {
    json!({ "success": false, "message": message, "data": null })
}

/// A fresh opaque session token.
pub fn test_token() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Create a test account user with default values.
pub fn test_user(name: &str) -> TestUser {
    TestUser {
        user_id: Uuid::now_v7().to_string(),
        user_name: name.to_string(),
        picture_url: None,
        roles: Vec::new(),
    }
}

/// Create an account user holding the admin role.
pub fn admin_user(name: &str) -> TestUser {
    test_user(name).with_role("admin", "Administrator")
}

/// An account user builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: String,
    pub user_name: String,
    pub picture_url: Option<String>,
    pub roles: Vec<(String, String)>,
}

impl TestUser {
    /// Set a custom ID.
    pub fn with_id(mut self, id: &str) -> Self {
        self.user_id = id.to_string();
        self
    }

    /// Add a role.
    pub fn with_role(mut self, key: &str, name: &str) -> Self {
        self.roles.push((key.to_string(), name.to_string()));
        self
    }

    pub fn with_picture(mut self, url: &str) -> Self {
        self.picture_url = Some(url.to_string());
        self
    }

    /// Wire JSON for the user block.
    pub fn to_json(&self) -> JsonValue {
        let roles: Vec<JsonValue> = self
            .roles
            .iter()
            .map(|(key, name)| json!({ "key": key, "name": name }))
            .collect();
        json!({
            "userId": self.user_id,
            "userName": self.user_name,
            "pictureUrl": self.picture_url,
            "roles": roles,
        })
    }
}

/// Create a module record with only an id and name.
pub fn module(id: &str, name: &str) -> TestModule {
    TestModule {
        id: id.to_string(),
        name: name.to_string(),
        url: None,
        component: None,
        menus: Vec::new(),
    }
}

/// A permission-tree record builder.
#[derive(Debug, Clone)]
pub struct TestModule {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub component: Option<String>,
    pub menus: Vec<TestModule>,
}

impl TestModule {
    /// Set a plain url path.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Set a dotted url descriptor, encoded as `{"url":"a.b.c"}`.
    pub fn with_descriptor(mut self, dotted: &str) -> Self {
        self.url = Some(json!({ "url": dotted }).to_string());
        self
    }

    /// Set the component id.
    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    /// Add a child record.
    pub fn with_menu(mut self, menu: TestModule) -> Self {
        self.menus.push(menu);
        self
    }

    /// Wire JSON for the record and its subtree.
    pub fn to_json(&self) -> JsonValue {
        let menus: Vec<JsonValue> = self.menus.iter().map(TestModule::to_json).collect();
        json!({
            "id": self.id,
            "name": self.name,
            "url": self.url,
            "component": self.component,
            "menus": menus,
        })
    }
}

/// `data` of the session-resources endpoint.
pub fn resources(user: &TestUser, modules: &[TestModule]) -> JsonValue {
    let modules: Vec<JsonValue> = modules.iter().map(TestModule::to_json).collect();
    json!({ "user": user.to_json(), "modules": modules })
}

/// `data` of the remote-login endpoint.
pub fn login_payload(token: &str, user: &TestUser) -> JsonValue {
    json!({ "token": token, "user": user.to_json() })
}

/// Management-tree payload builders.
pub mod trees {
    use serde_json::{Value, json};

    /// A node that may have children.
    pub fn branch(key: &str, title: &str) -> Value {
        json!({ "key": key, "title": title, "isLeaf": false })
    }

    /// A node with no children.
    pub fn leaf(key: &str, title: &str) -> Value {
        json!({ "key": key, "title": title, "isLeaf": true })
    }
}

/// Assertion helpers for JSON and HTML content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON array contains a string element.
    pub fn array_contains(value: &Value, expected: &str) {
        let found = value
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item == expected));
        assert!(found, "Expected array to contain '{expected}', got: {value}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn user_builder() {
        let user = admin_user("Ada Lovelace").with_id("u1");
        let json = user.to_json();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["roles"][0]["key"], "admin");
        assert!(json["pictureUrl"].is_null());
    }

    #[test]
    fn module_builder_nests() {
        let tree = module("m1", "Sales")
            .with_menu(module("m1-1", "Report").with_descriptor("sales.report"));
        let json = tree.to_json();
        assert!(json["url"].is_null());
        assert_eq!(json["menus"][0]["url"], "{\"url\":\"sales.report\"}");
    }

    #[test]
    fn envelopes() {
        let ok = envelope_ok(json!({"code": "R0lG"}));
        assert_eq!(ok["success"], true);
        let rejected = envelope_rejected("nope");
        assert_eq!(rejected["success"], false);
        assert::has_key(&rejected, "message");
    }

    #[test]
    fn assertions() {
        assert::array_contains(&json!(["/main", "/login"]), "/login");
        assert::contains("hello world", "world");
        assert::not_contains("hello world", "foo");
    }
}
