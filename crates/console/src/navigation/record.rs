//! Permission-tree payloads as the account service sends them.
//!
//! These types are the decode boundary: anything that does not fit them is
//! rejected as a whole instead of leaking loosely-typed JSON inward.

use serde::{Deserialize, Serialize};

/// One node of the organisation-defined navigation hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    /// Either a JSON descriptor `{"url":"a.b.c"}` or a plain path.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub menus: Vec<ModuleRecord>,
}

impl ModuleRecord {
    /// A record with no url, component, or children.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: String::new(),
            component: None,
            menus: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_menu(mut self, menu: ModuleRecord) -> Self {
        self.menus.push(menu);
        self
    }

    /// Component id, treating blank strings as absent.
    pub fn component_id(&self) -> Option<&str> {
        self.component.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// A role as the account service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRole {
    pub key: String,
    pub name: String,
}

/// The user block of login and session-resource responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUser {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub roles: Vec<AccountRole>,
}

/// `data` of the session-resources endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesPayload {
    pub user: AccountUser,
    pub modules: Vec<ModuleRecord>,
}

/// `data` of the remote-login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub token: String,
    pub user: AccountUser,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
