//! Authentication state.
//!
//! - [`SessionStore`]: the in-memory token/user pair for one console
//! - [`marker`]: the token persisted in the browser's session record
//! - [`login`]: the two-step password login against the account service

pub mod login;
pub mod marker;

use serde::{Deserialize, Serialize};

use crate::gate::AccessState;
use crate::navigation::AccountUser;

/// Id of the sentinel guest identity.
pub const GUEST_USER_ID: &str = "-1";

/// Role key that grants admin access.
pub const ADMIN_ROLE_KEY: &str = "admin";

/// A role held by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub key: String,
    pub name: String,
}

/// The current user as the console sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub roles: Vec<Role>,
}

impl UserInfo {
    /// The guest identity.
    pub fn guest() -> Self {
        Self {
            id: GUEST_USER_ID.to_string(),
            name: "Guest".to_string(),
            picture_url: None,
            roles: Vec::new(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.id == GUEST_USER_ID
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.key == ADMIN_ROLE_KEY)
    }
}

impl From<AccountUser> for UserInfo {
    fn from(user: AccountUser) -> Self {
        Self {
            id: user.user_id,
            name: user.user_name,
            picture_url: user.picture_url.filter(|u| !u.is_empty()),
            roles: user
                .roles
                .into_iter()
                .map(|r| Role {
                    key: r.key,
                    name: r.name,
                })
                .collect(),
        }
    }
}

/// Token plus user; an empty token is the guest state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserInfo,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self {
            token: String::new(),
            user: UserInfo::guest(),
        }
    }
}

/// In-memory session for one console context.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: AuthSession,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &str {
        &self.current.token
    }

    pub fn user(&self) -> &UserInfo {
        &self.current.user
    }

    pub fn snapshot(&self) -> AuthSession {
        self.current.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.current.token.is_empty()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.current.token = token.into();
    }

    pub fn set_user(&mut self, user: UserInfo) {
        self.current.user = user;
    }

    /// Back to the guest state.
    pub fn clear(&mut self) {
        self.current = AuthSession::default();
    }

    /// Gate state derived from token and roles.
    pub fn access(&self) -> AccessState {
        AccessState::of(self.is_authenticated(), self.current.user.is_admin())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::navigation::AccountRole;

    fn account_user(roles: &[&str]) -> AccountUser {
        AccountUser {
            user_id: "42".to_string(),
            user_name: "Ada".to_string(),
            picture_url: Some(String::new()),
            roles: roles
                .iter()
                .map(|k| AccountRole {
                    key: (*k).to_string(),
                    name: k.to_uppercase(),
                })
                .collect(),
        }
    }

    #[test]
    fn transform_maps_account_user() {
        let user = UserInfo::from(account_user(&["admin", "ops"]));
        assert_eq!(user.id, "42");
        assert_eq!(user.name, "Ada");
        assert!(user.picture_url.is_none());
        assert!(user.is_admin());
        assert!(!user.is_guest());
    }

    #[test]
    fn new_store_is_guest() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());
        assert!(store.user().is_guest());
        assert_eq!(store.access(), AccessState::Guest);
    }

    #[test]
    fn access_follows_token_and_roles() {
        let mut store = SessionStore::new();
        store.set_token("t-1");
        store.set_user(UserInfo::from(account_user(&["ops"])));
        assert_eq!(store.access(), AccessState::Member);

        store.set_user(UserInfo::from(account_user(&["admin"])));
        assert_eq!(store.access(), AccessState::Admin);

        store.clear();
        assert_eq!(store.token(), "");
        assert!(store.user().is_guest());
        assert_eq!(store.access(), AccessState::Guest);
    }

    #[test]
    fn admin_role_without_token_is_still_guest() {
        let mut store = SessionStore::new();
        store.set_user(UserInfo::from(account_user(&["admin"])));
        assert_eq!(store.access(), AccessState::Guest);
    }
}
