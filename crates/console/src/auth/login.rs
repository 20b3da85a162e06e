//! Two-step password login.
//!
//! The plaintext password is first exchanged for its transport encoding,
//! then the encoded password is submitted with the login id and the
//! verification code.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::ConsoleApi;
use crate::error::ApiError;
use crate::navigation::LoginPayload;

/// Form fields as submitted by the login page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub logid: String,
    #[serde(default)]
    pub pwd: String,
    #[serde(default)]
    pub code: String,
}

/// Credentials sent to the account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login_id: String,
    /// Encoded, never plaintext.
    pub password: String,
    pub check_code: String,
}

/// Why a login attempt failed.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl LoginError {
    /// Message shown above the login form.
    pub fn notice_text(&self) -> String {
        match self {
            LoginError::MissingField(_) => self.to_string(),
            LoginError::Api(e) => e.notice_text(),
        }
    }

    /// Label for the login outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            LoginError::MissingField(_) => "invalid_form",
            LoginError::Api(ApiError::Rejected { .. }) => "rejected",
            LoginError::Api(ApiError::Unauthorized { .. }) => "unauthorized",
            LoginError::Api(_) => "error",
        }
    }
}

impl LoginForm {
    fn validate(&self) -> Result<(), LoginError> {
        if self.logid.trim().is_empty() {
            return Err(LoginError::MissingField("Login id"));
        }
        if self.pwd.is_empty() {
            return Err(LoginError::MissingField("Password"));
        }
        if self.code.trim().is_empty() {
            return Err(LoginError::MissingField("Verification code"));
        }
        Ok(())
    }
}

/// Log in against the account service.
///
/// Does not touch any session state; the caller applies the payload.
pub async fn login(api: &dyn ConsoleApi, form: &LoginForm) -> Result<LoginPayload, LoginError> {
    form.validate()?;

    let password = api.encode_password(&form.pwd).await?;
    debug!(login_id = %form.logid.trim(), "password encoded");

    let credentials = Credentials {
        login_id: form.logid.trim().to_string(),
        password,
        check_code: form.code.trim().to_string(),
    };
    let payload = api.remote_login(&credentials).await?;

    info!(user_id = %payload.user.user_id, "remote login succeeded");
    Ok(payload)
}
