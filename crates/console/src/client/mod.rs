//! Upstream service client.
//!
//! All account, management-tree, and annex traffic goes through the
//! [`ConsoleApi`] trait so the console can run against the real services
//! ([`HttpConsoleApi`]) or a test double.

mod http;
pub mod upload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::{Envelope, HttpConsoleApi, TOKEN_HEADER};

use crate::auth::login::Credentials;
use crate::error::ApiError;
use crate::navigation::{LoginPayload, ResourcesPayload};
use crate::tree::{TreeKind, TreeNodeData};

/// A file to forward to the annex service.
#[derive(Debug, Clone)]
pub struct AnnexUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Related object (table) name.
    pub related_object: String,
    /// Related object field name.
    pub related_field: String,
    /// Related object primary key.
    pub related_id: String,
    /// Display name chosen for the file.
    pub custom_name: String,
}

/// Annex service acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnexReceipt {
    pub id: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Verification image for the login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    /// Base64-encoded JPEG.
    pub code: String,
}

/// Operations the console needs from the upstream services.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Exchange a plaintext password for its transport encoding.
    async fn encode_password(&self, password: &str) -> Result<String, ApiError>;

    /// Log in with an already-encoded password.
    async fn remote_login(&self, credentials: &Credentials) -> Result<LoginPayload, ApiError>;

    /// Fetch a fresh verification image.
    async fn verification_code(&self, token: &str) -> Result<VerificationCode, ApiError>;

    /// Fetch the user's permission tree.
    async fn session_resources(&self, token: &str) -> Result<ResourcesPayload, ApiError>;

    /// Fetch the direct children of a management-tree node.
    async fn tree_children(
        &self,
        token: &str,
        kind: TreeKind,
        key: &str,
    ) -> Result<Vec<TreeNodeData>, ApiError>;

    /// Upload one file.
    async fn upload_annex(&self, token: &str, upload: AnnexUpload)
    -> Result<AnnexReceipt, ApiError>;

    /// Soft-delete an uploaded file.
    async fn delete_annex(&self, token: &str, annex_id: &str) -> Result<(), ApiError>;
}
