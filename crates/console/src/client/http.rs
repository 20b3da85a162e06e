//! reqwest-backed [`ConsoleApi`].

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::{AnnexReceipt, AnnexUpload, ConsoleApi, VerificationCode};
use crate::auth::login::Credentials;
use crate::config::Config;
use crate::error::ApiError;
use crate::navigation::{LoginPayload, ResourcesPayload};
use crate::tree::{TreeKind, TreeNodeData};

/// Header carrying the session token on every upstream call.
pub const TOKEN_HEADER: &str = "grooveToken";

/// Response envelope shared by every upstream endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// HTTP client for the account, platform, and file services.
#[derive(Debug, Clone)]
pub struct HttpConsoleApi {
    client: reqwest::Client,
    acc: Url,
    bpc: Url,
    frc: Url,
}

impl HttpConsoleApi {
    /// Build a client with the configured fixed timeout.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            acc: config.acc_api_url.clone(),
            bpc: config.bpc_api_url.clone(),
            frc: config.frc_api_url.clone(),
        })
    }

    fn endpoint(base: &Url, path: &str) -> Result<Url, ApiError> {
        base.join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint '{path}': {e}")))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        let mut request = self.client.post(url.clone()).json(&body);
        if !token.is_empty() {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request.send().await?;
        decode_response(url.path(), response).await
    }
}

/// Map status codes and the `{success, message, data}` envelope onto
/// [`ApiError`], then decode `data` into `T`.
async fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => {
            let message = response.text().await.unwrap_or_default();
            warn!(endpoint, "upstream rejected session token");
            return Err(ApiError::Unauthorized { message });
        }
        StatusCode::BAD_REQUEST => return Err(ApiError::BadRequest),
        s if !s.is_success() => {
            return Err(ApiError::Transport(format!(
                "unexpected status {s} from {endpoint}"
            )));
        }
        _ => {}
    }

    let envelope: Envelope<Value> = response.json().await.map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    if !envelope.success {
        debug!(endpoint, message = ?envelope.message, "upstream reported failure");
        return Err(ApiError::Rejected {
            message: envelope.message.unwrap_or_default(),
        });
    }

    serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ConsoleApi for HttpConsoleApi {
    async fn encode_password(&self, password: &str) -> Result<String, ApiError> {
        let url = Self::endpoint(&self.acc, "checkcode/get/encryptedpwd")?;
        self.post_json(url, "", json!({ "pwd": password })).await
    }

    async fn remote_login(&self, credentials: &Credentials) -> Result<LoginPayload, ApiError> {
        let url = Self::endpoint(&self.acc, "remotelogin")?;
        self.post_json(
            url,
            "",
            json!({
                "logid": credentials.login_id,
                "password": credentials.password,
                "code": credentials.check_code,
            }),
        )
        .await
    }

    async fn verification_code(&self, token: &str) -> Result<VerificationCode, ApiError> {
        let url = Self::endpoint(&self.acc, "getsharedcode/base64")?;
        self.post_json(url, token, json!({})).await
    }

    async fn session_resources(&self, token: &str) -> Result<ResourcesPayload, ApiError> {
        let url = Self::endpoint(&self.acc, "session/resources")?;
        self.post_json(url, token, json!({})).await
    }

    async fn tree_children(
        &self,
        token: &str,
        kind: TreeKind,
        key: &str,
    ) -> Result<Vec<TreeNodeData>, ApiError> {
        let mut url = Self::endpoint(&self.bpc, kind.lazy_endpoint())?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("platform base URL cannot take a path".to_string()))?
            .push(key);
        self.post_json(url, token, json!({})).await
    }

    async fn upload_annex(
        &self,
        token: &str,
        upload: AnnexUpload,
    ) -> Result<AnnexReceipt, ApiError> {
        let url = Self::endpoint(&self.frc, "annex/upload")?;
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = Form::new()
            .text("object", upload.related_object)
            .text("objectFieldId", upload.related_field)
            .text("fkId", upload.related_id)
            .text("cName", upload.custom_name)
            .part("file", part);

        let response = self
            .client
            .post(url.clone())
            .header(TOKEN_HEADER, token)
            .multipart(form)
            .send()
            .await?;
        decode_response(url.path(), response).await
    }

    async fn delete_annex(&self, token: &str, annex_id: &str) -> Result<(), ApiError> {
        let mut url = Self::endpoint(&self.frc, "annex/deletesoftly")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("file base URL cannot take a path".to_string()))?
            .push(annex_id);
        let _: Value = self.post_json(url, token, json!({})).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    async fn resources(headers: HeaderMap) -> axum::response::Response {
        match headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            Some("good") => Json(json!({
                "success": true,
                "data": {
                    "user": {"userId": "7", "userName": "Ada", "roles": []},
                    "modules": [{
                        "id": "m1", "name": "Sales",
                        "url": "{\"url\":\"sales.report\"}",
                        "component": "SalesReport", "menus": []
                    }]
                }
            }))
            .into_response(),
            Some("bad-shape") => {
                Json(json!({"success": true, "data": {"user": null}})).into_response()
            }
            Some("rejected") => {
                Json(json!({"success": false, "message": "Failed to get module-menu"}))
                    .into_response()
            }
            Some("malformed") => (AxumStatus::BAD_REQUEST, "nope").into_response(),
            _ => (AxumStatus::UNAUTHORIZED, "session expired").into_response(),
        }
    }

    async fn lazy_group(Path(key): Path<String>) -> Json<Value> {
        Json(json!({
            "success": true,
            "data": [{"title": format!("{key}-child"), "key": format!("{key}-1"), "isLeaf": true}]
        }))
    }

    async fn spawn_upstream() -> Config {
        let app = Router::new()
            .route("/api/session/resources", post(resources))
            .route("/api/group/lazyantdtreedata/{key}", post(lazy_group));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Config::for_upstream(&format!("http://{addr}/api")).unwrap()
    }

    #[tokio::test]
    async fn session_resources_decodes_payload() {
        let api = HttpConsoleApi::new(&spawn_upstream().await).unwrap();
        let payload = api.session_resources("good").await.unwrap();
        assert_eq!(payload.user.user_name, "Ada");
        assert_eq!(payload.modules[0].component_id(), Some("SalesReport"));
    }

    #[tokio::test]
    async fn status_and_envelope_map_to_error_kinds() {
        let api = HttpConsoleApi::new(&spawn_upstream().await).unwrap();

        assert!(matches!(
            api.session_resources("rejected").await,
            Err(ApiError::Rejected { message }) if message == "Failed to get module-menu"
        ));
        assert!(matches!(
            api.session_resources("expired").await,
            Err(ApiError::Unauthorized { message }) if message == "session expired"
        ));
        assert!(matches!(
            api.session_resources("malformed").await,
            Err(ApiError::BadRequest)
        ));
        assert!(matches!(
            api.session_resources("bad-shape").await,
            Err(ApiError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn tree_children_appends_key_segment() {
        let api = HttpConsoleApi::new(&spawn_upstream().await).unwrap();
        let children = api.tree_children("good", TreeKind::Group, "root").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].key, "root-1");
        assert_eq!(children[0].is_leaf, Some(true));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_error() {
        let config = Config::for_upstream("http://127.0.0.1:1/api").unwrap();
        let api = HttpConsoleApi::new(&config).unwrap();
        assert!(matches!(
            api.session_resources("good").await,
            Err(ApiError::Transport(_))
        ));
    }
}
