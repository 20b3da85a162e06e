#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Tests drive the REAL console router and state. Only the upstream
//! services are replaced, by [`FakeConsoleApi`], whose replies are scripted
//! per test with the wire fixtures from `tyr-test-utils`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use tyr_console::auth::login::Credentials;
use tyr_console::client::{AnnexReceipt, AnnexUpload, ConsoleApi, VerificationCode};
use tyr_console::config::Config;
use tyr_console::error::ApiError;
use tyr_console::navigation::{LoginPayload, ResourcesPayload};
use tyr_console::session::session_layer;
use tyr_console::state::AppState;
use tyr_console::tree::{TreeKind, TreeNodeData};
use tyr_test_utils::{TestModule, TestUser, login_payload, resources};

/// Password the fake account service accepts.
pub const PASSWORD: &str = "secret";

/// A scripted upstream reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Rejected(String),
    Unauthorized,
    BadRequest,
    Down,
}

impl Reply {
    fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Reply::Ok(value) => serde_json::from_value(value).map_err(|e| ApiError::Decode {
                endpoint: "fake".to_string(),
                reason: e.to_string(),
            }),
            Reply::Rejected(message) => Err(ApiError::Rejected { message }),
            Reply::Unauthorized => Err(ApiError::Unauthorized {
                message: "Session expired".to_string(),
            }),
            Reply::BadRequest => Err(ApiError::BadRequest),
            Reply::Down => Err(ApiError::Transport("connection refused".to_string())),
        }
    }
}

/// In-process stand-in for the account, platform, and file services.
pub struct FakeConsoleApi {
    token: String,
    user: Mutex<TestUser>,
    modules: Mutex<Vec<TestModule>>,
    /// Replies used before falling back to `user` + `modules`, each after
    /// its delay.
    scripted_resources: Mutex<VecDeque<(Duration, Reply)>>,
    trees: Mutex<HashMap<(TreeKind, String), Reply>>,
    upload_delay: Mutex<Duration>,
    upload_reply: Mutex<Option<Reply>>,
    delete_reply: Mutex<Option<Reply>>,
    pub resource_calls: AtomicUsize,
    pub tree_calls: AtomicUsize,
    pub uploads: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeConsoleApi {
    pub fn new(user: TestUser, modules: Vec<TestModule>) -> Self {
        Self {
            token: tyr_test_utils::test_token(),
            user: Mutex::new(user),
            modules: Mutex::new(modules),
            scripted_resources: Mutex::new(VecDeque::new()),
            trees: Mutex::new(HashMap::new()),
            upload_delay: Mutex::new(Duration::ZERO),
            upload_reply: Mutex::new(None),
            delete_reply: Mutex::new(None),
            resource_calls: AtomicUsize::new(0),
            tree_calls: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// The token handed out on login.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn set_modules(&self, modules: Vec<TestModule>) {
        *self.modules.lock() = modules;
    }

    /// Queue the next session-resources reply.
    pub fn script_resources(&self, delay: Duration, reply: Reply) {
        self.scripted_resources.lock().push_back((delay, reply));
    }

    pub fn set_tree(&self, kind: TreeKind, key: &str, reply: Reply) {
        self.trees.lock().insert((kind, key.to_string()), reply);
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock() = delay;
    }

    /// Answer every upload with `reply` instead of a receipt.
    pub fn set_upload_reply(&self, reply: Reply) {
        *self.upload_reply.lock() = Some(reply);
    }

    /// Answer every annex delete with `reply`.
    pub fn set_delete_reply(&self, reply: Reply) {
        *self.delete_reply.lock() = Some(reply);
    }
}

#[async_trait]
impl ConsoleApi for FakeConsoleApi {
    async fn encode_password(&self, password: &str) -> Result<String, ApiError> {
        Ok(format!("enc:{password}"))
    }

    async fn remote_login(&self, credentials: &Credentials) -> Result<LoginPayload, ApiError> {
        if credentials.password != format!("enc:{PASSWORD}") {
            return Reply::Rejected("Invalid login id or password".to_string()).into_result();
        }
        let payload = login_payload(&self.token, &self.user.lock());
        Reply::Ok(payload).into_result()
    }

    async fn verification_code(&self, _token: &str) -> Result<VerificationCode, ApiError> {
        Ok(VerificationCode {
            code: "R0lGODlhAQABAAAAACw=".to_string(),
        })
    }

    async fn session_resources(&self, token: &str) -> Result<ResourcesPayload, ApiError> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.scripted_resources.lock().pop_front();
        if let Some((delay, reply)) = scripted {
            tokio::time::sleep(delay).await;
            return reply.into_result();
        }
        if token != self.token {
            return Reply::Unauthorized.into_result();
        }
        let payload = resources(&self.user.lock(), &self.modules.lock());
        Reply::Ok(payload).into_result()
    }

    async fn tree_children(
        &self,
        _token: &str,
        kind: TreeKind,
        key: &str,
    ) -> Result<Vec<TreeNodeData>, ApiError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .trees
            .lock()
            .get(&(kind, key.to_string()))
            .cloned()
            .unwrap_or(Reply::Ok(Value::Array(Vec::new())));
        tokio::time::sleep(Duration::from_millis(20)).await;
        reply.into_result()
    }

    async fn upload_annex(
        &self,
        _token: &str,
        upload: AnnexUpload,
    ) -> Result<AnnexReceipt, ApiError> {
        let delay = *self.upload_delay.lock();
        tokio::time::sleep(delay).await;
        let scripted = self.upload_reply.lock().clone();
        if let Some(reply) = scripted {
            return reply.into_result();
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AnnexReceipt {
            id: format!("annex-{n}"),
            preview_url: Some(format!("/preview/{}", upload.file_name)),
        })
    }

    async fn delete_annex(&self, _token: &str, annex_id: &str) -> Result<(), ApiError> {
        let scripted = self.delete_reply.lock().clone();
        if let Some(reply) = scripted {
            return reply.into_result();
        }
        self.deleted.lock().push(annex_id.to_string());
        Ok(())
    }
}

/// The sales scenario: one grouping module with a report screen under it,
/// plus a record naming a screen the console does not have.
pub fn sales_modules() -> Vec<TestModule> {
    use tyr_test_utils::module;

    vec![
        module("m1", "Sales")
            .with_menu(
                module("m1-1", "Report")
                    .with_descriptor("sales.report")
                    .with_component("SalesReport"),
            )
            .with_menu(
                module("m1-2", "Forecast")
                    .with_url("sales/forecast")
                    .with_component("ForecastChart"),
            ),
        module("m2", "Groups")
            .with_url("groups")
            .with_component("GroupManagementTreePage"),
    ]
}

/// Test application wrapper using the REAL console routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub api: Arc<FakeConsoleApi>,
    pub store: MemoryStore,
}

impl TestApp {
    pub fn new(api: FakeConsoleApi) -> Self {
        Self::with_store(Arc::new(api), MemoryStore::default())
    }

    /// A second app instance sharing the browser session store, as after a
    /// restart that lost every in-memory console.
    pub fn with_store(api: Arc<FakeConsoleApi>, store: MemoryStore) -> Self {
        let config = Config::for_upstream("http://127.0.0.1:9").expect("config");
        let layer = session_layer(store.clone(), &config);
        let state = AppState::with_api(config, api.clone()).expect("state");
        let router = tyr_console::app(state.clone(), layer);
        Self {
            router,
            state,
            api,
            store,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// A browser with its own cookie jar.
    pub fn browser(&self) -> Browser<'_> {
        Browser {
            app: self,
            cookies: String::new(),
        }
    }
}

/// Cookie-carrying client for one simulated browser.
pub struct Browser<'a> {
    app: &'a TestApp,
    pub cookies: String,
}

impl Browser<'_> {
    /// Continue this browser's session against another app instance.
    pub fn on<'b>(&self, app: &'b TestApp) -> Browser<'b> {
        Browser {
            app,
            cookies: self.cookies.clone(),
        }
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> Response {
        if !self.cookies.is_empty() {
            request.headers_mut().insert(
                header::COOKIE,
                self.cookies.parse().expect("Invalid cookie header"),
            );
        }
        let response = self.app.request(request).await;
        let fresh = extract_cookies(&response);
        if !fresh.is_empty() {
            self.cookies = fresh;
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&mut self, uri: &str) -> Response {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&mut self, uri: &str) -> Response {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> Response {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send_json(&mut self, method: Method, uri: &str, body: &Value) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Log in with the fake's password and assert the redirect.
    pub async fn login(&mut self, logid: &str) -> Response {
        let response = self
            .post_form("/login", &format!("logid={logid}&pwd={PASSWORD}&code=1234"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/main");
        response
    }

    pub async fn json(&mut self, uri: &str) -> (StatusCode, Value) {
        let response = self.get(uri).await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

/// Extract cookies from a response's `Set-Cookie` headers.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let text = body_string(response).await;
    serde_json::from_str(&text).unwrap_or(Value::Null)
}

/// A multipart body with related-object fields and the given files.
pub fn multipart(boundary: &str, files: &[(&str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, value) in [("object", "orders"), ("objectFieldId", "attachment"), ("fkId", "42")] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Body::from(body)
}
