//! End-to-end tests for login, navigation, and the access gate.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use tower::ServiceExt;
use tyr_console::config::Config;
use tyr_console::cors_layer;
use tyr_console::navigation::{DASHBOARD_ID, SETTINGS_ID};
use tyr_test_utils::{admin_user, assert, test_user};

use common::{
    Browser, FakeConsoleApi, Reply, TestApp, body_json, body_string, location, sales_modules,
};

fn sales_app() -> TestApp {
    TestApp::new(FakeConsoleApi::new(test_user("Ada Lovelace"), sales_modules()))
}

async fn logged_in(app: &TestApp) -> Browser<'_> {
    let mut browser = app.browser();
    browser.login("ada").await;
    browser
}

#[tokio::test]
async fn health_reports_live_contexts() {
    let app = sales_app();
    let mut browser = app.browser();
    browser.get("/").await;

    let (status, body) = browser.json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["contexts"], 1);
}

#[tokio::test]
async fn guest_is_sent_to_login() {
    let app = sales_app();
    let mut browser = app.browser();

    let response = browser.get("/main").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    // Unknown to the guest table: the catch-all redirect applies.
    let response = browser.get("/main/sales/report").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let (status, body) = browser.json("/api/navigation").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/login");
}

#[tokio::test]
async fn login_page_shows_verification_image() {
    let app = sales_app();
    let mut browser = app.browser();

    let response = browser.get("/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert::contains(&html, "base64,R0lGOD");
}

#[tokio::test]
async fn login_with_wrong_password_stays_on_login() {
    let app = sales_app();
    let mut browser = app.browser();

    let response = browser
        .post_form("/login", "logid=ada&pwd=wrong&code=1234")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let html = body_string(response).await;
    assert::contains(&html, "Invalid login id or password");
    assert::contains(&html, "value=\"ada\"");

    let response = browser.get("/main").await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn login_with_missing_code_is_a_bad_request() {
    let app = sales_app();
    let mut browser = app.browser();

    let response = browser.post_form("/login", "logid=ada&pwd=secret").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert::contains(&html, "Verification code is required");
}

#[tokio::test]
async fn login_builds_menus_and_routes() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    let (status, body) = browser.json("/api/navigation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada Lovelace");
    assert_eq!(body["access"], "member");
    assert_eq!(body["loading"], false);

    assert::array_contains(&body["routes"], "/main/sales/report");
    assert::array_contains(&body["routes"], "/main/groups");
    assert::array_contains(&body["routes"], "/main/settings/profile");
    assert::array_contains(&body["dropped"], "ForecastChart");
    assert!(
        !body["routes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "/main/sales/forecast")
    );

    let menus = body["menus"].as_array().unwrap();
    assert_eq!(menus[0]["id"], DASHBOARD_ID);
    assert_eq!(menus[1]["label"], "Sales");
    assert_eq!(menus[1]["children"][0]["url"], "sales/report");
    assert!(menus.iter().all(|m| m["id"] != SETTINGS_ID));
}

#[tokio::test]
async fn sales_report_renders_inside_the_shell() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    let response = browser.get("/main/sales/report").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert::contains(&html, "Sales Report");
    assert::contains(&html, "layout--table");
    assert::contains(&html, "AL");

    // Dropped during resolution, so nothing renders there.
    let response = browser.get("/main/sales/forecast").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_need_the_admin_role() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    let response = browser.get("/main/settings").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/401");

    let admin = TestApp::new(FakeConsoleApi::new(admin_user("Grace"), sales_modules()));
    let mut browser = logged_in(&admin).await;
    let response = browser.get("/main/settings").await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = browser.json("/api/navigation").await;
    assert_eq!(body["access"], "admin");
    let menus = body["menus"].as_array().unwrap();
    assert_eq!(menus.last().unwrap()["id"], SETTINGS_ID);
}

#[tokio::test]
async fn menu_clicks_drive_the_tray() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    // Grouping node: expands, no navigation.
    let response = browser.post("/main/nav/m1").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = browser.post("/main/nav/m1-1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/main/trays");

    let response = browser.get("/main/trays").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert::contains(&html, "Report");
    assert::contains(&html, "Sales Report");

    let (_, body) = browser.json("/api/navigation").await;
    assert_eq!(body["shell"]["breadcrumbs"][0]["name"], "Sales");
    assert_eq!(body["shell"]["breadcrumbs"][1]["name"], "Report");
    assert_eq!(body["shell"]["tray"]["screen"], "SalesReport");
    assert::array_contains(&body["shell"]["expanded"], "m1");

    // Collapsing the group from the tray keeps the page and its trail.
    let response = browser
        .send(
            Request::post("/main/nav/m1")
                .header(header::REFERER, "http://localhost/main/trays")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/main/trays");
    browser.get("/main/trays").await;
    let (_, body) = browser.json("/api/navigation").await;
    assert_eq!(body["shell"]["breadcrumbs"][1]["name"], "Report");
    assert_eq!(body["shell"]["tray"]["screen"], "SalesReport");
    assert!(body["shell"]["expanded"].as_array().unwrap().is_empty());

    // Unknown screen: the tray says so instead of failing.
    browser.post("/main/nav/m1-2").await;
    let (_, body) = browser.json("/api/navigation").await;
    assert_eq!(body["shell"]["tray"]["kind"], "blank");
    assert_eq!(
        body["shell"]["tray"]["subheader"],
        "Not found element for m1-2"
    );

    let response = browser.post(&format!("/main/nav/{DASHBOARD_ID}")).await;
    assert_eq!(location(&response), "/main/dashboard");

    let response = browser.post("/main/nav/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_reverts_to_guest_routes() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    let response = browser.post("/logout").await;
    assert_eq!(location(&response), "/login");

    let response = browser.get("/main").await;
    assert_eq!(location(&response), "/login");

    let (status, _) = browser.json("/api/navigation").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_drops_the_console_context() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    let (_, body) = browser.json("/health").await;
    assert_eq!(body["contexts"], 1);

    browser.post("/logout").await;
    let (_, body) = browser.json("/health").await;
    assert_eq!(body["contexts"], 0);
    assert!(app.state.hub().is_empty());
}

#[tokio::test]
async fn credentialed_cors_allows_listed_origins() {
    let mut config = Config::for_upstream("http://127.0.0.1:9").unwrap();
    config.cors_allowed_origins = vec!["https://console.example".to_string()];
    let router = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .layer(cors_layer(&config));

    let response = router
        .oneshot(
            Request::options("/ping")
                .header(header::ORIGIN, "https://console.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://console.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert::contains(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap(),
        "content-type",
    );
}

#[tokio::test]
async fn session_marker_restores_a_lost_console() {
    let app = sales_app();
    let browser = logged_in(&app).await;
    let calls_before = app.api.resource_calls.load(Ordering::SeqCst);

    // Same browser session store, fresh in-memory consoles.
    let restarted = TestApp::with_store(app.api.clone(), app.store.clone());
    let mut browser = browser.on(&restarted);

    let (status, body) = browser.json("/api/navigation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access"], "member");
    assert::array_contains(&body["routes"], "/main/sales/report");
    assert_eq!(
        app.api.resource_calls.load(Ordering::SeqCst),
        calls_before + 1
    );
}

#[tokio::test]
async fn rejected_permission_tree_falls_back_to_defaults() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    app.api
        .script_resources(Duration::ZERO, Reply::Rejected("no modules".to_string()));
    let response = browser.post("/api/navigation/refresh").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["outcome"], "rejected");
    assert_eq!(body["console"]["notices"][0]["message"], "Failed to get module-menu");
    assert::array_contains(&body["console"]["routes"], "/main/dashboard");
    assert!(
        !body["console"]["routes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "/main/sales/report")
    );
    assert_eq!(body["console"]["access"], "member");
}

#[tokio::test]
async fn expired_token_clears_the_session() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;

    app.api.script_resources(Duration::ZERO, Reply::Unauthorized);
    let response = browser.post("/api/navigation/refresh").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["redirect"], "/login");

    let response = browser.get("/main").await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn metrics_count_logins_and_refreshes() {
    let app = sales_app();
    let mut browser = logged_in(&app).await;
    browser.get("/main/settings").await;

    let response = browser.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert::contains(&text, "logins_total{outcome=\"success\"} 1");
    assert::contains(&text, "dropped_routes_total 1");
    assert::contains(&text, "target=\"/401\"");
}

#[tokio::test]
async fn unknown_paths_get_the_not_found_page() {
    let app = sales_app();
    let mut browser = app.browser();

    let response = browser.get("/definitely/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_string(response).await;
    assert::contains(&html, "404");
}
