//! End-to-end tests through the router: auth header handling, role
//! allowlists, and the create-site → guard → attendance flow.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use guardpost::config::Config;
use guardpost::AppState;

async fn test_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.auth.access_secret = "it-access".into();
    config.auth.refresh_secret = "it-refresh".into();
    config.auth.admin_email = "admin@crown.example".into();
    config.auth.admin_password = Some("admin-pass-1".into());

    let pool = guardpost::db::open("sqlite::memory:", 1, Duration::from_secs(5))
        .await
        .expect("pool");
    guardpost::db::migrate(&pool).await.expect("migrations");
    guardpost::api::auth::ensure_admin_user(
        &pool,
        &config.auth.admin_email,
        config.auth.admin_password.as_deref(),
    )
    .await
    .expect("admin user");

    let state = Arc::new(AppState::new(config, pool));
    (guardpost::api::create_router(state.clone()), state)
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_missing_and_invalid_tokens_are_unauthorized() {
    let (app, _state) = test_app().await;

    let (status, body) = request(&app, "GET", "/api/v1/sites", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = request(&app, "GET", "/api/v1/sites", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_role_allowlist_enforced_over_http() {
    let (app, _state) = test_app().await;
    let admin = login(&app, "admin@crown.example", "admin-pass-1").await;

    // Signup produces a CLIENT account
    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(serde_json::json!({
            "name": "Some Client",
            "email": "client@crown.example",
            "password": "client-pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client = login(&app, "client@crown.example", "client-pass").await;

    // Clients may not list users
    let (status, body) = request(&app, "GET", "/api/v1/users", Some(&client), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Admin may
    let (status, _) = request(&app, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_site_guard_attendance_end_to_end() {
    let (app, _state) = test_app().await;
    let admin = login(&app, "admin@crown.example", "admin-pass-1").await;

    let (status, site) = request(
        &app,
        "POST",
        "/api/v1/sites",
        Some(&admin),
        Some(serde_json::json!({ "name": "Alpha Tower", "strength": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let site_id = site["id"].as_str().unwrap().to_string();

    let (status, guard) = request(
        &app,
        "POST",
        "/api/v1/guards",
        Some(&admin),
        Some(serde_json::json!({ "site_id": site_id, "name": "Ravi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let guard_id = guard["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/attendance",
        Some(&admin),
        Some(serde_json::json!({
            "site_id": site_id,
            "guard_id": guard_id,
            "date": "2025-03-02",
            "status": "PRESENT"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, rows) = request(
        &app,
        "GET",
        &format!("/api/v1/attendance?siteId={}", site_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["guard_name"], "Ravi");

    // Deleting the site cascades through attendance
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/v1/sites/{}", site_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, rows) = request(&app, "GET", "/api/v1/attendance", Some(&admin), None).await;
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_bill_creation_generates_code() {
    let (app, _state) = test_app().await;
    let admin = login(&app, "admin@crown.example", "admin-pass-1").await;

    let (_, site) = request(
        &app,
        "POST",
        "/api/v1/sites",
        Some(&admin),
        Some(serde_json::json!({ "name": "Beta Mall" })),
    )
    .await;
    let site_id = site["id"].as_str().unwrap();

    let (status, bill) = request(
        &app,
        "POST",
        "/api/v1/bills",
        Some(&admin),
        Some(serde_json::json!({
            "site_id": site_id,
            "amount": 45000,
            "due_date": "2025-08-01",
            "status": "OUTSTANDING"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let code = bill["code"].as_str().unwrap();
    let re = regex::Regex::new(r"^BILL-[A-F0-9]{8}$").unwrap();
    assert!(re.is_match(code), "unexpected code: {}", code);

    let (status, soa) = request(
        &app,
        "GET",
        &format!("/api/v1/bills/soa?siteId={}", site_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(soa["outstanding"], 45000.0);
    assert_eq!(soa["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _state) = test_app().await;
    let (status, _) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
