//! Scenario tests for stage 2: the fail-closed credential check and the
//! browser-facing employee auto-fill endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use rpos_config::WizardConfig;
use rpos_wizard::{routes, state::AppState};
use serde_json::json;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(upstream: &MockServer) -> Arc<AppState> {
    let mut cfg = WizardConfig::default();
    cfg.production.url = upstream.base_url();
    cfg.production.timeout_secs = 2;
    cfg.local_agent.url = upstream.base_url();
    cfg.local_agent.timeout_secs = 1;
    Arc::new(AppState::new(cfg).expect("state builds"))
}

async fn call(
    st: &Arc<AppState>,
    req: Request<Body>,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, json)
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .expect("set-cookie present")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn location(headers: &HeaderMap) -> &str {
    headers.get(header::LOCATION).unwrap().to_str().unwrap()
}

/// Complete stage 1 and return the session cookie.
async fn session_past_stage_one(st: &Arc<AppState>) -> String {
    let (status, headers, _) = call(
        st,
        post_form("/stage-1", None, "device_ip=192.168.1.10&device_name=PC-1"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    session_cookie(&headers)
}

async fn mock_employee(upstream: &MockServer) -> httpmock::Mock<'_> {
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/E1");
            then.status(200).json_body(json!({
                "found": true,
                "employee_id": "E1",
                "name": "Alex",
                "username": "e1",
                "password": "secret",
                "location_code": 7,
            }));
        })
        .await
}

// ---------------------------------------------------------------------------
// Credential check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_password_redirects_back_and_writes_no_credentials() {
    let upstream = MockServer::start_async().await;
    let employee = mock_employee(&upstream).await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=wrong&password_confirmation=wrong",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");
    assert_eq!(employee.hits_async().await, 1);

    // Flash carries the error and the preserved (non-password) input.
    let (_, _, json) = call(&st, get("/stage-2", &cookie)).await;
    assert_eq!(
        json["errors"]["password"],
        "The password does not match the database password."
    );
    assert_eq!(json["old"]["employee_id"], "E1");
    assert_eq!(json["old"]["username"], "e1");

    // No credentials were written: stage 3 still bounces back to stage 2.
    let (status, headers, _) = call(&st, get("/stage-3", &cookie)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");
}

#[tokio::test]
async fn password_is_compared_case_sensitively() {
    let upstream = MockServer::start_async().await;
    mock_employee(&upstream).await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=SECRET&password_confirmation=SECRET",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");
}

#[tokio::test]
async fn correct_password_advances_to_stage_three() {
    let upstream = MockServer::start_async().await;
    mock_employee(&upstream).await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=secret&password_confirmation=secret",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-3");
}

#[tokio::test]
async fn confirmation_mismatch_fails_before_any_upstream_call() {
    let upstream = MockServer::start_async().await;
    let employee = mock_employee(&upstream).await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=secret&password_confirmation=other",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");
    assert_eq!(employee.hits_async().await, 0);

    let (_, _, json) = call(&st, get("/stage-2", &cookie)).await;
    assert_eq!(
        json["errors"]["password"],
        "The password confirmation does not match."
    );
}

#[tokio::test]
async fn upstream_http_error_fails_closed_like_a_mismatch() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/E1");
            then.status(500);
        })
        .await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=secret&password_confirmation=secret",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");

    let (_, _, json) = call(&st, get("/stage-2", &cookie)).await;
    assert_eq!(
        json["errors"]["password"],
        "The password does not match the database password."
    );
}

#[tokio::test]
async fn unsuccessful_envelope_fails_closed() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/E1");
            then.status(200).json_body(json!({ "success": false }));
        })
        .await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E1&username=e1&password=secret&password_confirmation=secret",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-2");
}

#[tokio::test]
async fn missing_location_code_still_advances() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/E2");
            then.status(200).json_body(json!({
                "found": true,
                "password": "pw",
            }));
        })
        .await;
    let st = make_state(&upstream);
    let cookie = session_past_stage_one(&st).await;

    let (status, headers, _) = call(
        &st,
        post_form(
            "/stage-2",
            Some(&cookie),
            "employee_id=E2&username=e2&password=pw&password_confirmation=pw",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/stage-3");

    // No location code: stage 3 renders editable fallback fields.
    let (status, _, json) = call(&st, get("/stage-3", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["location_found"], false);
    assert_eq!(json["read_only"], false);
    assert_eq!(json["outlet_name"], "");
}

// ---------------------------------------------------------------------------
// GET /api/employee/:id (auto-fill)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn employee_autofill_normalizes_upstream_shape() {
    let upstream = MockServer::start_async().await;
    mock_employee(&upstream).await;
    let st = make_state(&upstream);

    let req = Request::builder()
        .method("GET")
        .uri("/api/employee/E1")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = call(&st, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["employee"]["id"], "E1");
    assert_eq!(json["employee"]["name"], "Alex");
    assert_eq!(json["username"], "e1");
    assert_eq!(json["location_code"], 7);
    // The stored password must never reach the browser.
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn employee_autofill_returns_503_when_upstream_down() {
    let upstream = MockServer::start_async().await;
    let st = make_state(&upstream);

    let req = Request::builder()
        .method("GET")
        .uri("/api/employee/E9")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = call(&st, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("unavailable"));
}
