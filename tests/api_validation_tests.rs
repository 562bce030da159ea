// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.
//!
//! Registration input is checked before the database is touched, so these
//! run against an offline database.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::body_json;

async fn register(app: axum::Router, body: serde_json::Value) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

fn registration(email: &str, role: &str) -> serde_json::Value {
    json!({
        "email": email,
        "username": "imam1",
        "full_name": "Imam One",
        "role": role,
        "password": "bismillah"
    })
}

#[tokio::test]
async fn test_register_invalid_email() {
    let (app, _) = common::create_test_app();

    let response = register(app, registration("not-an-email", "imam")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"], "Invalid email address");
}

#[tokio::test]
async fn test_register_invalid_role() {
    let (app, _) = common::create_test_app();

    let response = register(app, registration("imam@masjid.org", "treasurer")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["details"],
        "Invalid role. Allowed: imam, finance_secretary, auditor"
    );
}

#[tokio::test]
async fn test_register_empty_password() {
    let (app, _) = common::create_test_app();

    let mut body = registration("imam@masjid.org", "imam");
    body["password"] = json!("");
    let response = register(app, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_valid_input_reaches_database() {
    // Role spellings like "Finance Secretary" are normalised, so this gets
    // past validation and fails only on the missing database.
    let (app, _) = common::create_test_app();

    let response = register(app, registration("fs@masjid.org", "Finance Secretary")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_login_requires_form_fields() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=imam1"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
