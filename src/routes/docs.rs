// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API documentation: an OpenAPI document and a Swagger UI page for it.

use axum::{
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::AppState;

const SWAGGER_UI_VERSION: &str = "5.17.14";
const DOCS_CSP: &str = "default-src 'none'; \
    script-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net; \
    style-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net; \
    img-src 'self' data: https://cdn.jsdelivr.net; \
    connect-src 'self'; frame-ancestors 'none'";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs", get(swagger_ui))
        .route("/openapi.json", get(openapi_json))
}

async fn swagger_ui() -> impl IntoResponse {
    let page = format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Masjid Receipts API - Docs</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@{v}/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@{v}/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{ url: "/openapi.json", dom_id: "#swagger-ui" }});
  </script>
</body>
</html>
"##,
        v = SWAGGER_UI_VERSION
    );

    ([(header::CONTENT_SECURITY_POLICY, DOCS_CSP)], Html(page))
}

async fn openapi_json() -> Json<Value> {
    Json(openapi_document())
}

fn op(tag: &str, summary: &str) -> Value {
    json!({
        "tags": [tag],
        "summary": summary,
        "security": [{ "bearerAuth": [] }],
        "responses": { "200": { "description": "OK" } }
    })
}

fn public_op(tag: &str, summary: &str) -> Value {
    json!({
        "tags": [tag],
        "summary": summary,
        "responses": { "200": { "description": "OK" } }
    })
}

fn id_param(name: &str) -> Value {
    json!({ "name": name, "in": "path", "required": true, "schema": { "type": "integer" } })
}

fn with_params(mut operation: Value, params: Vec<Value>) -> Value {
    operation["parameters"] = Value::Array(params);
    operation
}

/// OpenAPI 3 document listing every route.
pub fn openapi_document() -> Value {
    let id_path = || vec![id_param("id")];
    let assignment = || vec![id_param("receipt_id"), id_param("tag_id")];
    let tag_name = json!({ "name": "tag_name", "in": "path", "required": true, "schema": { "type": "string" } });

    let entries: Vec<(&str, Value)> = vec![
        ("/", json!({ "get": public_op("meta", "Service banner") })),
        ("/health", json!({ "get": public_op("meta", "Health check") })),
        ("/api/auth/register", json!({ "post": public_op("auth", "Register a user") })),
        ("/api/auth/login", json!({ "post": public_op("auth", "Log in with form credentials") })),
        ("/api/auth/me", json!({ "get": op("auth", "Current user") })),
        (
            "/api/receipts",
            json!({
                "get": op("receipts", "List receipts"),
                "post": op("receipts", "Upload a receipt (multipart)")
            }),
        ),
        ("/api/receipts/search", json!({ "get": op("receipts", "Search receipts") })),
        (
            "/api/receipts/{id}",
            json!({
                "get": with_params(op("receipts", "Get a receipt"), id_path()),
                "patch": with_params(op("receipts", "Update a receipt"), id_path()),
                "delete": with_params(op("receipts", "Delete a receipt"), id_path())
            }),
        ),
        (
            "/api/receipts/{id}/image",
            json!({ "get": with_params(op("receipts", "Download a receipt image"), id_path()) }),
        ),
        (
            "/api/tags",
            json!({
                "get": op("tags", "List tags with receipt counts"),
                "post": op("tags", "Create a tag")
            }),
        ),
        (
            "/api/tags/{id}",
            json!({
                "get": with_params(op("tags", "Get a tag"), id_path()),
                "delete": with_params(op("tags", "Delete a tag"), id_path())
            }),
        ),
        (
            "/api/tags/assign/{receipt_id}/{tag_id}",
            json!({ "post": with_params(op("tags", "Assign a tag to a receipt"), assignment()) }),
        ),
        (
            "/api/tags/unassign/{receipt_id}/{tag_id}",
            json!({ "delete": with_params(op("tags", "Remove a tag from a receipt"), assignment()) }),
        ),
        ("/api/reports/tally", json!({ "get": op("reports", "Tally by category and payment mode") })),
        (
            "/api/reports/by-tag/{tag_name}",
            json!({ "get": with_params(op("reports", "Receipts with a tag"), vec![tag_name]) }),
        ),
        ("/api/reports/monthly-breakdown", json!({ "get": op("reports", "Monthly totals for a year") })),
        ("/api/reports/summary", json!({ "get": op("reports", "Overall summary") })),
        ("/api/reports/dashboard/charts", json!({ "get": op("reports", "Dashboard chart data") })),
        ("/api/reports/export/receipts", json!({ "get": op("reports", "Export receipts as XLSX") })),
        ("/api/reports/export/tally", json!({ "get": op("reports", "Export tally as XLSX") })),
    ];

    let paths: Map<String, Value> = entries
        .into_iter()
        .map(|(path, item)| (path.to_string(), item))
        .collect();

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Masjid Receipts API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Receipt management for mosque finances"
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        },
        "paths": paths
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = openapi_document();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/auth/login",
            "/api/receipts/{id}",
            "/api/tags/assign/{receipt_id}/{tag_id}",
            "/api/reports/export/tally",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc["paths"]["/api/receipts"]["post"].is_object());
        assert_eq!(doc["info"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_swagger_page_points_at_openapi_document() {
        let response = swagger_ui().await.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(),
            DOCS_CSP
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(r##"url: "/openapi.json", dom_id: "#swagger-ui""##));
        assert!(page.contains(&format!("swagger-ui-dist@{}", SWAGGER_UI_VERSION)));
        assert!(page.trim_end().ends_with("</html>"));
    }
}
