// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tag management and receipt tagging routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Tag, TagWithCount, UserRole};
use crate::AppState;

/// Tag routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tags", post(create_tag).get(list_tags))
        .route("/api/tags/{id}", get(get_tag).delete(delete_tag))
        .route("/api/tags/assign/{receipt_id}/{tag_id}", post(assign_tag))
        .route("/api/tags/unassign/{receipt_id}/{tag_id}", delete(unassign_tag))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 100, message = "Tag name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

/// Response for tag assignment changes.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub message: String,
}

fn tag_not_found() -> AppError {
    AppError::NotFound("Tag not found".to_string())
}

async fn create_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>)> {
    user.require_role(&[UserRole::FinanceSecretary])?;

    let name = body.name.trim().to_string();
    let body = CreateTagRequest { name, ..body };
    body.validate().map_err(|_| {
        AppError::BadRequest("Tag name must be 1-100 characters".to_string())
    })?;

    if state.db.get_tag_by_name(&body.name).await?.is_some() {
        return Err(AppError::BadRequest(format!(
            "Tag '{}' already exists",
            body.name
        )));
    }

    let tag = state
        .db
        .create_tag(&body.name, body.description.as_deref())
        .await?;
    tracing::info!(tag_id = tag.id, name = %tag.name, "Tag created");

    Ok((StatusCode::CREATED, Json(tag)))
}

async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TagWithCount>>> {
    Ok(Json(state.db.list_tags_with_counts().await?))
}

async fn get_tag(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<Tag>> {
    let tag = state.db.get_tag(id).await?.ok_or_else(tag_not_found)?;
    Ok(Json(tag))
}

/// Look up both sides of an assignment, receipt first.
async fn receipt_and_tag(state: &AppState, receipt_id: i64, tag_id: i64) -> Result<Tag> {
    state
        .db
        .get_receipt(receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt not found".to_string()))?;
    state.db.get_tag(tag_id).await?.ok_or_else(tag_not_found)
}

async fn assign_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((receipt_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>> {
    user.require_role(&[UserRole::FinanceSecretary])?;
    let tag = receipt_and_tag(&state, receipt_id, tag_id).await?;

    if !state.db.assign_tag(receipt_id, tag_id).await? {
        return Err(AppError::BadRequest(format!(
            "Tag '{}' is already assigned to this receipt",
            tag.name
        )));
    }

    tracing::info!(receipt_id, tag_id, "Tag assigned");
    Ok(Json(MessageResponse {
        message: format!("Tag '{}' assigned to receipt #{}", tag.name, receipt_id),
    }))
}

async fn unassign_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((receipt_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>> {
    user.require_role(&[UserRole::FinanceSecretary])?;
    let tag = receipt_and_tag(&state, receipt_id, tag_id).await?;

    if !state.db.unassign_tag(receipt_id, tag_id).await? {
        return Err(AppError::BadRequest(format!(
            "Tag '{}' is not assigned to this receipt",
            tag.name
        )));
    }

    tracing::info!(receipt_id, tag_id, "Tag removed from receipt");
    Ok(Json(MessageResponse {
        message: format!("Tag '{}' removed from receipt #{}", tag.name, receipt_id),
    }))
}

async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    user.require_role(&[UserRole::FinanceSecretary])?;

    if !state.db.delete_tag(id).await? {
        return Err(tag_not_found());
    }

    tracing::info!(tag_id = id, "Tag deleted");
    Ok(StatusCode::NO_CONTENT)
}
