// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and current-user routes.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser};
use crate::models::{NewUser, User, UserRole};
use crate::services::{hash_password, verify_password};
use crate::AppState;

const INCORRECT_LOGIN: &str = "Incorrect username or password";

/// Routes that do not require a token.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Routes behind `require_auth`.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "Full name must not be empty"))]
    pub full_name: String,
    pub role: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}

/// Flatten validator output into a single message.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("Invalid {}", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<User>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(validation_message(&e)))?;
    let role: UserRole = body
        .role
        .parse()
        .map_err(|e: crate::models::user::InvalidRole| AppError::BadRequest(e.to_string()))?;

    if state.db.get_user_by_username(&body.username).await?.is_some() {
        return Err(AppError::BadRequest("Username already registered".to_string()));
    }
    if state.db.get_user_by_email(&body.email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let new_user = NewUser {
        username: body.username,
        email: body.email,
        hashed_password: hash_password(&body.password)?,
        full_name: body.full_name,
        role,
    };
    let user = state.db.create_user(&new_user).await?;

    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User registered");

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = state.db.get_user_by_username(&form.username).await?;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.hashed_password) => user,
        _ => {
            tracing::warn!(username = %form.username, "Failed login attempt");
            return Err(AppError::Unauthorized(INCORRECT_LOGIN.to_string()));
        }
    };

    let access_token = create_jwt(&user.username, &state.config)?;
    tracing::info!(user_id = user.id, "User logged in");

    let mut response = Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    })
    .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>> {
    let user = state
        .db
        .get_user(auth.id)
        .await?
        .ok_or_else(AppError::invalid_credentials)?;
    Ok(Json(user))
}
