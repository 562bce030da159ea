// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::config::Config;
use crate::error::AppError;
use crate::models::UserRole;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user, resolved from the token subject.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    /// 403 unless the user holds one of `allowed`.
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = self.id,
                role = %self.role,
                "Rejected request: role not permitted"
            );
            Err(AppError::not_enough_permissions())
        }
    }

    /// Imams only see and edit their own receipts.
    pub fn is_restricted_to_own_receipts(&self) -> bool {
        self.role == UserRole::Imam
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware that requires a valid token for an existing, active user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or_else(AppError::invalid_credentials)?;

    let claims = decode_jwt(token, &state.config).map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        AppError::invalid_credentials()
    })?;

    let user = state
        .db
        .get_user_by_username(&claims.sub)
        .await?
        .ok_or_else(AppError::invalid_credentials)?;

    if !user.is_active {
        return Err(AppError::BadRequest("Inactive user".to_string()));
    }

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Create a signed access token for `username`.
pub fn create_jwt(username: &str, config: &Config) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;
    let lifetime = (config.access_token_expire_minutes.max(0) as usize) * 60;

    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        exp: now + lifetime,
    };

    Ok(encode(
        &Header::new(config.algorithm),
        &claims,
        &EncodingKey::from_secret(&config.secret_key),
    )?)
}

/// Verify signature, algorithm and expiry (no leeway) and return the claims.
pub fn decode_jwt(token: &str, config: &Config) -> jsonwebtoken::errors::Result<Claims> {
    let key = DecodingKey::from_secret(&config.secret_key);
    let mut validation = Validation::new(config.algorithm);
    validation.leeway = 0;

    Ok(decode::<Claims>(token, &key, &validation)?.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            id: 1,
            username: "tester".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_role() {
        let secretary = user(UserRole::FinanceSecretary);
        assert!(secretary.require_role(&[UserRole::FinanceSecretary]).is_ok());

        let auditor = user(UserRole::Auditor);
        assert!(auditor
            .require_role(&[UserRole::FinanceSecretary, UserRole::Auditor])
            .is_ok());
        assert!(matches!(
            auditor.require_role(&[UserRole::FinanceSecretary]),
            Err(AppError::Forbidden(_))
        ));

        assert!(user(UserRole::Imam).is_restricted_to_own_receipts());
        assert!(!auditor.is_restricted_to_own_receipts());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_jwt_roundtrip_uses_configured_algorithm() {
        let config = Config {
            algorithm: jsonwebtoken::Algorithm::HS384,
            ..Config::default()
        };
        let token = create_jwt("finance1", &config).unwrap();
        let claims = decode_jwt(&token, &config).unwrap();
        assert_eq!(claims.sub, "finance1");
        assert_eq!(claims.exp - claims.iat, 30 * 60);

        let other_alg = Config::default();
        assert!(decode_jwt(&token, &other_alg).is_err());
    }
}
