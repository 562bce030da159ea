// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first, so local
//! development only needs that file. Values are loaded once at startup.

use jsonwebtoken::Algorithm;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TOKEN_EXPIRE_MINUTES: i64 = 30;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
/// 5 MiB
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 5_242_880;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Token signing secret (raw bytes)
    pub secret_key: Vec<u8>,
    /// Token signing algorithm (HMAC family only)
    pub algorithm: Algorithm,
    /// Access token lifetime in minutes
    pub access_token_expire_minutes: i64,
    /// Directory where receipt images are written
    pub upload_dir: PathBuf,
    /// Maximum accepted image size in bytes
    pub max_upload_size: usize,
    /// Server port
    pub port: u16,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/masjid_receipts_test".to_string(),
            secret_key: b"test_secret_key_32_bytes_minimum!".to_vec(),
            algorithm: Algorithm::HS256,
            access_token_expire_minutes: DEFAULT_TOKEN_EXPIRE_MINUTES,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let algorithm = match env::var("ALGORITHM") {
            Ok(raw) => parse_algorithm(raw.trim())?,
            Err(_) => Algorithm::HS256,
        };

        let access_token_expire_minutes =
            parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", DEFAULT_TOKEN_EXPIRE_MINUTES)?;
        if access_token_expire_minutes <= 0 {
            return Err(ConfigError::Invalid {
                var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                reason: "must be a positive number of minutes".to_string(),
            });
        }

        let secret_key = env::var("SECRET_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("SECRET_KEY"))?;
        if secret_key.is_empty() {
            return Err(ConfigError::Invalid {
                var: "SECRET_KEY",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            secret_key: secret_key.into_bytes(),
            algorithm,
            access_token_expire_minutes,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_size: parse_var("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)?,
            port: parse_var("PORT", DEFAULT_PORT)?,
        })
    }
}

/// Only the symmetric HMAC algorithms make sense with a shared secret.
fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "ALGORITHM",
        reason: format!("unsupported algorithm '{}', expected HS256, HS384 or HS512", raw),
    };

    match Algorithm::from_str(raw).map_err(|_| invalid())? {
        alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => Ok(alg),
        _ => Err(invalid()),
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("'{}' is not a valid value", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
