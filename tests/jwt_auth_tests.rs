// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that tokens created at login can be decoded by the
//! auth middleware, and that expiry is enforced without leeway.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use masjid_receipts::config::Config;
use masjid_receipts::middleware::auth::{create_jwt, decode_jwt, Claims};

mod common;

#[test]
fn test_jwt_roundtrip() {
    let config = Config::default();

    // Create token (like login does)
    let token = create_jwt("finance1", &config).unwrap();

    // Decode token (like middleware does)
    let claims = decode_jwt(&token, &config).unwrap();
    assert_eq!(claims.sub, "finance1");
    assert_eq!(
        claims.exp - claims.iat,
        (config.access_token_expire_minutes * 60) as usize
    );
}

#[test]
fn test_token_is_plain_hs256_jwt() {
    let config = Config::default();
    let token = create_jwt("auditor1", &config).unwrap();

    // Any standard JWT library with the shared secret can read it.
    let key = DecodingKey::from_secret(&config.secret_key);
    let data = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256)).unwrap();
    assert_eq!(data.claims.sub, "auditor1");
    assert_eq!(data.header.alg, Algorithm::HS256);
}

#[test]
fn test_expired_token_rejected_without_leeway() {
    let config = Config::default();

    // Expired one second ago: the library default leeway would still accept it.
    let token = common::create_test_jwt("imam1", -1, &config);
    let err = decode_jwt(&token, &config).unwrap_err();
    assert_eq!(
        err.kind(),
        &jsonwebtoken::errors::ErrorKind::ExpiredSignature
    );

    let token = common::create_test_jwt("imam1", 60, &config);
    assert!(decode_jwt(&token, &config).is_ok());
}

#[test]
fn test_token_lifetime_follows_config() {
    let config = Config {
        access_token_expire_minutes: 5,
        ..Config::default()
    };
    let token = create_jwt("imam1", &config).unwrap();
    let claims = decode_jwt(&token, &config).unwrap();
    assert_eq!(claims.exp - claims.iat, 300);
}

#[test]
fn test_wrong_secret_rejected() {
    let config = Config::default();
    let token = create_jwt("imam1", &config).unwrap();

    let other = Config {
        secret_key: b"another_secret_key_that_is_long".to_vec(),
        ..Config::default()
    };
    let err = decode_jwt(&token, &other).unwrap_err();
    assert_eq!(
        err.kind(),
        &jsonwebtoken::errors::ErrorKind::InvalidSignature
    );
}
