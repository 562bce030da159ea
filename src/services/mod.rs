// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod export;
pub mod password;
pub mod reports;
pub mod storage;

pub use password::{hash_password, verify_password};
pub use storage::UploadStore;
