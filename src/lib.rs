// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Masjid Receipts: receipt management for mosque finances
//!
//! This crate provides the backend API for uploading receipts, tagging
//! them, and producing tallies, summaries and spreadsheet exports.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::UploadStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone(), config.max_upload_size);
        Self {
            config,
            db,
            uploads,
        }
    }
}
