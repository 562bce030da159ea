// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt image storage on the local filesystem.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::time_utils::filename_timestamp;

const FALLBACK_FILE_NAME: &str = "image";
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Writes uploaded images under the configured upload directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub fn check_size(&self, size: usize) -> Result<(), AppError> {
        if size > self.max_size {
            return Err(self.too_large());
        }
        Ok(())
    }

    pub fn too_large(&self) -> AppError {
        AppError::BadRequest(format!("File too large. Max size: {} bytes", self.max_size))
    }

    /// Only `image/*` uploads are accepted; a missing content type is let through.
    pub fn check_content_type(content_type: Option<&str>) -> Result<(), AppError> {
        match content_type {
            Some(ct) if !ct.trim().to_ascii_lowercase().starts_with("image/") => Err(
                AppError::BadRequest("Only image files are allowed (jpg, png, gif)".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Write an image as `<username>_<timestamp>_<file name>` and return its path.
    ///
    /// Never overwrites: a clash gets a numeric suffix.
    pub async fn save(
        &self,
        username: &str,
        original_name: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.check_size(bytes.len())?;
        self.ensure_dir()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to save image: {}", e)))?;

        let base = format!(
            "{}_{}_{}",
            sanitize_file_name(username),
            filename_timestamp(now),
            sanitize_file_name(original_name)
        );

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                with_suffix(&base, attempt)
            };
            let path = self.dir.join(&candidate);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(bytes).await?;
                        file.flush().await
                    }
                    .await;
                    if let Err(e) = written {
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(AppError::Internal(anyhow::anyhow!(
                            "Failed to save image: {}",
                            e
                        )));
                    }

                    tracing::info!(path = %path.display(), size = bytes.len(), "Receipt image stored");
                    return Ok(path.to_string_lossy().into_owned());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "Failed to save image: {}",
                        e
                    )))
                }
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "Failed to save image: no free file name for {}",
            base
        )))
    }

    /// Best-effort delete; failures are logged, not returned.
    pub async fn remove(&self, path: &str) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::info!(path, "Receipt image deleted"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path, "Receipt image already gone")
            }
            Err(e) => tracing::warn!(path, error = %e, "Failed to delete image file"),
        }
    }

    /// Read a stored image. `None` if the file no longer exists.
    pub async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(
                "Failed to read image: {}",
                e
            ))),
        }
    }
}

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `name.ext` -> `name_<n>.ext`
fn with_suffix(file_name: &str, n: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", file_name, n),
    }
}

/// Content type to serve a stored image with, from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
