// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt upload, listing, search and maintenance routes.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::ReceiptFilter;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{NewReceipt, PaymentMode, Receipt, ReceiptChanges, ReceiptWithUploader, UserRole};
use crate::services::storage::content_type_for;
use crate::services::UploadStore;
use crate::time_utils::{parse_iso_datetime, parse_range_end};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 500;
/// Allowance for the text fields that accompany an image.
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// Receipt routes (require authentication).
pub fn routes(max_upload_size: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/receipts",
            post(create_receipt)
                .layer(DefaultBodyLimit::max(
                    max_upload_size.saturating_add(FORM_FIELDS_ALLOWANCE),
                ))
                .get(list_receipts),
        )
        .route("/api/receipts/search", get(search_receipts))
        .route(
            "/api/receipts/{id}",
            get(get_receipt).patch(update_receipt).delete(delete_receipt),
        )
        .route("/api/receipts/{id}/image", get(get_receipt_image))
}

fn parse_payment_mode(raw: &str) -> Result<PaymentMode> {
    raw.parse()
        .map_err(|e: crate::models::receipt::InvalidPaymentMode| AppError::BadRequest(e.to_string()))
}

fn receipt_not_found() -> AppError {
    AppError::NotFound("Receipt not found".to_string())
}

/// Imams may only see their own receipts.
fn ensure_visible(user: &AuthUser, receipt: &ReceiptWithUploader) -> Result<()> {
    if user.is_restricted_to_own_receipts() && receipt.receipt.uploaded_by != user.id {
        return Err(AppError::Forbidden(
            "You can only view your own receipts".to_string(),
        ));
    }
    Ok(())
}

// ─── Upload ──────────────────────────────────────────────────

struct UploadedImage {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ReceiptForm {
    amount: Option<String>,
    category: Option<String>,
    payment_mode: Option<String>,
    note: Option<String>,
    store_name: Option<String>,
    receipt_date: Option<String>,
    image: Option<UploadedImage>,
}

/// A body cut off by the upload limit is reported like any other oversized image.
fn multipart_error(e: MultipartError, uploads: &UploadStore, context: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return uploads.too_large();
    }
    AppError::BadRequest(format!("{}: {}", context, e))
}

impl ReceiptForm {
    async fn read(mut multipart: Multipart, uploads: &UploadStore) -> Result<Self> {
        let mut form = ReceiptForm::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, uploads, "Invalid multipart body"))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);

                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error(e, uploads, "Invalid image upload"))?
                {
                    bytes.extend_from_slice(&chunk);
                    uploads.check_size(bytes.len())?;
                }

                // An empty file input still sends a part.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes,
                });
                continue;
            }

            let value = field.text().await.map_err(|e| {
                multipart_error(e, uploads, &format!("Invalid form field '{}'", name))
            })?;
            let slot = match name.as_str() {
                "amount" => &mut form.amount,
                "category" => &mut form.category,
                "payment_mode" => &mut form.payment_mode,
                "note" => &mut form.note,
                "store_name" => &mut form.store_name,
                "receipt_date" => &mut form.receipt_date,
                _ => {
                    tracing::debug!(field = %name, "Ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(value);
        }

        Ok(form)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("Field '{}' is required", field))),
    }
}

fn parse_amount(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(AppError::BadRequest(format!("Invalid amount: {}", raw))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Upload a receipt, optionally with an image.
async fn create_receipt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Receipt>)> {
    let form = ReceiptForm::read(multipart, &state.uploads).await?;

    let amount = parse_amount(required(&form.amount, "amount")?)?;
    let category = required(&form.category, "category")?.to_string();
    let payment_mode = parse_payment_mode(required(&form.payment_mode, "payment_mode")?)?;
    let now = Utc::now();
    let receipt_date = form
        .receipt_date
        .as_deref()
        .and_then(parse_iso_datetime)
        .unwrap_or(now);

    let image_path = match &form.image {
        Some(image) => {
            UploadStore::check_content_type(image.content_type.as_deref())?;
            Some(
                state
                    .uploads
                    .save(&user.username, &image.file_name, &image.bytes, now)
                    .await?,
            )
        }
        None => None,
    };

    let new_receipt = NewReceipt {
        amount,
        category,
        payment_mode,
        note: non_blank(form.note),
        store_name: non_blank(form.store_name),
        receipt_date,
        image_path,
        uploaded_by: user.id,
    };

    let receipt = match state.db.create_receipt(&new_receipt).await {
        Ok(receipt) => receipt,
        Err(e) => {
            if let Some(path) = &new_receipt.image_path {
                state.uploads.remove(path).await;
            }
            return Err(e);
        }
    };

    tracing::info!(
        receipt_id = receipt.id,
        user_id = user.id,
        amount = receipt.amount,
        has_image = receipt.image_path.is_some(),
        "Receipt uploaded"
    );

    Ok((StatusCode::CREATED, Json(receipt)))
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    category: Option<String>,
    payment_mode: Option<String>,
    uploaded_by: Option<i64>,
}

async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReceiptWithUploader>>> {
    let mut filter = ReceiptFilter {
        category: non_blank(query.category),
        payment_mode: non_blank(query.payment_mode)
            .as_deref()
            .map(parse_payment_mode)
            .transpose()?,
        uploaded_by: query.uploaded_by,
        offset: Some(query.skip.unwrap_or(0).max(0)),
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(0, MAX_LIST_LIMIT)),
        ..ReceiptFilter::default()
    };

    if user.is_restricted_to_own_receipts() {
        if filter.uploaded_by.is_some_and(|id| id != user.id) {
            return Ok(Json(Vec::new()));
        }
        filter.uploaded_by = Some(user.id);
    }

    Ok(Json(state.db.list_receipts(&filter).await?))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    store_name: Option<String>,
    category: Option<String>,
    tag_name: Option<String>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    start_date: Option<String>,
    end_date: Option<String>,
    payment_mode: Option<String>,
}

async fn search_receipts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ReceiptWithUploader>>> {
    let tag_id = match non_blank(query.tag_name) {
        Some(fragment) => {
            let tag = state.db.find_tag_containing(&fragment).await?;
            if tag.is_none() {
                tracing::debug!(tag_name = %fragment, "No tag matches search; tag filter ignored");
            }
            tag.map(|t| t.id)
        }
        None => None,
    };

    let filter = ReceiptFilter {
        uploaded_by: user.is_restricted_to_own_receipts().then_some(user.id),
        store_name_contains: non_blank(query.store_name),
        category_contains: non_blank(query.category),
        payment_mode: non_blank(query.payment_mode)
            .as_deref()
            .map(parse_payment_mode)
            .transpose()?,
        tag_id,
        min_amount: query.min_amount,
        max_amount: query.max_amount,
        start_date: query.start_date.as_deref().and_then(parse_iso_datetime),
        end_date: query.end_date.as_deref().and_then(parse_range_end),
        ..ReceiptFilter::default()
    };

    Ok(Json(state.db.list_receipts(&filter).await?))
}

// ─── Single Receipt ──────────────────────────────────────────

async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptWithUploader>> {
    let receipt = state.db.get_receipt(id).await?.ok_or_else(receipt_not_found)?;
    ensure_visible(&user, &receipt)?;
    Ok(Json(receipt))
}

async fn get_receipt_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let receipt = state.db.get_receipt(id).await?.ok_or_else(receipt_not_found)?;
    ensure_visible(&user, &receipt)?;

    let no_image = || AppError::NotFound("Receipt image not found".to_string());
    let path = receipt.receipt.image_path.as_deref().ok_or_else(no_image)?;
    let bytes = state.uploads.read(path).await?.ok_or_else(|| {
        tracing::warn!(receipt_id = id, path, "Receipt image missing on disk");
        no_image()
    })?;

    Ok(([(header::CONTENT_TYPE, content_type_for(path))], bytes))
}

#[derive(Debug, Default, Deserialize)]
struct UpdateReceiptRequest {
    amount: Option<f64>,
    category: Option<String>,
    payment_mode: Option<String>,
    note: Option<String>,
    store_name: Option<String>,
    receipt_date: Option<String>,
    tag_ids: Option<Vec<i64>>,
}

impl UpdateReceiptRequest {
    fn into_changes(self) -> Result<ReceiptChanges> {
        if let Some(amount) = self.amount {
            if !amount.is_finite() {
                return Err(AppError::BadRequest(format!("Invalid amount: {}", amount)));
            }
        }
        if self.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(AppError::BadRequest("Category must not be empty".to_string()));
        }
        let receipt_date = match self.receipt_date.as_deref() {
            Some(raw) => Some(parse_iso_datetime(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid receipt_date: {}", raw))
            })?),
            None => None,
        };

        Ok(ReceiptChanges {
            amount: self.amount,
            category: self.category.map(|c| c.trim().to_string()),
            payment_mode: self.payment_mode.as_deref().map(parse_payment_mode).transpose()?,
            note: self.note,
            store_name: self.store_name,
            receipt_date,
            tag_ids: self.tag_ids,
        })
    }
}

async fn update_receipt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateReceiptRequest>,
) -> Result<Json<ReceiptWithUploader>> {
    user.require_role(&[UserRole::FinanceSecretary, UserRole::Imam])?;

    let existing = state.db.get_receipt(id).await?.ok_or_else(receipt_not_found)?;
    if user.is_restricted_to_own_receipts() && existing.receipt.uploaded_by != user.id {
        return Err(AppError::Forbidden(
            "You can only modify your own receipts".to_string(),
        ));
    }

    let changes = body.into_changes()?;
    let updated = state
        .db
        .update_receipt(id, &changes)
        .await?
        .ok_or_else(receipt_not_found)?;

    tracing::info!(receipt_id = id, user_id = user.id, "Receipt updated");
    Ok(Json(updated))
}

async fn delete_receipt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    user.require_role(&[UserRole::FinanceSecretary])?;

    let deleted = state.db.delete_receipt(id).await?.ok_or_else(receipt_not_found)?;
    if let Some(path) = &deleted.image_path {
        state.uploads.remove(path).await;
    }

    tracing::info!(receipt_id = id, user_id = user.id, "Receipt deleted");
    Ok(StatusCode::NO_CONTENT)
}
