// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt model and payment modes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::tag::Tag;
use crate::models::user::UserRole;

/// How a receipt was paid, stored as the `payment_mode` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PaymentMode {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 5] = [
        PaymentMode::Cash,
        PaymentMode::Card,
        PaymentMode::BankTransfer,
        PaymentMode::Cheque,
        PaymentMode::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Card => "card",
            PaymentMode::BankTransfer => "bank_transfer",
            PaymentMode::Cheque => "cheque",
            PaymentMode::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid payment_mode: {0}. Expected one of: cash, card, bank_transfer, cheque, other")]
pub struct InvalidPaymentMode(pub String);

impl FromStr for PaymentMode {
    type Err = InvalidPaymentMode;

    /// Case-insensitive, so both "bank_transfer" and "BANK_TRANSFER" parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PaymentMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InvalidPaymentMode(s.to_string()))
    }
}

/// A receipt row. `tags` is filled in separately from `receipt_tags`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Receipt {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub amount: f64,
    pub category: String,
    pub payment_mode: PaymentMode,
    pub note: Option<String>,
    pub store_name: Option<String>,
    pub receipt_date: DateTime<Utc>,
    pub image_path: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

/// Receipt joined with its uploader.
///
/// Only `uploader_name` is part of the API response; username and role
/// are carried for reports.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReceiptWithUploader {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub receipt: Receipt,
    pub uploader_name: String,
    #[serde(skip)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub uploader_username: String,
    #[serde(skip)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub uploader_role: UserRole,
}

/// Fields needed to insert a receipt.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub amount: f64,
    pub category: String,
    pub payment_mode: PaymentMode,
    pub note: Option<String>,
    pub store_name: Option<String>,
    pub receipt_date: DateTime<Utc>,
    pub image_path: Option<String>,
    pub uploaded_by: i64,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ReceiptChanges {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub payment_mode: Option<PaymentMode>,
    pub note: Option<String>,
    pub store_name: Option<String>,
    pub receipt_date: Option<DateTime<Utc>>,
    /// Replaces the full tag set when present.
    pub tag_ids: Option<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_mode_parsing_is_case_insensitive() {
        assert_eq!("cash".parse::<PaymentMode>().unwrap(), PaymentMode::Cash);
        assert_eq!("CHEQUE".parse::<PaymentMode>().unwrap(), PaymentMode::Cheque);
        assert_eq!(
            " Bank_Transfer ".parse::<PaymentMode>().unwrap(),
            PaymentMode::BankTransfer
        );
    }

    #[test]
    fn test_payment_mode_error_lists_allowed_values() {
        let err = "bitcoin".parse::<PaymentMode>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payment_mode: bitcoin. Expected one of: cash, card, bank_transfer, cheque, other"
        );
    }

    #[test]
    fn test_receipt_with_uploader_flattens_receipt_fields() {
        let now = Utc::now();
        let record = ReceiptWithUploader {
            receipt: Receipt {
                id: 7,
                amount: 12.5,
                category: "Utilities".to_string(),
                payment_mode: PaymentMode::Card,
                note: None,
                store_name: Some("City Power".to_string()),
                receipt_date: now,
                image_path: None,
                uploaded_by: 3,
                created_at: now,
                tags: vec![],
            },
            uploader_name: "Yusuf Khan".to_string(),
            uploader_username: "yusuf".to_string(),
            uploader_role: UserRole::Imam,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["payment_mode"], "card");
        assert_eq!(json["uploader_name"], "Yusuf Khan");
        assert!(json.get("uploader_username").is_none());
        assert!(json.get("uploader_role").is_none());
        assert_eq!(json["tags"], serde_json::json!([]));
    }
}
