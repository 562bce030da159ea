// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (staff accounts)
//! - Receipts (with uploader join and tag sets)
//! - Tags (and the `receipt_tags` join table)
//! - Schema migrations (embedded from `migrations/`)

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{
    NewReceipt, NewUser, PaymentMode, Receipt, ReceiptChanges, ReceiptWithUploader, Tag,
    TagWithCount, User,
};

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const USER_COLUMNS: &str =
    "id, username, email, hashed_password, full_name, role, is_active, created_at";

const RECEIPT_COLUMNS: &str = "id, amount, category, payment_mode, note, store_name, \
     receipt_date, image_path, uploaded_by, created_at";

const RECEIPT_WITH_UPLOADER_SELECT: &str = "SELECT r.id, r.amount, r.category, r.payment_mode, \
     r.note, r.store_name, r.receipt_date, r.image_path, r.uploaded_by, r.created_at, \
     u.full_name AS uploader_name, u.username AS uploader_username, u.role AS uploader_role \
     FROM receipts r JOIN users u ON u.id = r.uploaded_by";

/// Filters for receipt listing. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub uploaded_by: Option<i64>,
    /// Exact category match
    pub category: Option<String>,
    /// Case-insensitive substring of the category
    pub category_contains: Option<String>,
    /// Case-insensitive substring of the store name
    pub store_name_contains: Option<String>,
    pub payment_mode: Option<PaymentMode>,
    pub tag_id: Option<i64>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Inclusive lower bound on `receipt_date`
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `receipt_date`
    pub end_date: Option<DateTime<Utc>>,
    /// Calendar month (1-12) of `receipt_date`, in UTC
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Wrap a user-supplied fragment for `ILIKE`, escaping its wildcards.
pub fn contains_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn is_unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptTagRow {
    receipt_id: i64,
    id: i64,
    name: String,
    description: Option<String>,
}

/// PostgreSQL database client.
#[derive(Clone)]
pub struct Database {
    pool: Option<PgPool>,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        tracing::info!("Connected to PostgreSQL");

        Ok(Self { pool: Some(pool) })
    }

    /// Create a mock database for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { pool: None }
    }

    /// Helper to get the pool or return an error if offline.
    fn pool(&self) -> Result<&PgPool, AppError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Apply all pending migrations, bringing the schema to the latest version.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool()?)
            .await?)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool()?)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool()?)
            .await?)
    }

    /// Insert a user. A concurrent registration that wins the race on
    /// username or email surfaces as the same 400 as the explicit checks.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, hashed_password, full_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.hashed_password)
            .bind(&user.full_name)
            .bind(user.role)
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| match is_unique_violation(&e) {
                Some(constraint) if constraint.contains("email") => {
                    AppError::BadRequest("Email already registered".to_string())
                }
                Some(_) => AppError::BadRequest("Username already registered".to_string()),
                None => e.into(),
            })
    }

    /// Enable or disable an account. Returns false if the user does not exist.
    pub async fn set_user_active(&self, user_id: i64, is_active: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_active)
            .execute(self.pool()?)
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!(user_id, is_active, "User activation changed");
        }
        Ok(result.rows_affected() > 0)
    }

    // ─── Receipt Operations ──────────────────────────────────────

    pub async fn create_receipt(&self, receipt: &NewReceipt) -> Result<Receipt, AppError> {
        let sql = format!(
            "INSERT INTO receipts \
             (amount, category, payment_mode, note, store_name, receipt_date, image_path, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            RECEIPT_COLUMNS
        );
        let created = sqlx::query_as::<_, Receipt>(&sql)
            .bind(receipt.amount)
            .bind(&receipt.category)
            .bind(receipt.payment_mode)
            .bind(&receipt.note)
            .bind(&receipt.store_name)
            .bind(receipt.receipt_date)
            .bind(&receipt.image_path)
            .bind(receipt.uploaded_by)
            .fetch_one(self.pool()?)
            .await?;

        tracing::debug!(receipt_id = created.id, "Receipt inserted");
        Ok(created)
    }

    /// Get a receipt with its uploader and tags.
    pub async fn get_receipt(&self, receipt_id: i64) -> Result<Option<ReceiptWithUploader>, AppError> {
        let sql = format!("{} WHERE r.id = $1", RECEIPT_WITH_UPLOADER_SELECT);
        let row = sqlx::query_as::<_, ReceiptWithUploader>(&sql)
            .bind(receipt_id)
            .fetch_optional(self.pool()?)
            .await?;

        match row {
            Some(row) => {
                let mut rows = vec![row];
                self.attach_tags(&mut rows).await?;
                Ok(rows.pop())
            }
            None => Ok(None),
        }
    }

    /// List receipts matching `filter`, ordered by id.
    pub async fn list_receipts(
        &self,
        filter: &ReceiptFilter,
    ) -> Result<Vec<ReceiptWithUploader>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(RECEIPT_WITH_UPLOADER_SELECT);
        qb.push(" WHERE TRUE");

        if let Some(uploaded_by) = filter.uploaded_by {
            qb.push(" AND r.uploaded_by = ").push_bind(uploaded_by);
        }
        if let Some(category) = &filter.category {
            qb.push(" AND r.category = ").push_bind(category.clone());
        }
        if let Some(fragment) = &filter.category_contains {
            qb.push(" AND r.category ILIKE ")
                .push_bind(contains_pattern(fragment));
        }
        if let Some(fragment) = &filter.store_name_contains {
            qb.push(" AND r.store_name ILIKE ")
                .push_bind(contains_pattern(fragment));
        }
        if let Some(payment_mode) = filter.payment_mode {
            qb.push(" AND r.payment_mode = ").push_bind(payment_mode);
        }
        if let Some(tag_id) = filter.tag_id {
            qb.push(
                " AND EXISTS (SELECT 1 FROM receipt_tags rt WHERE rt.receipt_id = r.id AND rt.tag_id = ",
            )
            .push_bind(tag_id)
            .push(")");
        }
        if let Some(min) = filter.min_amount {
            qb.push(" AND r.amount >= ").push_bind(min);
        }
        if let Some(max) = filter.max_amount {
            qb.push(" AND r.amount <= ").push_bind(max);
        }
        if let Some(start) = filter.start_date {
            qb.push(" AND r.receipt_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND r.receipt_date <= ").push_bind(end);
        }
        if let Some(month) = filter.month {
            qb.push(" AND CAST(EXTRACT(MONTH FROM r.receipt_date AT TIME ZONE 'UTC') AS INTEGER) = ")
                .push_bind(month as i32);
        }
        if let Some(year) = filter.year {
            qb.push(" AND CAST(EXTRACT(YEAR FROM r.receipt_date AT TIME ZONE 'UTC') AS INTEGER) = ")
                .push_bind(year);
        }

        qb.push(" ORDER BY r.id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset);
        }

        let mut rows = qb
            .build_query_as::<ReceiptWithUploader>()
            .fetch_all(self.pool()?)
            .await?;
        self.attach_tags(&mut rows).await?;
        Ok(rows)
    }

    /// Apply a partial update. Returns `None` if the receipt does not exist.
    pub async fn update_receipt(
        &self,
        receipt_id: i64,
        changes: &ReceiptChanges,
    ) -> Result<Option<ReceiptWithUploader>, AppError> {
        let mut tx = self.pool()?.begin().await?;

        let result = sqlx::query(
            "UPDATE receipts SET \
             amount = COALESCE($2, amount), \
             category = COALESCE($3, category), \
             payment_mode = COALESCE($4, payment_mode), \
             note = COALESCE($5, note), \
             store_name = COALESCE($6, store_name), \
             receipt_date = COALESCE($7, receipt_date) \
             WHERE id = $1",
        )
        .bind(receipt_id)
        .bind(changes.amount)
        .bind(changes.category.as_deref())
        .bind(changes.payment_mode)
        .bind(changes.note.as_deref())
        .bind(changes.store_name.as_deref())
        .bind(changes.receipt_date)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tag_ids) = &changes.tag_ids {
            let mut tag_ids = tag_ids.clone();
            tag_ids.sort_unstable();
            tag_ids.dedup();

            let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
                .bind(&tag_ids)
                .fetch_one(&mut *tx)
                .await?;
            if found != tag_ids.len() as i64 {
                return Err(AppError::NotFound("Tag not found".to_string()));
            }

            sqlx::query("DELETE FROM receipt_tags WHERE receipt_id = $1")
                .bind(receipt_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO receipt_tags (receipt_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])",
            )
            .bind(receipt_id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_receipt(receipt_id).await
    }

    /// Delete a receipt, returning the deleted row (for image cleanup).
    pub async fn delete_receipt(&self, receipt_id: i64) -> Result<Option<Receipt>, AppError> {
        let sql = format!("DELETE FROM receipts WHERE id = $1 RETURNING {}", RECEIPT_COLUMNS);
        Ok(sqlx::query_as::<_, Receipt>(&sql)
            .bind(receipt_id)
            .fetch_optional(self.pool()?)
            .await?)
    }

    /// Fill in `tags` for each receipt with a single query.
    async fn attach_tags(&self, receipts: &mut [ReceiptWithUploader]) -> Result<(), AppError> {
        if receipts.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = receipts.iter().map(|r| r.receipt.id).collect();
        let rows = sqlx::query_as::<_, ReceiptTagRow>(
            "SELECT rt.receipt_id, t.id, t.name, t.description \
             FROM receipt_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.receipt_id = ANY($1) ORDER BY t.name",
        )
        .bind(&ids)
        .fetch_all(self.pool()?)
        .await?;

        let mut by_receipt: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_receipt.entry(row.receipt_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
                description: row.description,
            });
        }

        for r in receipts.iter_mut() {
            r.receipt.tags = by_receipt.remove(&r.receipt.id).unwrap_or_default();
        }
        Ok(())
    }

    // ─── Tag Operations ──────────────────────────────────────────

    pub async fn create_tag(&self, name: &str, description: Option<&str>) -> Result<Tag, AppError> {
        sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool()?)
        .await
        .map_err(|e| match is_unique_violation(&e) {
            Some(_) => AppError::BadRequest(format!("Tag '{}' already exists", name)),
            None => e.into(),
        })
    }

    pub async fn get_tag(&self, tag_id: i64) -> Result<Option<Tag>, AppError> {
        Ok(
            sqlx::query_as::<_, Tag>("SELECT id, name, description FROM tags WHERE id = $1")
                .bind(tag_id)
                .fetch_optional(self.pool()?)
                .await?,
        )
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        Ok(
            sqlx::query_as::<_, Tag>("SELECT id, name, description FROM tags WHERE name = $1")
                .bind(name)
                .fetch_optional(self.pool()?)
                .await?,
        )
    }

    /// First tag (by id) whose name contains `fragment`, case-insensitively.
    pub async fn find_tag_containing(&self, fragment: &str) -> Result<Option<Tag>, AppError> {
        Ok(sqlx::query_as::<_, Tag>(
            "SELECT id, name, description FROM tags WHERE name ILIKE $1 ORDER BY id LIMIT 1",
        )
        .bind(contains_pattern(fragment))
        .fetch_optional(self.pool()?)
        .await?)
    }

    pub async fn list_tags_with_counts(&self) -> Result<Vec<TagWithCount>, AppError> {
        Ok(sqlx::query_as::<_, TagWithCount>(
            "SELECT t.id, t.name, t.description, COUNT(rt.receipt_id) AS receipt_count \
             FROM tags t LEFT JOIN receipt_tags rt ON rt.tag_id = t.id \
             GROUP BY t.id ORDER BY t.name",
        )
        .fetch_all(self.pool()?)
        .await?)
    }

    /// Delete a tag and its receipt links. Returns false if it did not exist.
    pub async fn delete_tag(&self, tag_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(self.pool()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Link a tag to a receipt. Returns false if it was already linked.
    pub async fn assign_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO receipt_tags (receipt_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(receipt_id)
        .bind(tag_id)
        .execute(self.pool()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unlink a tag from a receipt. Returns false if it was not linked.
    pub async fn unassign_tag(&self, receipt_id: i64, tag_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM receipt_tags WHERE receipt_id = $1 AND tag_id = $2")
            .bind(receipt_id)
            .bind(tag_id)
            .execute(self.pool()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("halal"), "%halal%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[tokio::test]
    async fn test_offline_database_reports_error() {
        let db = Database::new_mock();
        let err = db.get_user_by_username("anyone").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
