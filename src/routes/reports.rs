// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reporting routes for finance secretaries and auditors.
//!
//! Receipts are fetched with the requested filters and aggregated in
//! `services::reports`; exports render the same rows as XLSX.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::db::ReceiptFilter;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::report::{
    ChartResponse, FiltersApplied, MonthlyBreakdown, SummaryReport, TallyReport,
};
use crate::models::{Receipt, ReceiptWithUploader, Tag, UserRole};
use crate::services::{export, reports};
use crate::AppState;

const REPORT_ROLES: [UserRole; 2] = [UserRole::FinanceSecretary, UserRole::Auditor];

/// Report routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/tally", get(get_tally))
        .route("/api/reports/by-tag/{tag_name}", get(get_receipts_by_tag))
        .route("/api/reports/monthly-breakdown", get(get_monthly_breakdown))
        .route("/api/reports/summary", get(get_summary))
        .route("/api/reports/dashboard/charts", get(get_chart_data))
        .route("/api/reports/export/receipts", get(export_receipts))
        .route("/api/reports/export/tally", get(export_tally))
}

/// Month/year window shared by the report endpoints.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PeriodQuery {
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: Option<u32>,
    #[validate(range(min = 2000, max = 2100, message = "year must be between 2000 and 2100"))]
    pub year: Option<i32>,
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
}

impl PeriodQuery {
    fn validated(self) -> Result<Self> {
        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            messages.sort();
            AppError::BadRequest(messages.join("; "))
        })?;
        Ok(self)
    }

    fn filter(&self) -> ReceiptFilter {
        ReceiptFilter {
            month: self.month,
            year: self.year,
            ..ReceiptFilter::default()
        }
    }

    /// `tag_id` wins over `tag_name`. A tag that does not exist is `None`.
    async fn resolve_tag(&self, state: &AppState) -> Result<Option<Tag>> {
        if let Some(tag_id) = self.tag_id {
            return state.db.get_tag(tag_id).await;
        }
        match self.tag_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => state.db.get_tag_by_name(name).await,
            None => Ok(None),
        }
    }
}

/// Receipts for a period, narrowed to the requested tag when it exists.
async fn period_receipts(
    state: &AppState,
    period: &PeriodQuery,
) -> Result<(Vec<ReceiptWithUploader>, Option<Tag>)> {
    let tag = period.resolve_tag(state).await?;
    if tag.is_none() && (period.tag_id.is_some() || period.tag_name.is_some()) {
        tracing::debug!(
            tag_id = ?period.tag_id,
            tag_name = ?period.tag_name,
            "Report tag not found; tag filter ignored"
        );
    }

    let filter = ReceiptFilter {
        tag_id: tag.as_ref().map(|t| t.id),
        ..period.filter()
    };
    Ok((state.db.list_receipts(&filter).await?, tag))
}

async fn get_tally(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<TallyReport>> {
    user.require_role(&REPORT_ROLES)?;
    let query = query.validated()?;

    let (receipts, tag) = period_receipts(&state, &query).await?;

    let filters_applied = FiltersApplied {
        month: query.month,
        year: query.year,
        tag_id: query.tag_id,
        tag_name: query.tag_name.clone().filter(|_| query.tag_id.is_none()),
        tag: tag.map(|t| t.name),
    };

    Ok(Json(reports::tally(&receipts, filters_applied)))
}

async fn get_receipts_by_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(tag_name): Path<String>,
) -> Result<Json<Vec<Receipt>>> {
    user.require_role(&REPORT_ROLES)?;

    let tag = state
        .db
        .get_tag_by_name(&tag_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag '{}' not found", tag_name)))?;

    let filter = ReceiptFilter {
        tag_id: Some(tag.id),
        ..ReceiptFilter::default()
    };
    let receipts = state.db.list_receipts(&filter).await?;

    Ok(Json(receipts.into_iter().map(|r| r.receipt).collect()))
}

#[derive(Debug, Deserialize, Validate)]
struct YearQuery {
    #[validate(range(min = 2000, max = 2100, message = "year must be between 2000 and 2100"))]
    year: i32,
}

async fn get_monthly_breakdown(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<YearQuery>,
) -> Result<Json<MonthlyBreakdown>> {
    user.require_role(&REPORT_ROLES)?;
    query
        .validate()
        .map_err(|_| AppError::BadRequest("year must be between 2000 and 2100".to_string()))?;

    let filter = ReceiptFilter {
        year: Some(query.year),
        ..ReceiptFilter::default()
    };
    let receipts = state.db.list_receipts(&filter).await?;

    Ok(Json(reports::monthly_breakdown(query.year, &receipts)))
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SummaryReport>> {
    user.require_role(&REPORT_ROLES)?;

    let receipts = state.db.list_receipts(&ReceiptFilter::default()).await?;
    Ok(Json(reports::summary(&receipts)))
}

async fn get_chart_data(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ChartResponse>> {
    user.require_role(&REPORT_ROLES)?;
    let query = query.validated()?;

    let receipts = state.db.list_receipts(&query.filter()).await?;

    // The monthly bar chart always spans the whole year.
    let year_receipts = match (query.year, query.month) {
        (Some(year), Some(_)) => {
            let filter = ReceiptFilter {
                year: Some(year),
                ..ReceiptFilter::default()
            };
            Some(state.db.list_receipts(&filter).await?)
        }
        _ => None,
    };

    Ok(Json(reports::chart_data(
        &receipts,
        query.year,
        year_receipts.as_deref().unwrap_or(&receipts),
    )))
}

fn xlsx_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, export::XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn export_error(err: rust_xlsxwriter::XlsxError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Failed to build spreadsheet: {}", err))
}

/// Exports filter by `tag_name` only.
fn export_period(query: PeriodQuery) -> PeriodQuery {
    PeriodQuery {
        tag_id: None,
        ..query
    }
}

async fn export_receipts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response> {
    user.require_role(&REPORT_ROLES)?;
    let query = export_period(query.validated()?);

    let (receipts, _) = period_receipts(&state, &query).await?;
    let now = Utc::now();
    let bytes = export::receipts_workbook(&receipts).map_err(export_error)?;

    tracing::info!(user_id = user.id, rows = receipts.len(), "Receipts exported");
    Ok(xlsx_attachment(bytes, &export::receipts_file_name(now)))
}

async fn export_tally(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response> {
    user.require_role(&REPORT_ROLES)?;
    let query = export_period(query.validated()?);

    let (receipts, _) = period_receipts(&state, &query).await?;
    let now = Utc::now();
    let bytes = export::tally_workbook(&receipts, now).map_err(export_error)?;

    tracing::info!(user_id = user.id, rows = receipts.len(), "Tally exported");
    Ok(xlsx_attachment(bytes, &export::tally_file_name(now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_validation() {
        let ok = PeriodQuery {
            month: Some(12),
            year: Some(2025),
            ..Default::default()
        };
        assert!(ok.validated().is_ok());

        let bad_month = PeriodQuery {
            month: Some(13),
            ..Default::default()
        };
        match bad_month.validated() {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "month must be between 1 and 12"),
            other => panic!("expected bad request, got {:?}", other.map(|_| ())),
        }

        let bad_year = PeriodQuery {
            year: Some(1999),
            ..Default::default()
        };
        assert!(matches!(bad_year.validated(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_export_ignores_tag_id() {
        let query = export_period(PeriodQuery {
            tag_id: Some(3),
            tag_name: Some("Zakat".to_string()),
            ..Default::default()
        });
        assert_eq!(query.tag_id, None);
        assert_eq!(query.tag_name.as_deref(), Some("Zakat"));
    }
}
