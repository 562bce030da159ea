//! Report response shapes (tally, monthly breakdown, summary, charts).
//!
//! These are computed from receipt rows by `services::reports`.

use serde::Serialize;
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{PaymentMode, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentModeTotal {
    pub payment_mode: PaymentMode,
    pub total: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub count: u64,
}

/// Echo of the filters a tally was computed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FiltersApplied {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub tag_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Resolved tag name, present only when the tag exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TallyReport {
    pub total_amount: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub receipt_count: u64,
    pub filters_applied: FiltersApplied,
    pub by_category: Vec<CategoryTotal>,
    pub by_payment_mode: Vec<PaymentModeTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthTotal {
    pub month: u32,
    pub month_name: String,
    pub total: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthlyBreakdown {
    pub year: i32,
    pub total_amount: f64,
    pub months: Vec<MonthTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecentReceipt {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub amount: f64,
    pub category: String,
    /// Uploader's username
    pub uploader: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SummaryReport {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_receipts: u64,
    pub total_amount: f64,
    pub average_receipt: f64,
    pub top_categories: Vec<CategoryTotal>,
    /// Only roles with at least one receipt appear.
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, number>"))]
    pub receipts_by_role: BTreeMap<UserRole, u64>,
    pub recent_receipts: Vec<RecentReceipt>,
}

// ─── Dashboard Charts ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PieChart {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BarChart {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChartStats {
    pub total_amount: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub receipt_count: u64,
    pub average_receipt: f64,
    pub largest_expense: f64,
    pub smallest_expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChartData {
    pub pie_chart_category: PieChart,
    pub pie_chart_payment: PieChart,
    /// Only present when a year was requested.
    pub bar_chart_monthly: Option<BarChart>,
    pub top_categories: Vec<CategoryShare>,
    pub stats: ChartStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EmptyChartStats {
    pub total_amount: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub receipt_count: u64,
}

/// Dashboard payload; the empty variant keeps the shape the frontend
/// checks for when a period has no receipts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ChartResponse {
    Empty {
        message: String,
        stats: EmptyChartStats,
    },
    Data(ChartData),
}
