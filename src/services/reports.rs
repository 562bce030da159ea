// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report aggregation over receipt rows.
//!
//! The database layer applies the filters; everything here is pure so the
//! same numbers back the JSON endpoints, the dashboard and the spreadsheet
//! exports.

use chrono::Datelike;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::report::{
    BarChart, CategoryShare, CategoryTotal, ChartData, ChartResponse, ChartStats,
    EmptyChartStats, FiltersApplied, MonthTotal, MonthlyBreakdown, PaymentModeTotal, PieChart,
    RecentReceipt, SummaryReport, TallyReport,
};
use crate::models::{PaymentMode, ReceiptWithUploader};
use crate::time_utils::format_utc_rfc3339;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const CATEGORY_COLORS: [&str; 7] = [
    "#FF6384", "#36A2EB", "#FFCE56", "#4BC0C0", "#FF9F40", "#9966FF", "#FF6384",
];
const PAYMENT_COLORS: [&str; 5] = ["#4BC0C0", "#FF9F40", "#9966FF", "#FF6384", "#36A2EB"];

const TOP_CATEGORY_LIMIT: usize = 5;
const RECENT_RECEIPT_LIMIT: usize = 5;

pub const NO_DATA_MESSAGE: &str = "No data available for the selected period";

/// Round a money amount to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of `part` in `whole` as a percentage; 0 when `whole` is not positive.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

pub fn total_amount(receipts: &[ReceiptWithUploader]) -> f64 {
    receipts.iter().map(|r| r.receipt.amount).sum()
}

/// Highest total first; equal totals fall back to label order.
fn by_total_desc(a_total: f64, a_label: &str, b_total: f64, b_label: &str) -> Ordering {
    b_total
        .total_cmp(&a_total)
        .then_with(|| a_label.cmp(b_label))
}

/// Totals per category, largest first.
pub fn category_breakdown(receipts: &[ReceiptWithUploader]) -> Vec<CategoryTotal> {
    let mut groups: HashMap<&str, (f64, u64)> = HashMap::new();
    for r in receipts {
        let entry = groups.entry(r.receipt.category.as_str()).or_default();
        entry.0 += r.receipt.amount;
        entry.1 += 1;
    }

    let mut totals: Vec<CategoryTotal> = groups
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total: round2(total),
            count,
        })
        .collect();
    totals.sort_by(|a, b| by_total_desc(a.total, &a.category, b.total, &b.category));
    totals
}

/// Totals per payment mode, largest first.
pub fn payment_mode_breakdown(receipts: &[ReceiptWithUploader]) -> Vec<PaymentModeTotal> {
    let mut groups: HashMap<PaymentMode, (f64, u64)> = HashMap::new();
    for r in receipts {
        let entry = groups.entry(r.receipt.payment_mode).or_default();
        entry.0 += r.receipt.amount;
        entry.1 += 1;
    }

    let mut totals: Vec<PaymentModeTotal> = groups
        .into_iter()
        .map(|(payment_mode, (total, count))| PaymentModeTotal {
            payment_mode,
            total: round2(total),
            count,
        })
        .collect();
    totals.sort_by(|a, b| {
        by_total_desc(
            a.total,
            a.payment_mode.as_str(),
            b.total,
            b.payment_mode.as_str(),
        )
    });
    totals
}

pub fn tally(receipts: &[ReceiptWithUploader], filters_applied: FiltersApplied) -> TallyReport {
    TallyReport {
        total_amount: round2(total_amount(receipts)),
        receipt_count: receipts.len() as u64,
        filters_applied,
        by_category: category_breakdown(receipts),
        by_payment_mode: payment_mode_breakdown(receipts),
    }
}

/// (month number, total, count) for each month of `year` that has receipts.
fn month_totals(year: i32, receipts: &[ReceiptWithUploader]) -> Vec<(u32, f64, u64)> {
    let mut months: BTreeMap<u32, (f64, u64)> = BTreeMap::new();
    for r in receipts.iter().filter(|r| r.receipt.receipt_date.year() == year) {
        let entry = months.entry(r.receipt.receipt_date.month()).or_default();
        entry.0 += r.receipt.amount;
        entry.1 += 1;
    }
    months
        .into_iter()
        .map(|(month, (total, count))| (month, total, count))
        .collect()
}

pub fn monthly_breakdown(year: i32, receipts: &[ReceiptWithUploader]) -> MonthlyBreakdown {
    let totals = month_totals(year, receipts);
    let total_amount = totals.iter().map(|(_, total, _)| total).sum::<f64>();

    MonthlyBreakdown {
        year,
        total_amount: round2(total_amount),
        months: totals
            .into_iter()
            .map(|(month, total, count)| MonthTotal {
                month,
                month_name: MONTH_NAMES[(month - 1) as usize].to_string(),
                total: round2(total),
                count,
            })
            .collect(),
    }
}

pub fn summary(receipts: &[ReceiptWithUploader]) -> SummaryReport {
    let total_receipts = receipts.len() as u64;
    let total = total_amount(receipts);
    let average = if total_receipts > 0 {
        total / total_receipts as f64
    } else {
        0.0
    };

    let mut top_categories = category_breakdown(receipts);
    top_categories.truncate(TOP_CATEGORY_LIMIT);

    let mut receipts_by_role = BTreeMap::new();
    for r in receipts {
        *receipts_by_role.entry(r.uploader_role).or_insert(0u64) += 1;
    }

    let mut recent: Vec<&ReceiptWithUploader> = receipts.iter().collect();
    recent.sort_by(|a, b| {
        b.receipt
            .created_at
            .cmp(&a.receipt.created_at)
            .then_with(|| b.receipt.id.cmp(&a.receipt.id))
    });
    let recent_receipts = recent
        .into_iter()
        .take(RECENT_RECEIPT_LIMIT)
        .map(|r| RecentReceipt {
            id: r.receipt.id,
            amount: r.receipt.amount,
            category: r.receipt.category.clone(),
            uploader: r.uploader_username.clone(),
            created_at: format_utc_rfc3339(r.receipt.created_at),
        })
        .collect();

    SummaryReport {
        total_receipts,
        total_amount: round2(total),
        average_receipt: round2(average),
        top_categories,
        receipts_by_role,
        recent_receipts,
    }
}

fn palette(colors: &[&str], count: usize) -> Vec<String> {
    colors.iter().take(count).map(|c| c.to_string()).collect()
}

/// Dashboard chart data for `receipts`.
///
/// `year_receipts` is the whole year's receipts, used for the monthly bar
/// chart when a year was requested (even if `receipts` is a single month).
pub fn chart_data(
    receipts: &[ReceiptWithUploader],
    year: Option<i32>,
    year_receipts: &[ReceiptWithUploader],
) -> ChartResponse {
    if receipts.is_empty() {
        return ChartResponse::Empty {
            message: NO_DATA_MESSAGE.to_string(),
            stats: EmptyChartStats {
                total_amount: 0.0,
                receipt_count: 0,
            },
        };
    }

    let total = total_amount(receipts);
    let categories = category_breakdown(receipts);
    let payments = payment_mode_breakdown(receipts);

    let pie_chart_category = PieChart {
        labels: categories.iter().map(|c| c.category.clone()).collect(),
        data: categories.iter().map(|c| c.total).collect(),
        colors: palette(&CATEGORY_COLORS, categories.len()),
    };

    let pie_chart_payment = PieChart {
        labels: payments
            .iter()
            .map(|p| p.payment_mode.as_str().to_string())
            .collect(),
        data: payments.iter().map(|p| p.total).collect(),
        colors: palette(&PAYMENT_COLORS, payments.len()),
    };

    let top_categories = categories
        .iter()
        .take(TOP_CATEGORY_LIMIT)
        .map(|c| CategoryShare {
            category: c.category.clone(),
            amount: c.total,
            percentage: round1(percentage(c.total, total)),
        })
        .collect();

    let bar_chart_monthly = year.map(|year| {
        let totals = month_totals(year, year_receipts);
        BarChart {
            labels: totals
                .iter()
                .map(|(month, _, _)| MONTH_ABBREVIATIONS[(*month - 1) as usize].to_string())
                .collect(),
            data: totals.iter().map(|(_, total, _)| round2(*total)).collect(),
        }
    });

    let largest = receipts
        .iter()
        .map(|r| r.receipt.amount)
        .fold(f64::NEG_INFINITY, f64::max);
    let smallest = receipts
        .iter()
        .map(|r| r.receipt.amount)
        .fold(f64::INFINITY, f64::min);

    ChartResponse::Data(ChartData {
        pie_chart_category,
        pie_chart_payment,
        bar_chart_monthly,
        top_categories,
        stats: ChartStats {
            total_amount: round2(total),
            receipt_count: receipts.len() as u64,
            average_receipt: round2(total / receipts.len() as f64),
            largest_expense: round2(largest),
            smallest_expense: round2(smallest),
        },
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{PaymentMode, Receipt, ReceiptWithUploader, UserRole};
    use chrono::{TimeZone, Utc};

    /// Build a receipt row dated `year-month-01` for aggregation tests.
    pub fn receipt(
        id: i64,
        amount: f64,
        category: &str,
        payment_mode: PaymentMode,
        (year, month): (i32, u32),
        role: UserRole,
    ) -> ReceiptWithUploader {
        let date = Utc.with_ymd_and_hms(year, month, 1, 12, 0, 0).unwrap();
        ReceiptWithUploader {
            receipt: Receipt {
                id,
                amount,
                category: category.to_string(),
                payment_mode,
                note: None,
                store_name: None,
                receipt_date: date,
                image_path: None,
                uploaded_by: 1,
                created_at: date + chrono::Duration::seconds(id),
                tags: vec![],
            },
            uploader_name: format!("{} user", role),
            uploader_username: role.to_string(),
            uploader_role: role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::receipt;
    use super::*;
    use crate::models::UserRole;

    fn sample() -> Vec<ReceiptWithUploader> {
        vec![
            receipt(1, 100.0, "Utilities", PaymentMode::Cash, (2025, 1), UserRole::Imam),
            receipt(2, 50.25, "Food", PaymentMode::Card, (2025, 1), UserRole::FinanceSecretary),
            receipt(3, 200.0, "Utilities", PaymentMode::BankTransfer, (2025, 3), UserRole::Imam),
            receipt(4, 50.25, "Books", PaymentMode::Cash, (2024, 12), UserRole::Auditor),
        ]
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.126), 10.13);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(99.994), 99.99);
    }

    #[test]
    fn test_category_breakdown_sorted_by_total_then_name() {
        let breakdown = category_breakdown(&sample());
        let labels: Vec<&str> = breakdown.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(labels, vec!["Utilities", "Books", "Food"]);
        assert_eq!(breakdown[0].total, 300.0);
        assert_eq!(breakdown[0].count, 2);
    }

    #[test]
    fn test_tally_totals_and_payment_modes() {
        let filters = FiltersApplied {
            month: Some(1),
            ..Default::default()
        };
        let report = tally(&sample(), filters.clone());

        assert_eq!(report.receipt_count, 4);
        assert_eq!(report.total_amount, 400.5);
        assert_eq!(report.filters_applied, filters);
        assert_eq!(report.by_payment_mode[0].payment_mode, PaymentMode::BankTransfer);
        assert_eq!(report.by_payment_mode[1].payment_mode, PaymentMode::Cash);
        assert_eq!(report.by_payment_mode[1].count, 2);
    }

    #[test]
    fn test_tally_of_nothing_is_zero() {
        let report = tally(&[], FiltersApplied::default());
        assert_eq!(report.total_amount, 0.0);
        assert_eq!(report.receipt_count, 0);
        assert!(report.by_category.is_empty());
        assert!(report.by_payment_mode.is_empty());
    }

    #[test]
    fn test_filters_applied_omits_unset_fields() {
        let filters = FiltersApplied {
            year: Some(2025),
            tag_name: Some("Ramadan".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json, serde_json::json!({"year": 2025, "tag_name": "Ramadan"}));
    }

    #[test]
    fn test_monthly_breakdown_only_counts_requested_year() {
        let breakdown = monthly_breakdown(2025, &sample());

        assert_eq!(breakdown.year, 2025);
        assert_eq!(breakdown.total_amount, 350.25);
        assert_eq!(breakdown.months.len(), 2);
        assert_eq!(breakdown.months[0].month, 1);
        assert_eq!(breakdown.months[0].month_name, "January");
        assert_eq!(breakdown.months[0].count, 2);
        assert_eq!(breakdown.months[1].month_name, "March");
        assert_eq!(breakdown.months[1].total, 200.0);
    }

    #[test]
    fn test_summary() {
        let summary = summary(&sample());

        assert_eq!(summary.total_receipts, 4);
        assert_eq!(summary.total_amount, 400.5);
        assert_eq!(summary.average_receipt, 100.13);
        assert_eq!(summary.receipts_by_role[&UserRole::Imam], 2);
        assert_eq!(summary.receipts_by_role[&UserRole::Auditor], 1);
        assert_eq!(summary.recent_receipts[0].id, 3);
        assert_eq!(summary.recent_receipts[0].uploader, "imam");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["receipts_by_role"]["finance_secretary"], 1);
    }

    #[test]
    fn test_summary_of_empty_ledger() {
        let summary = summary(&[]);
        assert_eq!(summary.total_receipts, 0);
        assert_eq!(summary.average_receipt, 0.0);
        assert!(summary.receipts_by_role.is_empty());
        assert!(summary.recent_receipts.is_empty());
    }

    #[test]
    fn test_summary_limits_top_categories() {
        let receipts: Vec<_> = (1..=8)
            .map(|i| {
                receipt(
                    i,
                    i as f64,
                    &format!("Category {}", i),
                    PaymentMode::Other,
                    (2025, 2),
                    UserRole::FinanceSecretary,
                )
            })
            .collect();

        let summary = summary(&receipts);
        assert_eq!(summary.top_categories.len(), 5);
        assert_eq!(summary.top_categories[0].category, "Category 8");
        assert_eq!(summary.recent_receipts.len(), 5);
    }

    #[test]
    fn test_chart_data_empty_period() {
        let response = chart_data(&[], Some(2025), &[]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], NO_DATA_MESSAGE);
        assert_eq!(json["stats"]["receipt_count"], 0);
    }

    #[test]
    fn test_chart_data_with_monthly_trend() {
        let all = sample();
        let january: Vec<_> = all
            .iter()
            .filter(|r| r.receipt.receipt_date.month() == 1)
            .cloned()
            .collect();

        let ChartResponse::Data(data) = chart_data(&january, Some(2025), &all) else {
            panic!("expected chart data");
        };

        assert_eq!(data.pie_chart_category.labels, vec!["Utilities", "Food"]);
        assert_eq!(data.pie_chart_category.colors, vec!["#FF6384", "#36A2EB"]);
        assert_eq!(data.pie_chart_payment.labels, vec!["cash", "card"]);
        assert_eq!(data.top_categories[0].percentage, 66.6);
        assert_eq!(data.stats.largest_expense, 100.0);
        assert_eq!(data.stats.smallest_expense, 50.25);

        let bar = data.bar_chart_monthly.expect("year was given");
        assert_eq!(bar.labels, vec!["Jan", "Mar"]);
        assert_eq!(bar.data, vec![150.25, 200.0]);
    }

    #[test]
    fn test_chart_data_without_year_has_no_bar_chart() {
        let ChartResponse::Data(data) = chart_data(&sample(), None, &[]) else {
            panic!("expected chart data");
        };
        assert!(data.bar_chart_monthly.is_none());
        assert_eq!(data.stats.receipt_count, 4);
    }

    #[test]
    fn test_percentage_handles_zero_total() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(25.0, 100.0), 25.0);
    }
}
