// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spreadsheet (XLSX) exports for receipts and tallies.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook, XlsxError};

use crate::models::ReceiptWithUploader;
use crate::services::reports::{category_breakdown, percentage, total_amount};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const HEADER_BLUE: u32 = 0x4472C4;
const RECEIPT_HEADERS: [&str; 9] = [
    "ID",
    "Date",
    "Amount",
    "Category",
    "Payment Mode",
    "Store",
    "Note",
    "Uploaded By",
    "Tags",
];
const RECEIPT_COLUMN_WIDTH: f64 = 15.0;
const TALLY_COLUMN_WIDTH: f64 = 20.0;

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BLUE))
        .set_pattern(FormatPattern::Solid)
        .set_align(FormatAlign::Center)
}

pub fn receipts_file_name(now: DateTime<Utc>) -> String {
    format!("masjid_receipts_{}.xlsx", now.format("%Y-%m-%d"))
}

pub fn tally_file_name(now: DateTime<Utc>) -> String {
    format!("masjid_tally_report_{}.xlsx", now.format("%Y-%m-%d"))
}

/// One row per receipt under a styled header, with a bold total two rows
/// below the data.
pub fn receipts_workbook(receipts: &[ReceiptWithUploader]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = header_format();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Receipts")?;

    for (col, title) in RECEIPT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (i, r) in receipts.iter().enumerate() {
        let row = (i + 1) as u32;
        let receipt = &r.receipt;
        let tags = receipt
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        sheet.write_number(row, 0, receipt.id as f64)?;
        sheet.write_string(row, 1, receipt.receipt_date.format("%Y-%m-%d %H:%M").to_string())?;
        sheet.write_number(row, 2, receipt.amount)?;
        sheet.write_string(row, 3, receipt.category.as_str())?;
        sheet.write_string(row, 4, receipt.payment_mode.as_str())?;
        sheet.write_string(row, 5, receipt.store_name.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 6, receipt.note.as_deref().unwrap_or(""))?;
        sheet.write_string(row, 7, r.uploader_name.as_str())?;
        sheet.write_string(row, 8, tags)?;
    }

    let summary_row = (receipts.len() + 2) as u32;
    sheet.write_string_with_format(summary_row, 1, "TOTAL:", &bold)?;
    sheet.write_number_with_format(summary_row, 2, total_amount(receipts), &bold)?;

    for col in 0..RECEIPT_HEADERS.len() as u16 {
        sheet.set_column_width(col, RECEIPT_COLUMN_WIDTH)?;
    }

    workbook.save_to_buffer()
}

/// Two sheets: an overall summary and a per-category breakdown with
/// percentages of the total.
pub fn tally_workbook(
    receipts: &[ReceiptWithUploader],
    now: DateTime<Utc>,
) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let total = total_amount(receipts);

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;

        let title = Format::new().set_bold().set_font_size(16);
        let emphasis = Format::new().set_bold().set_font_size(14);

        sheet.write_string_with_format(0, 0, "Masjid Receipts - Tally Report", &title)?;
        sheet.write_string(2, 0, "Total Amount:")?;
        sheet.write_number_with_format(2, 1, total, &emphasis)?;
        sheet.write_string(3, 0, "Total Receipts:")?;
        sheet.write_number(3, 1, receipts.len() as f64)?;
        sheet.write_string(4, 0, "Report Date:")?;
        sheet.write_string(4, 1, now.format("%Y-%m-%d %H:%M").to_string())?;

        for col in 0..4 {
            sheet.set_column_width(col, TALLY_COLUMN_WIDTH)?;
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("By Category")?;

        let header = header_format();
        for (col, title) in ["Category", "Total Amount", "Count", "Percentage"]
            .iter()
            .enumerate()
        {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (i, category) in category_breakdown(receipts).iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, category.category.as_str())?;
            sheet.write_number(row, 1, category.total)?;
            sheet.write_number(row, 2, category.count as f64)?;
            sheet.write_string(
                row,
                3,
                format!("{:.1}%", percentage(category.total, total)),
            )?;
        }

        for col in 0..4 {
            sheet.set_column_width(col, TALLY_COLUMN_WIDTH)?;
        }
    }

    workbook.save_to_buffer()
}
