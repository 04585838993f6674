//! Report exporter: flattens a project's ledger into tabular rows, and
//! those rows into an .xlsx workbook for download.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};

use crate::ledger::{Amount, Project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub product: String,
    pub quantity: u64,
    pub supplier: String,
    pub unit_price: Amount,
    pub total: Amount,
    pub remark: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub has_attachment: bool,
}

/// One row per bid, not per standing offer. `total = unit_price * quantity`.
pub fn rows(project: &Project) -> Vec<ExportRow> {
    let mut out = Vec::new();
    for product in project.products.values() {
        for bid in &product.bids {
            out.push(ExportRow {
                product: product.name.clone(),
                quantity: product.requested_quantity,
                supplier: bid.supplier.clone(),
                unit_price: bid.unit_price,
                total: bid.unit_price.saturating_mul(product.requested_quantity),
                remark: bid.remark.clone(),
                submitted_at: bid.submitted_at,
                has_attachment: bid.attachment.is_some(),
            });
        }
    }
    out
}

const HEADERS: [&str; 8] = [
    "Product",
    "Quantity",
    "Supplier",
    "Unit price",
    "Total",
    "Remark",
    "Submitted at",
    "Attachment",
];

/// Prices leave the system in major units (yuan).
fn major_units(amount: Amount) -> f64 {
    amount as f64 / 100.0
}

pub fn to_xlsx(project: &Project) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Bids")?;
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (i, row) in rows(project).iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_string(r, 0, &row.product)?;
        sheet.write_number(r, 1, row.quantity as f64)?;
        sheet.write_string(r, 2, &row.supplier)?;
        sheet.write_number(r, 3, major_units(row.unit_price))?;
        sheet.write_number(r, 4, major_units(row.total))?;
        sheet.write_string(r, 5, row.remark.as_deref().unwrap_or(""))?;
        sheet.write_string(r, 6, row.submitted_at.to_rfc3339())?;
        sheet.write_string(r, 7, if row.has_attachment { "yes" } else { "" })?;
    }
    Ok(workbook.save_to_buffer()?)
}
