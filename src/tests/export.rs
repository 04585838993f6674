use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::export::{rows, to_xlsx};
use crate::ledger::{Attachment, BidRequest, Product, Project};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn sample_project() -> Result<Project> {
    let mut project = Project::new("rfq", t0() + Duration::hours(1), t0());
    project
        .access_codes
        .insert("SupplierA".to_owned(), "111111".to_owned());
    project
        .access_codes
        .insert("SupplierB".to_owned(), "222222".to_owned());
    project.add_product(Product::new("Widget", 100));
    project.add_product(Product::new("Gadget", 5));

    project.submit_bid(
        "Widget",
        "SupplierA",
        BidRequest {
            unit_price: 1000,
            remark: Some("bulk discount included".to_owned()),
            ..Default::default()
        },
        t0(),
    )?;
    project.submit_bid(
        "Widget",
        "SupplierB",
        BidRequest {
            unit_price: 800,
            ..Default::default()
        },
        t0() + Duration::minutes(1),
    )?;
    project.submit_bid(
        "Gadget",
        "SupplierA",
        BidRequest {
            unit_price: 50,
            attachment: Some(Attachment::new("spec.pdf", vec![1, 2, 3])),
            ..Default::default()
        },
        t0() + Duration::minutes(2),
    )?;
    Ok(project)
}

#[test]
fn one_row_per_bid_with_totals() -> Result<()> {
    let project = sample_project()?;
    let rows = rows(&project);

    let bid_count: usize = project.products.values().map(|p| p.bids.len()).sum();
    assert_eq!(rows.len(), bid_count);

    for row in &rows {
        assert_eq!(row.total, row.unit_price * row.quantity);
    }

    let widget_a = rows
        .iter()
        .find(|r| r.product == "Widget" && r.supplier == "SupplierA")
        .expect("row exists");
    assert_eq!(widget_a.quantity, 100);
    assert_eq!(widget_a.total, 100_000);
    assert_eq!(widget_a.remark.as_deref(), Some("bulk discount included"));
    assert!(!widget_a.has_attachment);

    let gadget_a = rows
        .iter()
        .find(|r| r.product == "Gadget")
        .expect("row exists");
    assert!(gadget_a.has_attachment);
    Ok(())
}

#[test]
fn workbook_bytes_are_a_zip() -> Result<()> {
    let project = sample_project()?;
    let bytes = to_xlsx(&project)?;
    assert!(bytes.starts_with(b"PK"));
    Ok(())
}
