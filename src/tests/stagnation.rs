use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::ledger::{BidRequest, Product, Project};
use crate::stagnation::should_warn;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

/// Project whose deadline is `t0 + 1h`, with one bid placed at t0.
fn project_with_bid() -> Result<Project> {
    let mut project = Project::new("rfq", t0() + Duration::hours(1), t0());
    project
        .access_codes
        .insert("SupplierA".to_owned(), "111111".to_owned());
    project.add_product(Product::new("Widget", 10));
    project.submit_bid(
        "Widget",
        "SupplierA",
        BidRequest {
            unit_price: 1000,
            ..Default::default()
        },
        t0(),
    )?;
    Ok(project)
}

#[test]
fn quiet_outside_the_final_hour() -> Result<()> {
    let mut project = project_with_bid()?;
    project.deadline = t0() + Duration::hours(3);
    // best supplier is 20 minutes stale, but the close is far away
    assert!(!should_warn(&project, t0() + Duration::minutes(20)));
    Ok(())
}

#[test]
fn warns_when_stale_near_the_close() -> Result<()> {
    let project = project_with_bid()?;
    // inside the final hour, best unchanged for 20 minutes
    assert!(should_warn(&project, t0() + Duration::minutes(20)));
    Ok(())
}

#[test]
fn quiet_when_the_best_just_changed() -> Result<()> {
    let project = project_with_bid()?;
    assert!(!should_warn(&project, t0() + Duration::minutes(10)));
    Ok(())
}

#[test]
fn quiet_after_the_deadline() -> Result<()> {
    let project = project_with_bid()?;
    assert!(!should_warn(&project, t0() + Duration::hours(2)));
    Ok(())
}

#[test]
fn quiet_without_any_bids() {
    let mut project = Project::new("rfq", t0() + Duration::minutes(30), t0());
    project.add_product(Product::new("Widget", 10));
    assert!(!should_warn(&project, t0() + Duration::minutes(20)));
}
