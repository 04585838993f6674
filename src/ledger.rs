//! Bid Ledger
//!
//! The domain model of a procurement event: a project with a deadline,
//! invited suppliers and requested products, plus the rules that decide
//! whether a price submission is accepted, suppressed or rejected.
//!
//! Everything here is pure value manipulation; persistence and transport
//! live behind [`crate::store::ProjectStore`] and the HTTP layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::deadline;

pub type ProjectId = String;
pub type ProjectIdRef<'a> = &'a str;

/// Unit prices in minor currency units (fen).
pub type Amount = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("bidding already closed")]
    Closed,
    #[error("unit price must be positive")]
    ZeroPrice,
    #[error("unknown product: {0}")]
    UnknownProduct(String),
    #[error("supplier not invited: {0}")]
    UnknownSupplier(String),
}

/// What happened to an otherwise valid submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// Identical to the supplier's immediately preceding bid on the same
    /// product; the ledger is left untouched and no success is reported.
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_sha256: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_sha256 = hex::encode(Sha256::digest(&bytes));
        Self {
            filename: filename.into(),
            content_sha256,
            bytes,
        }
    }
}

/// One supplier's price submission. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub supplier: String,
    pub unit_price: Amount,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    pub submitted_at: DateTime<Utc>,
}

/// The mutable parts of a submission, before the server stamps it.
#[derive(Debug, Clone, Default)]
pub struct BidRequest {
    pub unit_price: Amount,
    pub remark: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Bid {
    /// Duplicate check: same price, same remark, same attachment content.
    /// Attachments are compared by hash, not bytes.
    fn repeats(&self, req: &BidRequest) -> bool {
        self.unit_price == req.unit_price
            && self.remark == req.remark
            && attachment_digest(&self.attachment) == attachment_digest(&req.attachment)
    }
}

fn attachment_digest(attachment: &Option<Attachment>) -> Option<&str> {
    attachment.as_ref().map(|a| a.content_sha256.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub requested_quantity: u64,
    /// Datasheet or drawing the admin attached when posting the line item.
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub bids: Vec<Bid>,
    #[serde(default)]
    pub best_supplier: Option<String>,
    #[serde(default)]
    pub best_supplier_changed_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: impl Into<String>, requested_quantity: u64) -> Self {
        Self {
            name: name.into(),
            requested_quantity,
            attachment: None,
            bids: Vec::new(),
            best_supplier: None,
            best_supplier_changed_at: None,
        }
    }

    fn last_bid_of(&self, supplier: &str) -> Option<&Bid> {
        self.bids.iter().rev().find(|b| b.supplier == supplier)
    }
}

/// A supplier's best standing offer on one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub supplier: String,
    pub unit_price: Amount,
}

/// Per-supplier minima, ascending by price.
///
/// Ties keep the supplier whose bid reached the shared price first, so the
/// ordering is stable across renders and a late matching bid does not
/// displace the incumbent.
pub fn rank(product: &Product) -> Vec<Standing> {
    // supplier -> (own minimum, index of the bid that reached it)
    let mut best: BTreeMap<&str, (Amount, usize)> = BTreeMap::new();
    for (idx, bid) in product.bids.iter().enumerate() {
        match best.get(bid.supplier.as_str()) {
            Some(&(price, _)) if price <= bid.unit_price => {}
            _ => {
                best.insert(&bid.supplier, (bid.unit_price, idx));
            }
        }
    }

    let mut standings: Vec<(&str, (Amount, usize))> = best.into_iter().collect();
    standings.sort_by_key(|&(_, key)| key);
    standings
        .into_iter()
        .map(|(supplier, (unit_price, _))| Standing {
            supplier: supplier.to_owned(),
            unit_price,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub min_price: Amount,
    pub max_price: Amount,
    /// Every supplier standing at `min_price`.
    pub best_suppliers: Vec<String>,
    pub spread_percent: f64,
    /// Number of standing offers (suppliers with at least one bid).
    pub standing_count: usize,
}

/// Price-spread statistics over the same per-supplier-minimum set as
/// [`rank`]. `None` when nobody has bid yet.
pub fn summary(product: &Product) -> Option<Summary> {
    let standings = rank(product);
    let min_price = standings.first()?.unit_price;
    let max_price = standings.last()?.unit_price;
    let best_suppliers = standings
        .iter()
        .take_while(|s| s.unit_price == min_price)
        .map(|s| s.supplier.clone())
        .collect();
    let spread_percent = if min_price == 0 {
        0.0
    } else {
        (max_price - min_price) as f64 / min_price as f64 * 100.0
    };
    Some(Summary {
        min_price,
        max_price,
        best_suppliers,
        spread_percent,
        standing_count: standings.len(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Lenient on load: old snapshots stored free-text deadlines, and a
    /// corrupt one defaults to an hour from now rather than losing the
    /// whole file (logged in [`deadline`]).
    #[serde(
        deserialize_with = "deadline::lenient_datetime",
        default = "deadline::one_hour_from_now"
    )]
    pub deadline: DateTime<Utc>,
    /// supplier name -> per-project secret
    #[serde(default)]
    pub access_codes: BTreeMap<String, String>,
    #[serde(default)]
    pub products: BTreeMap<String, Product>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.into(),
            deadline,
            access_codes: BTreeMap::new(),
            products: BTreeMap::new(),
            created_at: now,
        }
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        deadline::is_closed(self.deadline, now)
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.insert(product.name.clone(), product);
    }

    /// The whole submission pipeline: deadline gate, membership checks,
    /// price validation, duplicate suppression, append, best-supplier
    /// cache refresh.
    pub fn submit_bid(
        &mut self,
        product_name: &str,
        supplier: &str,
        req: BidRequest,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SubmitError> {
        // Checked before anything else: a closed project rejects even
        // otherwise valid bids.
        if self.is_closed(now) {
            return Err(SubmitError::Closed);
        }
        if !self.access_codes.contains_key(supplier) {
            return Err(SubmitError::UnknownSupplier(supplier.to_owned()));
        }
        let product = self
            .products
            .get_mut(product_name)
            .ok_or_else(|| SubmitError::UnknownProduct(product_name.to_owned()))?;
        if req.unit_price == 0 {
            return Err(SubmitError::ZeroPrice);
        }

        if product
            .last_bid_of(supplier)
            .map_or(false, |last| last.repeats(&req))
        {
            return Ok(SubmitOutcome::Suppressed);
        }

        product.bids.push(Bid {
            supplier: supplier.to_owned(),
            unit_price: req.unit_price,
            remark: req.remark,
            attachment: req.attachment,
            submitted_at: now,
        });

        let best = rank(product).into_iter().next().map(|s| s.supplier);
        if best != product.best_supplier {
            product.best_supplier = best;
            product.best_supplier_changed_at = Some(now);
        }

        Ok(SubmitOutcome::Accepted)
    }
}
