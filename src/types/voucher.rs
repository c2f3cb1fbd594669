//! Voucher records
//!
//! A voucher is a catalog item priced in points, optionally limited to a
//! validity window. Either bound of the window may be unset, meaning the
//! window is open on that side. When both bounds are set, `valid_from` never
//! comes after `valid_to`; the store enforces that on insert and the
//! redemption path does not check it again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BrandId, Points, VoucherId};

/// Redeemable catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    /// Voucher identifier
    pub id: VoucherId,

    /// Owning brand
    pub brand_id: BrandId,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Price of one unit in points (> 0)
    pub cost_in_point: Points,

    /// Start of the validity window, inclusive
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window, inclusive
    pub valid_to: Option<DateTime<Utc>>,

    /// Inactive vouchers cannot be redeemed
    pub is_active: bool,
}

impl Voucher {
    /// Create an active, always-valid voucher with a fresh id
    ///
    /// # Arguments
    ///
    /// * `brand_id` - The brand publishing this voucher
    /// * `name` - Display name
    /// * `cost_in_point` - Price of one unit in points
    pub fn new(brand_id: BrandId, name: impl Into<String>, cost_in_point: Points) -> Self {
        Voucher {
            id: VoucherId::new_v4(),
            brand_id,
            name: name.into(),
            description: String::new(),
            cost_in_point,
            valid_from: None,
            valid_to: None,
            is_active: true,
        }
    }

    /// Return this voucher restricted to the given validity window
    pub fn with_window(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    /// Whether the window bounds are ordered (an open side always is)
    pub fn has_ordered_window(&self) -> bool {
        match (self.valid_from, self.valid_to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }
}
