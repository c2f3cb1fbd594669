//! Redemption requests, transactions and read views
//!
//! This module defines the input of a redemption, the immutable records a
//! successful redemption produces, and the denormalized view the transaction
//! reader assembles for presentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Brand, Customer, CustomerId, Points, Quantity, TransactionId, Voucher, VoucherId};

/// Lifecycle status of a transaction
///
/// The redemption path only ever writes `Completed`; `Pending` and `Failed`
/// exist for stores that record a header before its outcome is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Header recorded, outcome not yet known
    Pending,

    /// Points deducted and items recorded
    Completed,

    /// Redemption abandoned
    Failed,
}

/// One requested line: a voucher and how many units of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionItem {
    /// Voucher to redeem
    pub voucher: VoucherId,

    /// Number of units (must be >= 1)
    pub quantity: Quantity,
}

impl RedemptionItem {
    /// Create a new requested line
    pub fn new(voucher: VoucherId, quantity: Quantity) -> Self {
        RedemptionItem { voucher, quantity }
    }
}

/// A parsed redemption request
///
/// Items are processed in order; the first failing item decides the error
/// returned for the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    /// Customer spending the points
    pub customer: CustomerId,

    /// Requested lines, non-empty
    pub items: Vec<RedemptionItem>,

    /// Optional duplicate-submission guard, scoped to the customer
    ///
    /// When set and a transaction already exists for this customer and key,
    /// the existing transaction id is returned and nothing is written.
    pub idempotency_key: Option<String>,
}

impl RedemptionRequest {
    /// Create a request without an idempotency key
    pub fn new(customer: CustomerId, items: Vec<RedemptionItem>) -> Self {
        RedemptionRequest {
            customer,
            items,
            idempotency_key: None,
        }
    }

    /// Return this request guarded by the given idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Transaction header produced by a successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier
    pub id: TransactionId,

    /// Customer whose points were spent
    pub customer_id: CustomerId,

    /// Sum of the item totals
    pub total_points: Points,

    /// Lifecycle status
    pub status: TransactionStatus,

    /// Idempotency key the request carried, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item of a transaction
///
/// `points_per_unit` is a copy of the voucher cost taken at redemption time.
/// Later changes to the voucher never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    /// Item identifier
    pub id: uuid::Uuid,

    /// Owning transaction
    pub transaction_id: TransactionId,

    /// Redeemed voucher (lookup only)
    pub voucher_id: VoucherId,

    /// Number of units (>= 1)
    pub quantity: Quantity,

    /// Voucher cost snapshot
    pub points_per_unit: Points,

    /// `quantity * points_per_unit`
    pub total_points: Points,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item with its voucher and that voucher's brand
///
/// Voucher and brand are looked up at read time; either may be absent if the
/// catalog no longer holds the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: TransactionItem,
    pub voucher: Option<Voucher>,
    pub brand: Option<Brand>,
}

/// Transaction with its items and owning customer, for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub customer: Customer,
    pub items: Vec<ItemView>,
}

impl TransactionView {
    /// Sum of the item totals as stored on the items
    pub fn items_total(&self) -> Points {
        self.items.iter().map(|view| view.item.total_points).sum()
    }
}
