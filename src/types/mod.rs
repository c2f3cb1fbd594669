//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `brand`: Brand records
//! - `voucher`: Voucher records and their validity window
//! - `customer`: Customer records and point balances
//! - `transaction`: Redemption requests, transactions, line items and read views
//! - `error`: Error types for the redemption engine

pub mod brand;
pub mod customer;
pub mod error;
pub mod transaction;
pub mod voucher;

pub use brand::Brand;
pub use customer::Customer;
pub use error::RedemptionError;
pub use transaction::{
    ItemView, RedemptionItem, RedemptionRequest, Transaction, TransactionItem, TransactionStatus,
    TransactionView,
};
pub use voucher::Voucher;

use uuid::Uuid;

/// Brand identifier
pub type BrandId = Uuid;

/// Voucher identifier
pub type VoucherId = Uuid;

/// Customer identifier
pub type CustomerId = Uuid;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Whole loyalty points; there are no fractional points
pub type Points = i64;

/// Number of voucher units in a line item
pub type Quantity = i64;
