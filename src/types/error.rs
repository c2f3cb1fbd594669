//! Error types for the voucher redemption engine
//!
//! This module defines every error a redemption, a catalog insert or a
//! transaction read can produce. Each variant carries enough context for the
//! caller to map it to a user-facing response.
//!
//! # Error Categories
//!
//! - **Request Errors**: malformed requests, arithmetic overflow, invalid catalog records
//! - **Lookup Errors**: unknown or inactive customers, vouchers and transactions
//! - **Business Rule Errors**: validity window violations, insufficient points
//! - **Storage Errors**: a unit of work that failed to commit
//!
//! Only [`RedemptionError::PersistenceFailure`] is retryable. Every other kind
//! is terminal for the given input.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::Points;

/// Main error type for the redemption engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedemptionError {
    /// The request or record is structurally invalid
    ///
    /// Covers empty item lists, non-positive quantities, malformed
    /// identifiers, point arithmetic that would overflow and catalog records
    /// that violate their field rules.
    #[error("Bad request: {reason}")]
    BadRequest {
        /// Description of what was wrong
        reason: String,
    },

    /// Customer id does not resolve to an active customer
    #[error("Customer {customer} not found")]
    CustomerNotFound {
        /// The customer id that was looked up
        customer: Uuid,
    },

    /// Voucher id does not resolve, or the voucher is inactive
    #[error("Voucher {voucher} not found or inactive")]
    VoucherNotFound {
        /// The voucher id that was looked up
        voucher: Uuid,
    },

    /// Voucher validity window has not opened yet
    #[error("Voucher {voucher} is not valid until {valid_from}")]
    VoucherNotYetValid {
        /// The voucher id
        voucher: Uuid,
        /// Start of the validity window
        valid_from: DateTime<Utc>,
    },

    /// Voucher validity window has closed
    #[error("Voucher {voucher} expired at {valid_to}")]
    VoucherExpired {
        /// The voucher id
        voucher: Uuid,
        /// End of the validity window
        valid_to: DateTime<Utc>,
    },

    /// The customer's balance does not cover the redemption total
    #[error("Insufficient points for customer {customer}: available {available}, required {required}")]
    InsufficientPoints {
        /// Customer id
        customer: Uuid,
        /// Balance read under the customer lock
        available: Points,
        /// Total required by the request
        required: Points,
    },

    /// Transaction id does not resolve
    #[error("Transaction {transaction} not found")]
    TransactionNotFound {
        /// The transaction id that was looked up
        transaction: Uuid,
    },

    /// The storage layer failed while committing or reading
    ///
    /// When raised from a unit of work, every staged write has been rolled
    /// back. This is the only retryable kind.
    #[error("Persistence failure during {operation}: {message}")]
    PersistenceFailure {
        /// Storage operation that failed
        operation: String,
        /// Description of the failure
        message: String,
    },
}

impl RedemptionError {
    /// Create a BadRequest error
    pub fn bad_request(reason: impl Into<String>) -> Self {
        RedemptionError::BadRequest {
            reason: reason.into(),
        }
    }

    /// Create a CustomerNotFound error
    pub fn customer_not_found(customer: Uuid) -> Self {
        RedemptionError::CustomerNotFound { customer }
    }

    /// Create a VoucherNotFound error
    pub fn voucher_not_found(voucher: Uuid) -> Self {
        RedemptionError::VoucherNotFound { voucher }
    }

    /// Create a VoucherNotYetValid error
    pub fn voucher_not_yet_valid(voucher: Uuid, valid_from: DateTime<Utc>) -> Self {
        RedemptionError::VoucherNotYetValid {
            voucher,
            valid_from,
        }
    }

    /// Create a VoucherExpired error
    pub fn voucher_expired(voucher: Uuid, valid_to: DateTime<Utc>) -> Self {
        RedemptionError::VoucherExpired { voucher, valid_to }
    }

    /// Create an InsufficientPoints error
    pub fn insufficient_points(customer: Uuid, available: Points, required: Points) -> Self {
        RedemptionError::InsufficientPoints {
            customer,
            available,
            required,
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(transaction: Uuid) -> Self {
        RedemptionError::TransactionNotFound { transaction }
    }

    /// Create a PersistenceFailure error
    pub fn persistence_failure(operation: &str, message: impl Into<String>) -> Self {
        RedemptionError::PersistenceFailure {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Whether the same input may succeed if submitted again unmodified
    pub fn is_retryable(&self) -> bool {
        matches!(self, RedemptionError::PersistenceFailure { .. })
    }
}
