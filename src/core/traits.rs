//! Storage abstraction the redemption engine runs against
//!
//! The engine never touches a concrete store. It needs point lookups, the
//! scans the transaction reader performs, and one atomic unit-of-work
//! primitive scoped to a customer row.

use crate::core::unit_of_work::UnitOfWork;
use crate::types::{
    Brand, BrandId, Customer, CustomerId, RedemptionError, Transaction, TransactionId,
    TransactionItem, Voucher, VoucherId,
};

/// Durable keyed storage for the redemption domain
///
/// Lookups return `Ok(None)` for a missing record; `Err` is reserved for
/// storage failures and is reported as [`RedemptionError::PersistenceFailure`].
pub trait EntityStore: Send + Sync {
    /// Get a customer by id
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, RedemptionError>;

    /// Get a voucher by id
    fn voucher(&self, id: VoucherId) -> Result<Option<Voucher>, RedemptionError>;

    /// Get a brand by id
    fn brand(&self, id: BrandId) -> Result<Option<Brand>, RedemptionError>;

    /// Get a transaction header by id
    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RedemptionError>;

    /// Get the items of a transaction in insertion order
    fn transaction_items(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<TransactionItem>, RedemptionError>;

    /// Get a customer's transactions in creation order
    fn customer_transactions(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<Transaction>, RedemptionError>;

    /// Find the transaction a customer already committed under an idempotency key
    fn transaction_by_idempotency_key(
        &self,
        customer: CustomerId,
        key: &str,
    ) -> Result<Option<TransactionId>, RedemptionError>;

    /// Run `work` as one atomic unit of work on a customer row
    ///
    /// The implementation must:
    /// - lock the customer row for the whole call, so no other unit of work
    ///   on the same customer can read or write its balance meanwhile
    /// - hand `work` a [`UnitOfWork`] holding the customer as read under that lock
    /// - apply everything `work` staged only if it returns `Ok`, and apply all
    ///   of it or none of it
    ///
    /// # Errors
    ///
    /// - `CustomerNotFound` if the customer row does not exist
    /// - whatever `work` returns (nothing is written)
    /// - `PersistenceFailure` if applying the staged writes fails (everything
    ///   already applied is rolled back)
    fn unit_of_work<T, F>(&self, customer: CustomerId, work: F) -> Result<T, RedemptionError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, RedemptionError>;
}
