//! Read-only access to committed redemptions
//!
//! The reader assembles a transaction header, its customer and its items
//! with the current voucher and brand attached. Point values always come from
//! the item snapshots, never from the live voucher.

use std::sync::Arc;

use tracing::instrument;

use crate::core::traits::EntityStore;
use crate::types::{
    CustomerId, ItemView, RedemptionError, Transaction, TransactionId, TransactionView,
};

/// Loads committed transactions with their related records
#[derive(Debug)]
pub struct TransactionReader<S> {
    store: Arc<S>,
}

impl<S> Clone for TransactionReader<S> {
    fn clone(&self) -> Self {
        TransactionReader {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore> TransactionReader<S> {
    /// Create a reader over a shared store
    pub fn new(store: Arc<S>) -> Self {
        TransactionReader { store }
    }

    /// Load one transaction with its customer and items
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` if no transaction has this id
    /// - `PersistenceFailure` if the store fails or the owning customer is gone
    #[instrument(skip(self))]
    pub fn load(&self, id: TransactionId) -> Result<TransactionView, RedemptionError> {
        let transaction = self
            .store
            .transaction(id)?
            .ok_or_else(|| RedemptionError::transaction_not_found(id))?;

        self.assemble(transaction)
    }

    /// Load every transaction of a customer, oldest first
    ///
    /// An unknown customer simply has no transactions.
    #[instrument(skip(self))]
    pub fn list_by_customer(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<TransactionView>, RedemptionError> {
        self.store
            .customer_transactions(customer)?
            .into_iter()
            .map(|transaction| self.assemble(transaction))
            .collect()
    }

    fn assemble(&self, transaction: Transaction) -> Result<TransactionView, RedemptionError> {
        let customer = self
            .store
            .customer(transaction.customer_id)?
            .ok_or_else(|| {
                RedemptionError::persistence_failure(
                    "load_transaction",
                    format!(
                        "transaction {} references missing customer {}",
                        transaction.id, transaction.customer_id
                    ),
                )
            })?;

        let items = self
            .store
            .transaction_items(transaction.id)?
            .into_iter()
            .map(|item| {
                let voucher = self.store.voucher(item.voucher_id)?;
                let brand = match &voucher {
                    Some(voucher) => self.store.brand(voucher.brand_id)?,
                    None => None,
                };
                Ok::<_, RedemptionError>(ItemView {
                    item,
                    voucher,
                    brand,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransactionView {
            transaction,
            customer,
            items,
        })
    }
}
