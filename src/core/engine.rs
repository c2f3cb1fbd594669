//! Redemption processing engine
//!
//! This module provides the `RedemptionEngine` that commits redemptions by
//! coordinating the voucher validator, the calculator and the balance guard
//! inside one unit of work on the customer's row.
//!
//! The engine enforces business rules such as:
//! - Request shape checks before any read (non-empty items, quantities >= 1)
//! - All-or-nothing validation across the item list
//! - Balance sufficiency against the balance read under the row lock
//! - Cost snapshots copied onto each line item at commit time

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::core::balance_guard::check_sufficient;
use crate::core::calculator::compute_totals;
use crate::core::traits::EntityStore;
use crate::core::unit_of_work::UnitOfWork;
use crate::core::validator::{self, ResolvedVoucher};
use crate::types::{
    Points, RedemptionError, RedemptionRequest, Transaction, TransactionId, TransactionItem,
    TransactionStatus,
};

/// What a unit of work decided, for logging
enum Outcome {
    Committed {
        transaction: TransactionId,
        total_points: Points,
    },
    Replayed {
        transaction: TransactionId,
    },
}

/// Redemption committer
///
/// Cheap to clone; clones share the same store and can be used from several
/// threads at once. Redemptions for the same customer serialize on the
/// customer's row lock, all others run in parallel.
#[derive(Debug)]
pub struct RedemptionEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for RedemptionEngine<S> {
    fn clone(&self) -> Self {
        RedemptionEngine {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore> RedemptionEngine<S> {
    /// Create an engine over a shared store
    pub fn new(store: Arc<S>) -> Self {
        RedemptionEngine { store }
    }

    /// The store this engine commits to
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Redeem vouchers for points
    ///
    /// Runs the whole redemption as one unit of work on the customer's row:
    /// 1. Read the customer under its row lock
    /// 2. Return the earlier transaction if the idempotency key was already used
    /// 3. Validate every voucher at `now`, stopping at the first failure
    /// 4. Compute item and grand totals
    /// 5. Check the balance covers the grand total
    /// 6. Stage the header, the items and the balance decrement, then commit
    ///
    /// Without an idempotency key the call is not idempotent: submitting the
    /// same request twice creates two transactions and deducts twice.
    ///
    /// # Arguments
    ///
    /// * `request` - Customer and requested items
    /// * `now` - Instant the validity windows are evaluated at
    ///
    /// # Returns
    ///
    /// The id of the committed transaction, for re-reading through the
    /// transaction reader.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an empty item list, a quantity below 1 or overflowing totals
    /// - `CustomerNotFound` if the customer is missing or inactive
    /// - `VoucherNotFound`, `VoucherNotYetValid`, `VoucherExpired` for the first bad item
    /// - `InsufficientPoints` if the balance does not cover the total
    /// - `PersistenceFailure` if the commit fails (nothing is written)
    #[instrument(
        skip(self, request),
        fields(customer = %request.customer, items = request.items.len())
    )]
    pub fn redeem(
        &self,
        request: &RedemptionRequest,
        now: DateTime<Utc>,
    ) -> Result<TransactionId, RedemptionError> {
        let outcome = check_request_shape(request).and_then(|()| {
            self.store
                .unit_of_work(request.customer, |unit| self.redeem_in_unit(unit, request, now))
        });

        match outcome {
            Ok(Outcome::Committed {
                transaction,
                total_points,
            }) => {
                info!(%transaction, total_points, "redemption committed");
                Ok(transaction)
            }
            Ok(Outcome::Replayed { transaction }) => {
                info!(%transaction, "idempotency key already used, returning existing transaction");
                Ok(transaction)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "redemption rejected");
                Err(e)
            }
        }
    }

    fn redeem_in_unit(
        &self,
        unit: &mut UnitOfWork,
        request: &RedemptionRequest,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RedemptionError> {
        let customer = unit.customer().clone();
        if !customer.is_active {
            return Err(RedemptionError::customer_not_found(customer.id));
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(transaction) = self.store.transaction_by_idempotency_key(customer.id, key)? {
                return Ok(Outcome::Replayed { transaction });
            }
        }

        // First failing item aborts the whole request
        let resolved = request
            .items
            .iter()
            .map(|item| validator::validate(self.store.as_ref(), item.voucher, now))
            .collect::<Result<Vec<ResolvedVoucher>, RedemptionError>>()?;

        let totals = compute_totals(
            resolved
                .iter()
                .zip(&request.items)
                .map(|(voucher, item)| (voucher.points_per_unit, item.quantity)),
        )?;

        check_sufficient(customer.id, customer.points, totals.grand_total)?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            total_points: totals.grand_total,
            status: TransactionStatus::Completed,
            idempotency_key: request.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        };

        unit.stage_transaction(transaction.clone());
        for ((voucher, item), item_total) in resolved
            .iter()
            .zip(&request.items)
            .zip(totals.item_totals)
        {
            unit.stage_item(TransactionItem {
                id: Uuid::new_v4(),
                transaction_id: transaction.id,
                voucher_id: voucher.id,
                quantity: item.quantity,
                points_per_unit: voucher.points_per_unit,
                total_points: item_total,
                created_at: now,
                updated_at: now,
            });
        }
        unit.debit_points(totals.grand_total)?;

        Ok(Outcome::Committed {
            transaction: transaction.id,
            total_points: totals.grand_total,
        })
    }
}

/// Reject requests that are malformed regardless of stored state
fn check_request_shape(request: &RedemptionRequest) -> Result<(), RedemptionError> {
    if request.items.is_empty() {
        return Err(RedemptionError::bad_request("items must not be empty"));
    }

    if let Some(item) = request.items.iter().find(|item| item.quantity < 1) {
        return Err(RedemptionError::bad_request(format!(
            "quantity for voucher {} must be at least 1, got {}",
            item.voucher, item.quantity
        )));
    }

    if matches!(&request.idempotency_key, Some(key) if key.trim().is_empty()) {
        return Err(RedemptionError::bad_request(
            "idempotency key must not be blank",
        ));
    }

    Ok(())
}
