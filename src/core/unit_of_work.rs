//! Staging buffer for one atomic unit of work
//!
//! Redemption writes are never applied as they are decided. They are staged
//! here and handed to the store in one piece, which applies all of them or
//! none of them.

use crate::types::{Customer, Points, RedemptionError, Transaction, TransactionItem};

/// Writes staged by a unit of work, in the order the store applies them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWrites {
    /// Transaction headers to insert
    pub transactions: Vec<Transaction>,

    /// Line items to insert
    pub items: Vec<TransactionItem>,

    /// Points to take off the locked customer's balance
    pub points_debit: Points,
}

impl PendingWrites {
    /// Whether committing these writes would change nothing
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.items.is_empty() && self.points_debit == 0
    }
}

/// An open unit of work on one customer row
#[derive(Debug)]
pub struct UnitOfWork {
    customer: Customer,
    pending: PendingWrites,
}

impl UnitOfWork {
    /// Open a unit of work on a customer read under its row lock
    pub fn begin(customer: Customer) -> Self {
        UnitOfWork {
            customer,
            pending: PendingWrites::default(),
        }
    }

    /// The customer as read when the unit of work began
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    /// Stage a transaction header
    pub fn stage_transaction(&mut self, transaction: Transaction) {
        self.pending.transactions.push(transaction);
    }

    /// Stage a transaction line item
    pub fn stage_item(&mut self, item: TransactionItem) {
        self.pending.items.push(item);
    }

    /// Stage a decrement of the customer's balance
    ///
    /// Debits accumulate. The balance the debits are checked against is the
    /// one read under the row lock, so the decrement can never overdraw.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `amount` is negative or the running debit overflows
    /// - `InsufficientPoints` if the accumulated debit exceeds the balance
    pub fn debit_points(&mut self, amount: Points) -> Result<(), RedemptionError> {
        if amount < 0 {
            return Err(RedemptionError::bad_request(format!(
                "cannot debit a negative amount ({amount})"
            )));
        }

        let debit = self
            .pending
            .points_debit
            .checked_add(amount)
            .ok_or_else(|| RedemptionError::bad_request("point debit overflows"))?;

        if debit > self.customer.points {
            return Err(RedemptionError::insufficient_points(
                self.customer.id,
                self.customer.points,
                debit,
            ));
        }

        self.pending.points_debit = debit;
        Ok(())
    }

    /// Writes staged so far
    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Close the unit of work, yielding the locked customer and the staged writes
    pub fn into_parts(self) -> (Customer, PendingWrites) {
        (self.customer, self.pending)
    }
}
