//! Thread-safe in-memory entity store
//!
//! This module provides the `InMemoryEntityStore` struct, which keeps brands,
//! vouchers, customers and redemption transactions in concurrent maps and
//! implements the [`EntityStore`] unit-of-work contract on top of them.
//!
//! # Design
//!
//! Every table is a `DashMap`, so lookups on different records never block
//! each other. Three extra pieces provide the transactional guarantees:
//!
//! - **Row locks**: one `parking_lot::Mutex` per customer, created on first
//!   use and held for the whole unit of work. Two redemptions against the same
//!   customer are serialized; redemptions for different customers are not.
//! - **Commit gate**: a store-wide `RwLock`. Applying a commit takes the write
//!   side, multi-table reads take the read side, so a reader sees all of a
//!   commit or none of it.
//! - **Undo log**: each applied write records how to reverse it. If a later
//!   write of the same commit fails, the log is replayed backwards before the
//!   gate is released.
//!
//! # Fault Injection
//!
//! Memory writes do not fail on their own. [`InMemoryEntityStore::fail_next_write`]
//! arms a one-shot failure at a chosen commit step so the rollback path can be
//! exercised.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::core::traits::EntityStore;
use crate::core::unit_of_work::{PendingWrites, UnitOfWork};
use crate::types::{
    Brand, BrandId, Customer, CustomerId, Points, RedemptionError, Transaction, TransactionId,
    TransactionItem, Voucher, VoucherId,
};

/// Shortest accepted brand or customer name, in characters
const MIN_NAME_LEN: usize = 2;

/// Longest accepted brand or customer name, in characters
const MAX_NAME_LEN: usize = 255;

/// Commit step at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Inserting a transaction header
    InsertTransaction,
    /// Inserting a transaction line item
    InsertItem,
    /// Writing the decremented customer balance
    UpdateCustomerPoints,
}

impl WriteStep {
    fn operation(self) -> &'static str {
        match self {
            WriteStep::InsertTransaction => "insert_transaction",
            WriteStep::InsertItem => "insert_item",
            WriteStep::UpdateCustomerPoints => "update_customer_points",
        }
    }
}

/// Reversal of one applied write
#[derive(Debug)]
enum Undo {
    RemoveTransaction {
        transaction: TransactionId,
        customer: CustomerId,
        idempotency_key: Option<String>,
    },
    RemoveItems(TransactionId),
    RestorePoints(CustomerId, Points),
}

/// In-memory implementation of [`EntityStore`]
///
/// Safe to share across threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    brands: DashMap<BrandId, Brand>,
    vouchers: DashMap<VoucherId, Voucher>,
    customers: DashMap<CustomerId, Customer>,

    /// Email -> owning customer, enforces email uniqueness
    emails: DashMap<String, CustomerId>,

    transactions: DashMap<TransactionId, Transaction>,
    items: DashMap<TransactionId, Vec<TransactionItem>>,

    /// Customer -> transaction ids in creation order
    customer_transactions: DashMap<CustomerId, Vec<TransactionId>>,

    /// (customer, key) -> transaction committed under that key
    idempotency_keys: DashMap<(CustomerId, String), TransactionId>,

    row_locks: DashMap<CustomerId, Arc<Mutex<()>>>,
    commit_gate: RwLock<()>,
    armed_fault: Mutex<Option<WriteStep>>,
}

impl InMemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a brand
    ///
    /// # Errors
    ///
    /// `BadRequest` if the name is not 2..=255 characters or the id is taken.
    pub fn insert_brand(&self, brand: Brand) -> Result<BrandId, RedemptionError> {
        check_name("brand", &brand.name)?;

        let id = brand.id;
        if self.brands.contains_key(&id) {
            return Err(RedemptionError::bad_request(format!(
                "brand {id} already exists"
            )));
        }
        self.brands.insert(id, brand);
        Ok(id)
    }

    /// Insert a voucher
    ///
    /// # Errors
    ///
    /// `BadRequest` if the owning brand does not exist, the name is empty,
    /// the cost is not positive, the window is reversed or the id is taken.
    pub fn insert_voucher(&self, voucher: Voucher) -> Result<VoucherId, RedemptionError> {
        self.check_voucher(&voucher)?;

        let id = voucher.id;
        if self.vouchers.contains_key(&id) {
            return Err(RedemptionError::bad_request(format!(
                "voucher {id} already exists"
            )));
        }
        self.vouchers.insert(id, voucher);
        Ok(id)
    }

    /// Replace an existing voucher, e.g. to reprice or deactivate it
    ///
    /// Transaction items already written keep the cost they were redeemed at.
    ///
    /// # Errors
    ///
    /// - `VoucherNotFound` if no voucher has this id
    /// - `BadRequest` under the same rules as [`Self::insert_voucher`]
    pub fn update_voucher(&self, voucher: Voucher) -> Result<(), RedemptionError> {
        self.check_voucher(&voucher)?;

        match self.vouchers.get_mut(&voucher.id) {
            Some(mut entry) => {
                *entry.value_mut() = voucher;
                Ok(())
            }
            None => Err(RedemptionError::voucher_not_found(voucher.id)),
        }
    }

    /// Insert a customer
    ///
    /// A negative opening balance is stored as zero.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the name is not 2..=255 characters, the email is empty
    /// or already used, or the id is taken.
    pub fn insert_customer(&self, mut customer: Customer) -> Result<CustomerId, RedemptionError> {
        check_name("customer", &customer.name)?;
        if customer.email.trim().is_empty() {
            return Err(RedemptionError::bad_request("customer email is required"));
        }

        let id = customer.id;
        if self.customers.contains_key(&id) {
            return Err(RedemptionError::bad_request(format!(
                "customer {id} already exists"
            )));
        }

        // Claim the email first; the entry lock makes check-and-claim atomic
        let owner = *self
            .emails
            .entry(customer.email.clone())
            .or_insert(id)
            .value();
        if owner != id {
            return Err(RedemptionError::bad_request(format!(
                "email {} already exists",
                customer.email
            )));
        }

        customer.points = customer.points.max(0);
        self.customers.insert(id, customer);
        Ok(id)
    }

    /// Overwrite a customer's balance
    ///
    /// Takes the customer's row lock, so it never interleaves with a redemption
    /// on the same customer.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `points` is negative
    /// - `CustomerNotFound` if the customer does not exist
    pub fn set_customer_points(
        &self,
        customer: CustomerId,
        points: Points,
    ) -> Result<Customer, RedemptionError> {
        if points < 0 {
            return Err(RedemptionError::bad_request("points cannot be negative"));
        }

        let row_lock = self.row_lock(customer)?;
        let _row = row_lock.lock();

        match self.customers.get_mut(&customer) {
            Some(mut entry) => {
                entry.value_mut().points = points;
                Ok(entry.value().clone())
            }
            None => Err(RedemptionError::customer_not_found(customer)),
        }
    }

    /// All customers sorted by id
    pub fn customers(&self) -> Vec<Customer> {
        let mut customers: Vec<Customer> = self
            .customers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        customers.sort_by_key(|customer| customer.id);
        customers
    }

    /// Number of committed transactions
    pub fn transaction_count(&self) -> usize {
        let _gate = self.commit_gate.read();
        self.transactions.len()
    }

    /// Number of committed transaction items
    pub fn item_count(&self) -> usize {
        let _gate = self.commit_gate.read();
        self.items.iter().map(|entry| entry.value().len()).sum()
    }

    /// Arm a one-shot failure at the given commit step
    ///
    /// The next commit that reaches `step` fails with `PersistenceFailure` and
    /// rolls back. The fault is consumed by that commit.
    pub fn fail_next_write(&self, step: WriteStep) {
        *self.armed_fault.lock() = Some(step);
    }

    fn check_voucher(&self, voucher: &Voucher) -> Result<(), RedemptionError> {
        if !self.brands.contains_key(&voucher.brand_id) {
            return Err(RedemptionError::bad_request(format!(
                "brand {} not found",
                voucher.brand_id
            )));
        }
        if voucher.name.trim().is_empty() {
            return Err(RedemptionError::bad_request("voucher name is required"));
        }
        if voucher.cost_in_point <= 0 {
            return Err(RedemptionError::bad_request(
                "cost in point must be greater than 0",
            ));
        }
        if !voucher.has_ordered_window() {
            return Err(RedemptionError::bad_request(
                "valid from date must be before valid to date",
            ));
        }
        Ok(())
    }

    /// Lock for one customer row, created on first use
    ///
    /// Customers are never removed, so no lock is created for an id that is
    /// not stored.
    fn row_lock(&self, customer: CustomerId) -> Result<Arc<Mutex<()>>, RedemptionError> {
        if !self.customers.contains_key(&customer) {
            return Err(RedemptionError::customer_not_found(customer));
        }

        Ok(Arc::clone(
            self.row_locks
                .entry(customer)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        ))
    }

    fn check_fault(&self, step: WriteStep) -> Result<(), RedemptionError> {
        let mut armed = self.armed_fault.lock();
        if *armed == Some(step) {
            *armed = None;
            return Err(RedemptionError::persistence_failure(
                step.operation(),
                "injected write failure",
            ));
        }
        Ok(())
    }

    /// Apply staged writes in order: headers, items, balance
    ///
    /// Must be called with the customer's row lock held.
    fn commit(&self, customer: &Customer, pending: PendingWrites) -> Result<(), RedemptionError> {
        if pending.is_empty() {
            return Ok(());
        }

        let _gate = self.commit_gate.write();
        let mut undo_log = Vec::new();

        match self.apply(customer, pending, &mut undo_log) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(customer = %customer.id, steps = undo_log.len(), "rolling back commit");
                self.roll_back(undo_log);
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        customer: &Customer,
        pending: PendingWrites,
        undo_log: &mut Vec<Undo>,
    ) -> Result<(), RedemptionError> {
        for transaction in pending.transactions {
            self.check_fault(WriteStep::InsertTransaction)?;

            let id = transaction.id;
            if self.transactions.contains_key(&id) {
                return Err(RedemptionError::persistence_failure(
                    "insert_transaction",
                    format!("transaction {id} already exists"),
                ));
            }

            let key = transaction.idempotency_key.clone();
            self.transactions.insert(id, transaction);
            self.customer_transactions
                .entry(customer.id)
                .or_default()
                .push(id);
            if let Some(key) = &key {
                self.idempotency_keys.insert((customer.id, key.clone()), id);
            }
            undo_log.push(Undo::RemoveTransaction {
                transaction: id,
                customer: customer.id,
                idempotency_key: key,
            });
        }

        for item in pending.items {
            self.check_fault(WriteStep::InsertItem)?;

            let transaction = item.transaction_id;
            if !self.transactions.contains_key(&transaction) {
                return Err(RedemptionError::persistence_failure(
                    "insert_item",
                    format!("item references missing transaction {transaction}"),
                ));
            }

            let mut items = self.items.entry(transaction).or_default();
            if items.is_empty() {
                undo_log.push(Undo::RemoveItems(transaction));
            }
            items.push(item);
        }

        if pending.points_debit != 0 {
            self.check_fault(WriteStep::UpdateCustomerPoints)?;

            let mut entry = self.customers.get_mut(&customer.id).ok_or_else(|| {
                RedemptionError::persistence_failure(
                    "update_customer_points",
                    format!("customer {} disappeared during commit", customer.id),
                )
            })?;
            let record = entry.value_mut();
            let new_points = record
                .points
                .checked_sub(pending.points_debit)
                .filter(|points| *points >= 0)
                .ok_or_else(|| {
                    RedemptionError::persistence_failure(
                        "update_customer_points",
                        format!("balance of customer {} would go negative", customer.id),
                    )
                })?;
            undo_log.push(Undo::RestorePoints(customer.id, record.points));
            record.points = new_points;
        }

        Ok(())
    }

    fn roll_back(&self, undo_log: Vec<Undo>) {
        for undo in undo_log.into_iter().rev() {
            match undo {
                Undo::RemoveTransaction {
                    transaction,
                    customer,
                    idempotency_key,
                } => {
                    self.transactions.remove(&transaction);
                    if let Some(mut ids) = self.customer_transactions.get_mut(&customer) {
                        ids.retain(|id| *id != transaction);
                    }
                    if let Some(key) = idempotency_key {
                        self.idempotency_keys.remove(&(customer, key));
                    }
                }
                Undo::RemoveItems(transaction) => {
                    self.items.remove(&transaction);
                }
                Undo::RestorePoints(customer, points) => {
                    if let Some(mut entry) = self.customers.get_mut(&customer) {
                        entry.value_mut().points = points;
                    }
                }
            }
        }
    }
}

impl EntityStore for InMemoryEntityStore {
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, RedemptionError> {
        let _gate = self.commit_gate.read();
        Ok(self.customers.get(&id).map(|entry| entry.value().clone()))
    }

    fn voucher(&self, id: VoucherId) -> Result<Option<Voucher>, RedemptionError> {
        Ok(self.vouchers.get(&id).map(|entry| entry.value().clone()))
    }

    fn brand(&self, id: BrandId) -> Result<Option<Brand>, RedemptionError> {
        Ok(self.brands.get(&id).map(|entry| entry.value().clone()))
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RedemptionError> {
        let _gate = self.commit_gate.read();
        Ok(self.transactions.get(&id).map(|entry| entry.value().clone()))
    }

    fn transaction_items(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<TransactionItem>, RedemptionError> {
        let _gate = self.commit_gate.read();
        Ok(self
            .items
            .get(&transaction)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn customer_transactions(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<Transaction>, RedemptionError> {
        let _gate = self.commit_gate.read();
        let ids = match self.customer_transactions.get(&customer) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };

        ids.into_iter()
            .map(|id| {
                self.transactions
                    .get(&id)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| {
                        RedemptionError::persistence_failure(
                            "customer_transactions",
                            format!("index references missing transaction {id}"),
                        )
                    })
            })
            .collect()
    }

    fn transaction_by_idempotency_key(
        &self,
        customer: CustomerId,
        key: &str,
    ) -> Result<Option<TransactionId>, RedemptionError> {
        let _gate = self.commit_gate.read();
        Ok(self
            .idempotency_keys
            .get(&(customer, key.to_string()))
            .map(|entry| *entry.value()))
    }

    fn unit_of_work<T, F>(&self, customer: CustomerId, work: F) -> Result<T, RedemptionError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, RedemptionError>,
    {
        let row_lock = self.row_lock(customer)?;
        let _row = row_lock.lock();

        let snapshot = self
            .customers
            .get(&customer)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RedemptionError::customer_not_found(customer))?;

        let mut unit = UnitOfWork::begin(snapshot);
        let value = work(&mut unit)?;

        let (locked_customer, pending) = unit.into_parts();
        self.commit(&locked_customer, pending)?;

        Ok(value)
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), RedemptionError> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(RedemptionError::bad_request(format!(
            "{kind} name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionStatus;
    use chrono::{Duration, Utc};
    use rstest::rstest;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration as StdDuration;

    fn seeded_store() -> (InMemoryEntityStore, Customer, Voucher) {
        let store = InMemoryEntityStore::new();
        let brand = Brand::new("Acme");
        let voucher = Voucher::new(brand.id, "Coffee", 300);
        let customer = Customer::new("Ann", "ann@example.com", 1000);

        store.insert_brand(brand).unwrap();
        store.insert_voucher(voucher.clone()).unwrap();
        store.insert_customer(customer.clone()).unwrap();

        (store, customer, voucher)
    }

    fn header(customer: CustomerId, total_points: Points) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new_v4(),
            customer_id: customer,
            total_points,
            status: TransactionStatus::Completed,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(
        transaction: &Transaction,
        voucher: VoucherId,
        quantity: i64,
        unit: Points,
    ) -> TransactionItem {
        TransactionItem {
            id: uuid::Uuid::new_v4(),
            transaction_id: transaction.id,
            voucher_id: voucher,
            quantity,
            points_per_unit: unit,
            total_points: quantity * unit,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }

    #[test]
    fn test_insert_and_get_records() {
        let (store, customer, voucher) = seeded_store();

        assert_eq!(store.customer(customer.id).unwrap(), Some(customer));
        assert_eq!(store.voucher(voucher.id).unwrap(), Some(voucher.clone()));
        assert!(store.brand(voucher.brand_id).unwrap().is_some());
        assert!(store.customer(CustomerId::new_v4()).unwrap().is_none());
    }

    #[rstest]
    #[case::short_name("A")]
    #[case::long_name(&"x".repeat(256))]
    fn test_insert_brand_rejects_bad_names(#[case] name: &str) {
        let store = InMemoryEntityStore::new();

        let result = store.insert_brand(Brand::new(name));

        assert!(matches!(result.unwrap_err(), RedemptionError::BadRequest { .. }));
    }

    #[test]
    fn test_insert_voucher_requires_existing_brand() {
        let store = InMemoryEntityStore::new();

        let result = store.insert_voucher(Voucher::new(BrandId::new_v4(), "Coffee", 300));

        assert!(matches!(result.unwrap_err(), RedemptionError::BadRequest { .. }));
    }

    #[rstest]
    #[case::zero_cost(0, None, None)]
    #[case::negative_cost(-5, None, None)]
    #[case::reversed_window(100, Some(10), Some(-10))]
    fn test_insert_voucher_rejects_invalid_fields(
        #[case] cost: Points,
        #[case] from_offset_days: Option<i64>,
        #[case] to_offset_days: Option<i64>,
    ) {
        let store = InMemoryEntityStore::new();
        let brand = Brand::new("Acme");
        let brand_id = store.insert_brand(brand).unwrap();
        let now = Utc::now();

        let voucher = Voucher::new(brand_id, "Coffee", cost).with_window(
            from_offset_days.map(|d| now + Duration::days(d)),
            to_offset_days.map(|d| now + Duration::days(d)),
        );

        let result = store.insert_voucher(voucher);
        assert!(matches!(result.unwrap_err(), RedemptionError::BadRequest { .. }));
    }

    #[test]
    fn test_insert_customer_rejects_duplicate_email() {
        let (store, _, _) = seeded_store();

        let result = store.insert_customer(Customer::new("Other Ann", "ann@example.com", 10));

        assert!(matches!(result.unwrap_err(), RedemptionError::BadRequest { .. }));
        assert_eq!(store.customers().len(), 1);
    }

    #[test]
    fn test_insert_customer_clamps_negative_balance() {
        let store = InMemoryEntityStore::new();
        let id = store
            .insert_customer(Customer::new("Bob", "bob@example.com", -50))
            .unwrap();

        assert_eq!(store.customer(id).unwrap().unwrap().points, 0);
    }

    #[test]
    fn test_set_customer_points() {
        let (store, customer, _) = seeded_store();

        let updated = store.set_customer_points(customer.id, 42).unwrap();
        assert_eq!(updated.points, 42);

        assert!(matches!(
            store.set_customer_points(customer.id, -1).unwrap_err(),
            RedemptionError::BadRequest { .. }
        ));
        assert!(matches!(
            store.set_customer_points(CustomerId::new_v4(), 1).unwrap_err(),
            RedemptionError::CustomerNotFound { .. }
        ));
    }

    #[test]
    fn test_update_voucher_replaces_record() {
        let (store, _, voucher) = seeded_store();

        let mut repriced = voucher.clone();
        repriced.cost_in_point = 450;
        store.update_voucher(repriced).unwrap();

        assert_eq!(store.voucher(voucher.id).unwrap().unwrap().cost_in_point, 450);
    }

    #[test]
    fn test_unit_of_work_unknown_customer() {
        let store = InMemoryEntityStore::new();

        let result = store.unit_of_work(CustomerId::new_v4(), |_| Ok(()));

        assert!(matches!(
            result.unwrap_err(),
            RedemptionError::CustomerNotFound { .. }
        ));
    }

    #[test]
    fn test_unknown_customers_leave_no_row_locks() {
        let (store, customer, _) = seeded_store();

        for _ in 0..10 {
            let _ = store.unit_of_work(CustomerId::new_v4(), |_| Ok(()));
            let _ = store.set_customer_points(CustomerId::new_v4(), 1);
        }
        assert!(store.row_locks.is_empty());

        store.unit_of_work(customer.id, |_| Ok(())).unwrap();
        assert_eq!(store.row_locks.len(), 1);
    }

    #[test]
    fn test_customer_read_waits_for_commit_in_progress() {
        let (store, customer, _) = seeded_store();
        let store = Arc::new(store);
        let (sender, receiver) = mpsc::channel();

        let id = customer.id;

        let gate = store.commit_gate.write();
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                sender.send(store.customer(id).unwrap()).unwrap();
            })
        };

        assert!(receiver.recv_timeout(StdDuration::from_millis(100)).is_err());
        drop(gate);

        let seen = receiver.recv().unwrap().unwrap();
        assert_eq!(seen.points, customer.points);
        reader.join().unwrap();
    }

    #[test]
    fn test_unit_of_work_commits_all_writes() {
        let (store, customer, voucher) = seeded_store();
        let tx = header(customer.id, 600);

        store
            .unit_of_work(customer.id, |unit| {
                unit.stage_transaction(tx.clone());
                unit.stage_item(item(&tx, voucher.id, 2, 300));
                unit.debit_points(600)
            })
            .unwrap();

        assert_eq!(store.transaction(tx.id).unwrap(), Some(tx.clone()));
        assert_eq!(store.transaction_items(tx.id).unwrap().len(), 1);
        assert_eq!(store.customer(customer.id).unwrap().unwrap().points, 400);
        assert_eq!(store.customer_transactions(customer.id).unwrap(), vec![tx]);
    }

    #[test]
    fn test_unit_of_work_error_writes_nothing() {
        let (store, customer, voucher) = seeded_store();
        let tx = header(customer.id, 600);

        let result: Result<(), _> = store.unit_of_work(customer.id, |unit| {
            unit.stage_transaction(tx.clone());
            unit.stage_item(item(&tx, voucher.id, 2, 300));
            Err(RedemptionError::bad_request("abandon"))
        });

        assert!(result.is_err());
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.item_count(), 0);
        assert_eq!(store.customer(customer.id).unwrap().unwrap().points, 1000);
    }

    #[rstest]
    #[case::header(WriteStep::InsertTransaction)]
    #[case::item(WriteStep::InsertItem)]
    #[case::balance(WriteStep::UpdateCustomerPoints)]
    fn test_injected_fault_rolls_back_every_write(#[case] step: WriteStep) {
        let (store, customer, voucher) = seeded_store();
        let keyed = Transaction {
            idempotency_key: Some("k-1".to_string()),
            ..header(customer.id, 600)
        };

        store.fail_next_write(step);
        let result = store.unit_of_work(customer.id, |unit| {
            unit.stage_transaction(keyed.clone());
            unit.stage_item(item(&keyed, voucher.id, 1, 300));
            unit.stage_item(item(&keyed, voucher.id, 1, 300));
            unit.debit_points(600)
        });

        let error = result.unwrap_err();
        assert!(error.is_retryable());
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.item_count(), 0);
        assert!(store.customer_transactions(customer.id).unwrap().is_empty());
        assert!(store
            .transaction_by_idempotency_key(customer.id, "k-1")
            .unwrap()
            .is_none());
        assert_eq!(store.customer(customer.id).unwrap().unwrap().points, 1000);
    }

    #[test]
    fn test_fault_is_consumed_by_one_commit() {
        let (store, customer, _) = seeded_store();
        store.fail_next_write(WriteStep::UpdateCustomerPoints);

        assert!(store
            .unit_of_work(customer.id, |unit| unit.debit_points(1))
            .is_err());
        assert!(store
            .unit_of_work(customer.id, |unit| unit.debit_points(1))
            .is_ok());
        assert_eq!(store.customer(customer.id).unwrap().unwrap().points, 999);
    }

    #[test]
    fn test_idempotency_key_is_indexed_per_customer() {
        let (store, customer, _) = seeded_store();
        let tx = Transaction {
            idempotency_key: Some("order-7".to_string()),
            ..header(customer.id, 0)
        };

        store
            .unit_of_work(customer.id, |unit| {
                unit.stage_transaction(tx.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            store
                .transaction_by_idempotency_key(customer.id, "order-7")
                .unwrap(),
            Some(tx.id)
        );
        assert!(store
            .transaction_by_idempotency_key(CustomerId::new_v4(), "order-7")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_row_lock_serializes_read_modify_write() {
        let (store, customer, _) = seeded_store();
        let store = Arc::new(store);

        // 1000 points, 20 threads each debiting 100: exactly 10 can succeed
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.unit_of_work(customer.id, |unit| {
                        let balance = unit.customer().points;
                        if balance < 100 {
                            return Err(RedemptionError::insufficient_points(
                                customer.id,
                                balance,
                                100,
                            ));
                        }
                        unit.debit_points(100)
                    })
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(successes, 10);
        assert_eq!(store.customer(customer.id).unwrap().unwrap().points, 0);
    }
}
