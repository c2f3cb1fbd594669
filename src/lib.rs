//! Voucher Redemption Engine Library
//! # Overview
//!
//! This library redeems loyalty vouchers for points. A redemption spends a
//! customer's points on one or more vouchers and is committed as a single
//! all-or-nothing change: the balance decrement, the transaction header and
//! its line items are written together or not at all.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Brand, Voucher, Customer, Transaction, etc.)
//! - [`cli`] - CLI arguments parsing and log setup
//! - [`core`] - Business logic components:
//!   - [`core::validator`] - Voucher existence, activity and validity window
//!   - [`core::calculator`] - Item and grand totals
//!   - [`core::balance_guard`] - Balance sufficiency
//!   - [`core::engine`] - Redemption orchestration and commit
//!   - [`core::reader`] - Nested read-back of committed transactions
//!   - [`core::entity_store`] - In-memory store with per-customer row locks
//! - [`io`] - Catalog seeding, request parsing and output
//! - [`strategy`] - Sequential and concurrent batch pipelines
//!
//! # Redemption Rules
//!
//! - Every voucher must exist, be active and be inside its validity window
//!   at the evaluation instant (both bounds inclusive)
//! - Each item costs `quantity * cost_in_point`, snapshotted on the item
//! - The customer's balance, read under its row lock, must cover the total
//! - The first failing rule rejects the whole request and nothing is written
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use voucher_redemption_engine::{
//!     Brand, Customer, InMemoryEntityStore, RedemptionEngine, RedemptionItem,
//!     RedemptionRequest, TransactionReader, Voucher,
//! };
//!
//! let store = Arc::new(InMemoryEntityStore::new());
//! let brand = Brand::new("Acme");
//! store.insert_brand(brand.clone()).unwrap();
//! let voucher = store.insert_voucher(Voucher::new(brand.id, "Coffee", 300)).unwrap();
//! let customer = store
//!     .insert_customer(Customer::new("Ann", "ann@example.com", 1000))
//!     .unwrap();
//!
//! let engine = RedemptionEngine::new(Arc::clone(&store));
//! let request = RedemptionRequest::new(customer, vec![RedemptionItem::new(voucher, 2)]);
//! let id = engine.redeem(&request, Utc::now()).unwrap();
//!
//! let view = TransactionReader::new(store).load(id).unwrap();
//! assert_eq!(view.transaction.total_points, 600);
//! assert_eq!(view.customer.points, 400);
//! ```

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{
    BatchProcessor, EntityStore, InMemoryEntityStore, RedemptionEngine, TransactionReader,
    WriteStep,
};
pub use io::{write_balances_csv, write_ledger_jsonl};
pub use types::{
    Brand, BrandId, Customer, CustomerId, ItemView, Points, Quantity, RedemptionError,
    RedemptionItem, RedemptionRequest, Transaction, TransactionId, TransactionItem,
    TransactionStatus, TransactionView, Voucher, VoucherId,
};
