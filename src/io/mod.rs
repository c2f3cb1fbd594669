//! I/O module
//!
//! Handles catalog seeding, request parsing and output.
//!
//! # Components
//!
//! - `csv_format` - Row structures, request grouping, balance and ledger output
//! - `catalog` - Seeding the in-memory store from catalog CSV files
//! - `sync_reader` - Synchronous request reader with iterator interface
//! - `async_reader` - Asynchronous request reader with batch reading interface

pub mod async_reader;
pub mod catalog;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use catalog::{load_catalog, CatalogSummary};
pub use csv_format::{write_balances_csv, write_ledger_jsonl, LabeledRequest, RequestGrouper};
pub use sync_reader::SyncReader;
