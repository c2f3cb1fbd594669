//! Catalog seeding from CSV files
//!
//! Loads `brands.csv`, `vouchers.csv` and `customers.csv` from a directory
//! into an [`InMemoryEntityStore`]. Brands are loaded first because vouchers
//! must reference an existing brand.
//!
//! Unlike request files, a catalog is all-or-nothing: the first unreadable or
//! invalid row aborts the load, since redeeming against a partial catalog
//! would reject requests for the wrong reason.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::core::InMemoryEntityStore;
use crate::io::csv_format::{
    convert_brand_row, convert_customer_row, convert_voucher_row, BrandRow, CustomerRow,
    VoucherRow,
};

pub const BRANDS_FILE: &str = "brands.csv";
pub const VOUCHERS_FILE: &str = "vouchers.csv";
pub const CUSTOMERS_FILE: &str = "customers.csv";

/// Number of records loaded per catalog file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub brands: usize,
    pub vouchers: usize,
    pub customers: usize,
}

/// Load the catalog files in `dir` into `store`
///
/// # Arguments
///
/// * `dir` - Directory holding the three catalog files
/// * `store` - Store to seed
///
/// # Returns
///
/// * `Ok(CatalogSummary)` with the number of records per file
/// * `Err(String)` naming the file and line of the first failure
pub fn load_catalog(dir: &Path, store: &InMemoryEntityStore) -> Result<CatalogSummary, String> {
    let brands = load_rows(&dir.join(BRANDS_FILE), |row: BrandRow| {
        store
            .insert_brand(convert_brand_row(row))
            .map(drop)
            .map_err(|e| e.to_string())
    })?;

    let vouchers = load_rows(&dir.join(VOUCHERS_FILE), |row: VoucherRow| {
        store
            .insert_voucher(convert_voucher_row(row)?)
            .map(drop)
            .map_err(|e| e.to_string())
    })?;

    let customers = load_rows(&dir.join(CUSTOMERS_FILE), |row: CustomerRow| {
        store
            .insert_customer(convert_customer_row(row))
            .map(drop)
            .map_err(|e| e.to_string())
    })?;

    let summary = CatalogSummary {
        brands,
        vouchers,
        customers,
    };
    info!(
        brands = summary.brands,
        vouchers = summary.vouchers,
        customers = summary.customers,
        "catalog loaded"
    );

    Ok(summary)
}

/// Deserialize every row of `path` and hand it to `insert`, stopping at the first error
fn load_rows<T, F>(path: &Path, mut insert: F) -> Result<usize, String>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), String>,
{
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut count = 0;
    for (index, row) in reader.deserialize::<T>().enumerate() {
        // +2: 1-based and the header line
        let line = index + 2;
        let row = row
            .map_err(|e| format!("{} line {}: CSV parse error: {}", path.display(), line, e))?;
        insert(row).map_err(|e| format!("{} line {}: {}", path.display(), line, e))?;
        count += 1;
    }

    Ok(count)
}
