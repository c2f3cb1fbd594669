//! CSV format handling for catalog records, redemption requests and output
//!
//! This module centralizes all CSV format concerns, providing:
//! - Row structures for the brand, voucher and customer catalog files
//! - Request rows and the grouping of consecutive rows into one request
//! - Balance output as CSV and the ledger as JSON lines
//!
//! Nothing here opens files, so everything is testable on in-memory data.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::types::{
    Brand, BrandId, Customer, CustomerId, Points, Quantity, RedemptionItem, RedemptionRequest,
    TransactionView, Voucher, VoucherId,
};

/// Row of `brands.csv`: `id,name,description,logo_url,is_active`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrandRow {
    pub id: BrandId,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Row of `vouchers.csv`:
/// `id,brand_id,name,description,cost_in_point,valid_from,valid_to,is_active`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct VoucherRow {
    pub id: VoucherId,
    pub brand_id: BrandId,
    pub name: String,
    pub description: Option<String>,
    pub cost_in_point: Points,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub is_active: Option<bool>,
}

/// Row of `customers.csv`: `id,name,email,phone,points,is_active`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CustomerRow {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub points: Points,
    pub is_active: Option<bool>,
}

/// Row of the requests file: `request,customer,voucher,quantity,idempotency_key`
///
/// Ids and quantity stay raw strings so that a malformed value rejects its
/// request instead of aborting the whole file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RequestRow {
    pub request: String,
    pub customer: String,
    pub voucher: String,
    pub quantity: String,
    pub idempotency_key: Option<String>,
}

/// A complete redemption request assembled from one or more request rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRequest {
    /// Position of the request in the input, starting at 0
    pub sequence: usize,

    /// Caller's label from the `request` column
    pub label: String,

    pub request: RedemptionRequest,
}

/// Convert a brand row into a brand record
///
/// Empty optional columns become empty strings; a missing `is_active` means
/// active. Field rules are enforced by the store on insert.
pub fn convert_brand_row(row: BrandRow) -> Brand {
    Brand {
        id: row.id,
        name: row.name,
        description: row.description.unwrap_or_default(),
        logo_url: row.logo_url.unwrap_or_default(),
        is_active: row.is_active.unwrap_or(true),
    }
}

/// Convert a voucher row into a voucher record
///
/// # Errors
///
/// Returns an error message if a validity bound is present but is not an
/// RFC 3339 timestamp.
pub fn convert_voucher_row(row: VoucherRow) -> Result<Voucher, String> {
    let valid_from = parse_bound("valid_from", row.valid_from.as_deref())?;
    let valid_to = parse_bound("valid_to", row.valid_to.as_deref())?;

    Ok(Voucher {
        id: row.id,
        brand_id: row.brand_id,
        name: row.name,
        description: row.description.unwrap_or_default(),
        cost_in_point: row.cost_in_point,
        valid_from,
        valid_to,
        is_active: row.is_active.unwrap_or(true),
    })
}

/// Convert a customer row into a customer record
pub fn convert_customer_row(row: CustomerRow) -> Customer {
    Customer {
        id: row.id,
        name: row.name,
        email: row.email,
        phone: row.phone.unwrap_or_default(),
        points: row.points,
        is_active: row.is_active.unwrap_or(true),
    }
}

fn parse_bound(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|instant| Some(instant.with_timezone(&Utc)))
            .map_err(|e| format!("Invalid {field} '{raw}': {e}")),
    }
}

/// Request rows sharing a label, not yet closed
#[derive(Debug)]
struct PendingGroup {
    label: String,
    first_line: usize,
    customer: Option<CustomerId>,
    items: Vec<RedemptionItem>,
    idempotency_key: Option<String>,
    error: Option<String>,
}

impl PendingGroup {
    fn new(label: String, first_line: usize) -> Self {
        PendingGroup {
            label,
            first_line,
            customer: None,
            items: Vec::new(),
            idempotency_key: None,
            error: None,
        }
    }

    fn add(&mut self, line: usize, row: RequestRow) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.try_add(row) {
            self.fail(line, &e);
        }
    }

    /// Keeps the first error only
    fn fail(&mut self, line: usize, error: &str) {
        if self.error.is_none() {
            self.error = Some(format!("Line {line}: {error}"));
        }
    }

    fn try_add(&mut self, row: RequestRow) -> Result<(), String> {
        let customer = parse_id("customer", &row.customer)?;
        let voucher = parse_id("voucher", &row.voucher)?;
        let quantity = row
            .quantity
            .trim()
            .parse::<Quantity>()
            .map_err(|_| format!("Invalid quantity '{}'", row.quantity))?;

        match self.customer {
            None => {
                self.customer = Some(customer);
                self.idempotency_key = row
                    .idempotency_key
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty());
            }
            Some(existing) if existing != customer => {
                return Err(format!(
                    "request mixes customers {existing} and {customer}"
                ));
            }
            Some(_) => {}
        }

        self.items.push(RedemptionItem::new(voucher, quantity));
        Ok(())
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("Invalid {field} id '{raw}'"))
}

/// Groups consecutive request rows with the same label into requests
///
/// Rows are pushed in file order. A request is emitted once a row with a
/// different label arrives, or on [`RequestGrouper::finish`]. A malformed row
/// rejects its whole request; the remaining rows of that request are
/// consumed but ignored. Rows that cannot be deserialized at all are reported
/// through [`RequestGrouper::reject`] so they poison their request too.
#[derive(Debug, Default)]
pub struct RequestGrouper {
    current: Option<PendingGroup>,
    emitted: usize,
}

impl RequestGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next row, returning the previous request if this row closed it
    ///
    /// # Arguments
    ///
    /// * `line` - 1-based line number of the row, for error messages
    /// * `row` - The deserialized request row
    pub fn push(&mut self, line: usize, row: RequestRow) -> Option<Result<LabeledRequest, String>> {
        let label = row.request.trim().to_string();
        let closed = self.open(&label, line);

        if let Some(group) = self.current.as_mut() {
            group.add(line, row);
        }

        closed
    }

    /// Record a row that could not be deserialized
    ///
    /// With a label, the row belongs to that request and rejects it, closing
    /// the previous request if the label changed. Without a usable label the
    /// open request is rejected; if none is open the error is returned as is.
    ///
    /// # Arguments
    ///
    /// * `line` - 1-based line number of the row, for error messages
    /// * `label` - The row's `request` column, if it could be read
    /// * `error` - Why the row could not be read
    pub fn reject(
        &mut self,
        line: usize,
        label: Option<&str>,
        error: &str,
    ) -> Option<Result<LabeledRequest, String>> {
        match label.map(str::trim).filter(|label| !label.is_empty()) {
            Some(label) => {
                let closed = self.open(label, line);
                if let Some(group) = self.current.as_mut() {
                    group.fail(line, error);
                }
                closed
            }
            None => match self.current.as_mut() {
                Some(group) => {
                    group.fail(line, error);
                    None
                }
                None => Some(Err(format!("Line {line}: {error}"))),
            },
        }
    }

    /// Close the last open request, if any
    pub fn finish(&mut self) -> Option<Result<LabeledRequest, String>> {
        self.current.take().map(|group| self.close(group))
    }

    /// Make `label` the open request, closing the previous one if it differs
    fn open(&mut self, label: &str, line: usize) -> Option<Result<LabeledRequest, String>> {
        if self
            .current
            .as_ref()
            .is_some_and(|group| group.label == label)
        {
            return None;
        }

        let closed = self.current.take().map(|group| self.close(group));
        self.current = Some(PendingGroup::new(label.to_string(), line));
        closed
    }

    fn close(&mut self, group: PendingGroup) -> Result<LabeledRequest, String> {
        let sequence = self.emitted;
        self.emitted += 1;

        match (group.error, group.customer) {
            (None, Some(customer)) => Ok(LabeledRequest {
                sequence,
                label: group.label,
                request: RedemptionRequest {
                    customer,
                    items: group.items,
                    idempotency_key: group.idempotency_key,
                },
            }),
            (Some(e), _) => Err(format!("Request '{}': {}", group.label, e)),
            (None, None) => Err(format!(
                "Request '{}' (line {}) has no items",
                group.label, group.first_line
            )),
        }
    }
}

/// Write customer balances in CSV format
///
/// Writes `customer,points` rows sorted by customer id for deterministic
/// output.
///
/// # Arguments
///
/// * `customers` - Customers to write
/// * `output` - Writer receiving the CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(customers: &[Customer], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["customer", "points"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&Customer> = customers.iter().collect();
    sorted.sort_by_key(|customer| customer.id);

    for customer in sorted {
        writer
            .write_record(&[customer.id.to_string(), customer.points.to_string()])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write transaction views as JSON lines, one view per line
pub fn write_ledger_jsonl(views: &[TransactionView], output: &mut dyn Write) -> Result<(), String> {
    for view in views {
        serde_json::to_writer(&mut *output, view)
            .map_err(|e| format!("Failed to serialize transaction {}: {}", view.transaction.id, e))?;
        writeln!(output).map_err(|e| format!("Failed to write ledger: {}", e))?;
    }

    output
        .flush()
        .map_err(|e| format!("Failed to flush ledger: {}", e))
}
