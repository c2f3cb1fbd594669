//! Synchronous request reader with iterator interface
//!
//! Provides a streaming iterator over redemption requests from a CSV file.
//! Delegates row conversion and grouping to the csv_format module.
//!
//! # Design
//!
//! The SyncReader reads raw records with csv::Reader, deserializes each one
//! against the header and feeds it to a [`RequestGrouper`]. A record that
//! does not deserialize is handed to the grouper as well, keyed by its first
//! column, so it rejects its request instead of vanishing from it. A request is yielded as soon as the
//! first row of the next request (or the end of the file) is seen, so memory
//! use is bounded by the largest single request, not by the file.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - A malformed or unreadable row yields an `Err` for its whole request
//! - Line numbers are included in error messages for debugging

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::io::csv_format::{LabeledRequest, RequestGrouper, RequestRow};

/// Synchronous request reader
///
/// # Examples
///
/// ```no_run
/// use voucher_redemption_engine::io::sync_reader::SyncReader;
/// use std::path::Path;
///
/// let reader = SyncReader::new(Path::new("requests.csv")).unwrap();
/// let requests: Vec<_> = reader.filter_map(Result::ok).collect();
/// println!("Parsed {} requests", requests.len());
/// ```
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    headers: StringRecord,
    grouper: RequestGrouper,
    line_num: usize,
}

impl SyncReader {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader trims whitespace from all fields and allows rows
    /// without the trailing `idempotency_key` column.
    ///
    /// # Errors
    ///
    /// Returns an error message if the file could not be opened or its
    /// header could not be read.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| format!("Failed to read header of '{}': {}", path.display(), e))?
            .clone();

        Ok(Self {
            reader,
            headers,
            grouper: RequestGrouper::new(),
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LabeledRequest, String>;

    /// Get the next complete request from the CSV file
    ///
    /// # Returns
    ///
    /// * `Some(Ok(LabeledRequest))` - A request with all of its rows
    /// * `Some(Err(String))` - A malformed request or row, with line number
    /// * `None` - End of file reached and the last request emitted
    fn next(&mut self) -> Option<Self::Item> {
        let mut record = StringRecord::new();

        loop {
            let closed = match self.reader.read_record(&mut record) {
                Ok(true) => {
                    self.line_num += 1;
                    let line = self.line_num + 1;
                    match record.deserialize::<RequestRow>(Some(&self.headers)) {
                        Ok(row) => self.grouper.push(line, row),
                        Err(e) => self.grouper.reject(
                            line,
                            record.get(0),
                            &format!("CSV parse error: {}", e),
                        ),
                    }
                }
                Ok(false) => return self.grouper.finish(),
                Err(e) => {
                    self.line_num += 1;
                    self.grouper.reject(
                        self.line_num + 1,
                        None,
                        &format!("CSV parse error: {}", e),
                    )
                }
            };

            if closed.is_some() {
                return closed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "request,customer,voucher,quantity,idempotency_key\n";
    const ANN: &str = "00000000-0000-0000-0000-00000000000a";
    const COFFEE: &str = "00000000-0000-0000-0000-000000000c01";

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(rows: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes()).unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_new_fails_on_missing_file() {
        let result = SyncReader::new(Path::new("nonexistent.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_sync_reader_groups_multi_item_request() {
        let file = create_temp_csv(&[
            format!("r1,{ANN},{COFFEE},2,k1"),
            format!("r1,{ANN},{COFFEE},1,"),
            format!("r2,{ANN},{COFFEE},1"),
        ]);

        let requests: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(requests.len(), 2);
        let first = requests[0].as_ref().unwrap();
        assert_eq!(first.request.items.len(), 2);
        assert_eq!(first.request.idempotency_key.as_deref(), Some("k1"));
        let second = requests[1].as_ref().unwrap();
        assert_eq!(second.label, "r2");
        assert_eq!(second.sequence, 1);
    }

    #[test]
    fn test_sync_reader_handles_whitespace() {
        let file = create_temp_csv(&[format!("  r1 , {ANN} ,  {COFFEE} ,  3  ,")]);

        let requests: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(requests.len(), 1);
        let request = requests[0].as_ref().unwrap();
        assert_eq!(request.label, "r1");
        assert_eq!(request.request.items[0].quantity, 3);
    }

    #[test]
    fn test_sync_reader_continues_after_malformed_request() {
        let file = create_temp_csv(&[
            format!("r1,{ANN},{COFFEE},1,"),
            format!("r2,{ANN},not-a-voucher,1,"),
            format!("r3,{ANN},{COFFEE},1,"),
        ]);

        let requests: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(requests.len(), 3);
        assert!(requests[0].is_ok());
        assert!(requests[2].is_ok());

        let error = requests[1].as_ref().unwrap_err();
        assert!(error.contains("Line 3"), "{error}");
        assert!(error.contains("Invalid voucher id"), "{error}");
    }

    #[test]
    fn test_sync_reader_truncated_row_rejects_whole_request() {
        let file = create_temp_csv(&[
            format!("r1,{ANN},{COFFEE},1,"),
            format!("r1,{ANN}"),
            format!("r1,{ANN},{COFFEE},2,"),
            format!("r2,{ANN},{COFFEE},1,"),
        ]);

        let requests: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(requests.len(), 2);
        let error = requests[0].as_ref().unwrap_err();
        assert!(error.contains("Request 'r1'"), "{error}");
        assert!(error.contains("Line 3"), "{error}");
        assert!(error.contains("CSV parse error"), "{error}");

        let next = requests[1].as_ref().unwrap();
        assert_eq!(next.label, "r2");
        assert_eq!(next.request.items.len(), 1);
    }

    #[test]
    fn test_sync_reader_handles_empty_file_after_header() {
        let file = create_temp_csv(&[]);

        assert_eq!(SyncReader::new(file.path()).unwrap().count(), 0);
    }
}
