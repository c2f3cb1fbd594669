//! Asynchronous request reader with batch interface
//!
//! Provides batched reading of redemption requests from a CSV stream for the
//! concurrent processing strategy.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - the csv_format module for row conversion and grouping
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LabeledRequests
//!                  ↓
//!           csv_format module
//!           (RequestRow, RequestGrouper)
//! ```
//!
//! The grouper lives as long as the reader, so a request whose rows straddle
//! a batch boundary is still emitted whole, in the batch where it closes.
//! Records that fail to deserialize are passed to the grouper by label and
//! reject their request.

use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::io::AsyncRead;
use tracing::warn;

use crate::io::csv_format::{LabeledRequest, RequestGrouper, RequestRow};

/// Asynchronous CSV request reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncReader<R>,
    headers: Option<StringRecord>,
    grouper: RequestGrouper,
    line_num: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_reader(reader);

        Self {
            csv_reader,
            headers: None,
            grouper: RequestGrouper::new(),
            line_num: 0,
            finished: false,
        }
    }

    /// Read a batch of redemption requests
    ///
    /// Reads rows until `batch_size` complete requests are available or the
    /// stream ends. Malformed requests, including any with a row that does
    /// not parse, are logged and skipped.
    ///
    /// # Returns
    ///
    /// Up to `batch_size` requests in input order. An empty vector means the
    /// end of the stream was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LabeledRequest> {
        let mut batch = Vec::with_capacity(batch_size);
        if self.finished {
            return batch;
        }

        if self.headers.is_none() {
            match self.csv_reader.headers().await {
                Ok(headers) => self.headers = Some(headers.clone()),
                Err(e) => {
                    warn!(error = %e, "failed to read request header");
                    self.finished = true;
                    return batch;
                }
            }
        }

        let mut record = StringRecord::new();

        while batch.len() < batch_size {
            let closed = match self.csv_reader.read_record(&mut record).await {
                Ok(true) => {
                    self.line_num += 1;
                    let line = self.line_num + 1;
                    match record.deserialize::<RequestRow>(self.headers.as_ref()) {
                        Ok(row) => self.grouper.push(line, row),
                        Err(e) => self.grouper.reject(
                            line,
                            record.get(0),
                            &format!("CSV parse error: {}", e),
                        ),
                    }
                }
                Err(e) => {
                    self.line_num += 1;
                    self.grouper.reject(
                        self.line_num + 1,
                        None,
                        &format!("CSV parse error: {}", e),
                    )
                }
                Ok(false) => {
                    self.finished = true;
                    let last = self.grouper.finish();
                    if let Some(request) = last.and_then(keep_valid) {
                        batch.push(request);
                    }
                    break;
                }
            };

            if let Some(request) = closed.and_then(keep_valid) {
                batch.push(request);
            }
        }

        batch
    }
}

fn keep_valid(request: Result<LabeledRequest, String>) -> Option<LabeledRequest> {
    match request {
        Ok(request) => Some(request),
        Err(e) => {
            warn!(error = %e, "skipping malformed request");
            None
        }
    }
}
