mod aggregate;
mod check;
mod report;
mod threshold;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

pub use check::CheckRecord;
pub use report::{
    JsonLinesReportCollector, NoopReportCollector, ReportCollector, ReportConfig, ReportSnapshot,
    Reporter, SummaryTableReportCollector,
};
pub use threshold::Threshold;

/// A timing sample for one operation, such as an LDAP bind or a whole VU iteration.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    pub vu_id: Option<String>,
    pub timestamp: SystemTime,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            vu_id: None,
            timestamp: SystemTime::now(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    pub fn with_vu_id(mut self, vu_id: impl Into<String>) -> Self {
        self.vu_id = Some(vu_id.into());
        self
    }

    /// Time between creating the record and finishing it. Not set until the record is reported.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub(crate) fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Finish the operation record and hand it to the reporter. The operation counts as an error when
/// the response is an `Err`.
pub fn report_operation<T, E>(
    reporter: Arc<Reporter>,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response.is_err());
    reporter.add_operation(&operation_record);
}
