mod json_lines_reporter;
mod summary_table_reporter;

use std::collections::BTreeMap;
use std::path::PathBuf;

use dirstress_summary_model::{CheckSummary, OperationSummary, ThresholdOutcome};
use parking_lot::Mutex;
use tokio::runtime::Runtime;

use crate::aggregate::Aggregate;
use crate::threshold::Threshold;
use crate::{CheckRecord, OperationRecord};

pub use json_lines_reporter::JsonLinesReportCollector;
pub use summary_table_reporter::SummaryTableReportCollector;

/// Aggregated view of a run handed to collectors when the run finishes.
#[derive(Debug, Clone, Default)]
pub struct ReportSnapshot {
    pub checks: BTreeMap<String, CheckSummary>,
    pub operations: BTreeMap<String, OperationSummary>,
    pub thresholds: Vec<ThresholdOutcome>,
}

pub trait ReportCollector: Send {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_check(&mut self, check: &CheckRecord);

    fn finalize(&mut self, snapshot: &ReportSnapshot);
}

/// Discards everything. Useful when only the run summary is of interest.
pub struct NoopReportCollector;

impl ReportCollector for NoopReportCollector {
    fn add_operation(&mut self, _operation_record: &OperationRecord) {}

    fn add_check(&mut self, _check: &CheckRecord) {}

    fn finalize(&mut self, _snapshot: &ReportSnapshot) {}
}

/// Shared sink for every check and operation recorded by the VUs of a run.
///
/// All VUs report into the same [Reporter] concurrently. It keeps running totals that thresholds
/// and the run summary are computed from, and forwards each record to the configured collectors.
pub struct Reporter {
    aggregate: Mutex<Aggregate>,
    collectors: Mutex<Vec<Box<dyn ReportCollector>>>,
    thresholds: Vec<Threshold>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl Reporter {
    pub fn new(collectors: Vec<Box<dyn ReportCollector>>, thresholds: Vec<Threshold>) -> Self {
        Self {
            aggregate: Mutex::new(Aggregate::default()),
            collectors: Mutex::new(collectors),
            thresholds,
        }
    }

    pub fn add_operation(&self, operation_record: &OperationRecord) {
        self.aggregate.lock().add_operation(operation_record);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_operation(operation_record);
        }
    }

    pub fn add_check(&self, check: CheckRecord) {
        self.aggregate.lock().add_check(&check);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_check(&check);
        }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn evaluate_thresholds(&self) -> Vec<ThresholdOutcome> {
        let aggregate = self.aggregate.lock();
        self.thresholds
            .iter()
            .map(|threshold| threshold.evaluate(&aggregate))
            .collect()
    }

    /// The first aborting threshold that is currently failing with enough samples, if any.
    pub fn aborting_breach(&self, min_samples: u64) -> Option<ThresholdOutcome> {
        let aggregate = self.aggregate.lock();
        self.thresholds
            .iter()
            .filter(|threshold| threshold.abort_on_fail())
            .find(|threshold| threshold.breached(&aggregate, min_samples))
            .map(|threshold| threshold.evaluate(&aggregate))
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        let thresholds = self.evaluate_thresholds();
        let aggregate = self.aggregate.lock();
        ReportSnapshot {
            checks: aggregate.check_summaries(),
            operations: aggregate.operation_summaries(),
            thresholds,
        }
    }

    /// Let every collector flush and print its output. Call once, after all VUs have stopped.
    pub fn finalize(&self) -> ReportSnapshot {
        let snapshot = self.snapshot();
        for collector in self.collectors.lock().iter_mut() {
            collector.finalize(&snapshot);
        }
        snapshot
    }
}

/// Builder for the [Reporter] used by a run.
#[derive(Debug, Default)]
pub struct ReportConfig {
    scenario_name: String,
    run_id: String,
    summary_table: bool,
    json_lines_dir: Option<PathBuf>,
    thresholds: Vec<Threshold>,
}

impl ReportConfig {
    pub fn new(scenario_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    /// Print a table of checks and operations to stdout when the run finishes.
    pub fn enable_summary_table(mut self) -> Self {
        self.summary_table = true;
        self
    }

    /// Stream every record as a JSON line into a new file in `dir`.
    pub fn enable_json_lines(mut self, dir: PathBuf) -> Self {
        self.json_lines_dir = Some(dir);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn init(self, runtime: &Runtime) -> anyhow::Result<Reporter> {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();

        if self.summary_table {
            collectors.push(Box::new(SummaryTableReportCollector::new()));
        }

        if let Some(dir) = self.json_lines_dir {
            collectors.push(Box::new(JsonLinesReportCollector::new(
                runtime,
                dir,
                &self.scenario_name,
                &self.run_id,
            )?));
        }

        if collectors.is_empty() {
            collectors.push(Box::new(NoopReportCollector));
        }

        Ok(Reporter::new(collectors, self.thresholds))
    }
}
