mod tables;

use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_table_reporter::tables::{CheckRow, OperationRow};
use crate::report::{ReportCollector, ReportSnapshot};
use crate::{CheckRecord, OperationRecord};

/// Prints a summary of checks, operations and thresholds at the end of the run. Nothing is kept
/// per record, the tables are built from the run totals.
pub struct SummaryTableReportCollector;

impl SummaryTableReportCollector {
    pub fn new() -> Self {
        Self
    }

    fn print_checks(snapshot: &ReportSnapshot) {
        if snapshot.checks.is_empty() {
            println!("\nNo checks were recorded");
            return;
        }

        println!("\nSummary of checks");
        let rows = snapshot
            .checks
            .iter()
            .map(|(name, summary)| CheckRow {
                check: name.clone(),
                passes: summary.passes,
                failures: summary.failures,
                pass_rate: 1.0 - summary.failure_rate(),
                vus: summary.distinct_vus,
                kind: if summary.informational {
                    "info"
                } else {
                    "assert"
                },
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_operations(snapshot: &ReportSnapshot) {
        if snapshot.operations.is_empty() {
            return;
        }

        println!("\nSummary of operations");
        let rows = snapshot
            .operations
            .iter()
            .map(|(operation_id, summary)| OperationRow {
                operation_id: operation_id.clone(),
                avg_time_ms: summary.mean_ms,
                p95_time_ms: summary.p95_ms,
                max_time_ms: summary.max_ms,
                total_operations: summary.count,
                errors: summary.errors,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_thresholds(snapshot: &ReportSnapshot) {
        if snapshot.thresholds.is_empty() {
            return;
        }

        println!("\nThresholds");
        for outcome in &snapshot.thresholds {
            let observed = outcome
                .observed
                .map(|value| format!("{value:.3}"))
                .unwrap_or_else(|| "no samples".to_string());
            let mark = if outcome.passed { "✓" } else { "✗" };
            println!("  {mark} {} (observed: {observed})", outcome.name);
        }
    }
}

impl Default for SummaryTableReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCollector for SummaryTableReportCollector {
    fn add_operation(&mut self, _operation_record: &OperationRecord) {
        // Totals are kept by the reporter
    }

    fn add_check(&mut self, _check: &CheckRecord) {}

    fn finalize(&mut self, snapshot: &ReportSnapshot) {
        Self::print_checks(snapshot);
        Self::print_operations(snapshot);
        Self::print_thresholds(snapshot);
    }
}
