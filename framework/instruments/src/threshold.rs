use dirstress_summary_model::ThresholdOutcome;

use crate::aggregate::Aggregate;

/// A pass/fail criterion evaluated against the aggregated results of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    /// The failure ratio of a named check must stay below `max_rate`.
    CheckFailureRate {
        check: String,
        max_rate: f64,
        abort_on_fail: bool,
    },
    /// The 95th percentile duration of an operation must stay below `max_ms`.
    OperationP95 {
        operation_id: String,
        max_ms: f64,
        abort_on_fail: bool,
    },
}

impl Threshold {
    pub fn describe(&self) -> String {
        match self {
            Threshold::CheckFailureRate {
                check, max_rate, ..
            } => format!("rate({check} failures) < {max_rate}"),
            Threshold::OperationP95 {
                operation_id,
                max_ms,
                ..
            } => format!("p95({operation_id}) < {max_ms}ms"),
        }
    }

    pub fn abort_on_fail(&self) -> bool {
        match self {
            Threshold::CheckFailureRate { abort_on_fail, .. }
            | Threshold::OperationP95 { abort_on_fail, .. } => *abort_on_fail,
        }
    }

    fn limit(&self) -> f64 {
        match self {
            Threshold::CheckFailureRate { max_rate, .. } => *max_rate,
            Threshold::OperationP95 { max_ms, .. } => *max_ms,
        }
    }

    /// Returns the observed value and the number of samples it was computed from.
    fn observe(&self, aggregate: &Aggregate) -> Option<(f64, u64)> {
        match self {
            Threshold::CheckFailureRate { check, .. } => aggregate
                .check_summary(check)
                .filter(|summary| summary.total() > 0)
                .map(|summary| (summary.failure_rate(), summary.total())),
            Threshold::OperationP95 { operation_id, .. } => aggregate
                .operation_summary(operation_id)
                .filter(|summary| summary.count > 0)
                .map(|summary| (summary.p95_ms, summary.count)),
        }
    }

    pub(crate) fn evaluate(&self, aggregate: &Aggregate) -> ThresholdOutcome {
        let observed = self.observe(aggregate).map(|(value, _)| value);
        ThresholdOutcome {
            name: self.describe(),
            limit: self.limit(),
            observed,
            passed: observed.map_or(true, |value| value < self.limit()),
            abort_on_fail: self.abort_on_fail(),
        }
    }

    /// Like [Threshold::evaluate] but only reports a failure once at least `min_samples` samples
    /// have been seen, so that a handful of early failures cannot stop a run.
    pub(crate) fn breached(&self, aggregate: &Aggregate, min_samples: u64) -> bool {
        match self.observe(aggregate) {
            Some((value, samples)) => samples >= min_samples && value >= self.limit(),
            None => false,
        }
    }
}
