use std::collections::{BTreeMap, HashMap, HashSet};

use dirstress_summary_model::{CheckSummary, OperationSummary};
use rand::Rng;

use crate::{CheckRecord, OperationRecord};

#[derive(Debug, Default)]
struct CheckTally {
    passes: u64,
    failures: u64,
    vus: HashSet<usize>,
    informational: bool,
}

/// Number of durations kept per operation for the percentile estimate.
pub(crate) const MAX_DURATION_SAMPLES: usize = 10_000;

/// Exact count, sum, maximum and error tally, plus a uniform reservoir sample of the durations so
/// that memory stays bounded on soak runs.
#[derive(Debug, Default)]
struct OperationSamples {
    count: u64,
    sum_ms: f64,
    max_ms: f64,
    errors: u64,
    reservoir: Vec<f64>,
}

impl OperationSamples {
    fn record(&mut self, duration_ms: f64, is_error: bool) {
        self.count += 1;
        self.sum_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
        if is_error {
            self.errors += 1;
        }

        if self.reservoir.len() < MAX_DURATION_SAMPLES {
            self.reservoir.push(duration_ms);
        } else {
            let slot = rand::thread_rng().gen_range(0..self.count) as usize;
            if slot < MAX_DURATION_SAMPLES {
                self.reservoir[slot] = duration_ms;
            }
        }
    }
}

/// Running totals of every check and operation reported during a run.
#[derive(Debug, Default)]
pub(crate) struct Aggregate {
    checks: HashMap<String, CheckTally>,
    operations: HashMap<String, OperationSamples>,
}

impl Aggregate {
    pub(crate) fn add_check(&mut self, check: &CheckRecord) {
        let tally = self.checks.entry(check.name.clone()).or_default();
        if check.passed {
            tally.passes += 1;
        } else {
            tally.failures += 1;
        }
        tally.vus.insert(check.vu_index);
        tally.informational |= check.informational;
    }

    pub(crate) fn add_operation(&mut self, operation: &OperationRecord) {
        let Some(elapsed) = operation.duration() else {
            log::warn!(
                "Ignoring unfinished operation record for {}",
                operation.operation_id
            );
            return;
        };

        self.operations
            .entry(operation.operation_id.clone())
            .or_default()
            .record(elapsed.as_secs_f64() * 1000.0, operation.is_error());
    }

    pub(crate) fn check_summary(&self, name: &str) -> Option<CheckSummary> {
        self.checks.get(name).map(summarize_check)
    }

    pub(crate) fn check_summaries(&self) -> BTreeMap<String, CheckSummary> {
        self.checks
            .iter()
            .map(|(name, tally)| (name.clone(), summarize_check(tally)))
            .collect()
    }

    pub(crate) fn operation_summary(&self, operation_id: &str) -> Option<OperationSummary> {
        self.operations.get(operation_id).map(summarize_operation)
    }

    pub(crate) fn operation_summaries(&self) -> BTreeMap<String, OperationSummary> {
        self.operations
            .iter()
            .map(|(id, samples)| (id.clone(), summarize_operation(samples)))
            .collect()
    }
}

fn summarize_check(tally: &CheckTally) -> CheckSummary {
    CheckSummary {
        passes: tally.passes,
        failures: tally.failures,
        distinct_vus: tally.vus.len(),
        informational: tally.informational,
    }
}

fn summarize_operation(samples: &OperationSamples) -> OperationSummary {
    let mut sorted = samples.reservoir.clone();
    sorted.sort_by(f64::total_cmp);

    let mean_ms = if samples.count == 0 {
        0.0
    } else {
        samples.sum_ms / samples.count as f64
    };

    OperationSummary {
        count: samples.count,
        errors: samples.errors,
        mean_ms,
        p95_ms: percentile(&sorted, 95.0),
        max_ms: samples.max_ms,
    }
}

/// Nearest-rank percentile of already sorted samples, `0.0` for no samples.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nearest_rank_percentile() {
        let samples = (1..=100).map(f64::from).collect::<Vec<_>>();
        assert_eq!(95.0, percentile(&samples, 95.0));
        assert_eq!(7.0, percentile(&[7.0], 95.0));
        assert_eq!(0.0, percentile(&[], 95.0));
    }

    #[test]
    fn checks_are_tallied_per_name_and_vu() {
        let mut aggregate = Aggregate::default();
        aggregate.add_check(&CheckRecord::new("bind success", true, 0));
        aggregate.add_check(&CheckRecord::new("bind success", true, 0));
        aggregate.add_check(&CheckRecord::new("bind success", false, 1));
        aggregate.add_check(&CheckRecord::new("Info: RootDSE Exposed", true, 0).informational());

        let summaries = aggregate.check_summaries();
        assert_eq!(
            CheckSummary {
                passes: 2,
                failures: 1,
                distinct_vus: 2,
                informational: false,
            },
            summaries["bind success"]
        );
        assert!(summaries["Info: RootDSE Exposed"].informational);
    }

    #[test]
    fn unfinished_operations_are_ignored() {
        let mut aggregate = Aggregate::default();
        aggregate.add_operation(&OperationRecord::new("ldap_search"));
        assert!(aggregate.operation_summary("ldap_search").is_none());

        let mut finished = OperationRecord::new("ldap_search");
        finished.finish(true);
        aggregate.add_operation(&finished);

        let summary = aggregate.operation_summary("ldap_search").unwrap();
        assert_eq!(1, summary.count);
        assert_eq!(1, summary.errors);
    }

    #[test]
    fn long_runs_keep_a_bounded_sample() {
        let mut samples = OperationSamples::default();
        for i in 0..(MAX_DURATION_SAMPLES * 3) {
            samples.record((i % 100) as f64, i % 10 == 0);
        }

        assert_eq!(MAX_DURATION_SAMPLES, samples.reservoir.len());

        let summary = summarize_operation(&samples);
        assert_eq!((MAX_DURATION_SAMPLES * 3) as u64, summary.count);
        assert_eq!((MAX_DURATION_SAMPLES * 3 / 10) as u64, summary.errors);
        assert_eq!(99.0, summary.max_ms);
        assert_eq!(49.5, summary.mean_ms);
        // Uniform durations in 0..100, so the estimate lands close to the true p95.
        assert!((85.0..=99.0).contains(&summary.p95_ms));
    }
}
