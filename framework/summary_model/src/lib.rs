use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::path::Path;

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The duration that the run was configured with, in seconds
    ///
    /// If the run was configured for soak testing, then this will not be set.
    pub run_duration: Option<u64>,
    /// How long the run actually took, in seconds
    ///
    /// Shorter than [RunSummary::run_duration] when the run was stopped early, either by the user,
    /// by an aborting threshold or because every VU finished its iterations.
    pub actual_duration: u64,
    /// The number of VUs configured
    pub vu_count: usize,
    /// The number of VUs that were still running their behaviour when the run ended
    ///
    /// VUs that bail out early are not counted.
    pub vu_end_count: usize,
    /// The behaviour configuration
    ///
    /// This is the number of VUs that were assigned to each behaviour.
    pub assigned_behaviours: HashMap<String, usize>,
    /// Pass/fail tallies per check name
    pub checks: BTreeMap<String, CheckSummary>,
    /// Timing summaries per operation id
    pub operations: BTreeMap<String, OperationSummary>,
    /// Outcome of each configured threshold
    pub thresholds: Vec<ThresholdOutcome>,
    /// Set when an aborting threshold stopped the run before its planned end
    pub aborted_by_threshold: bool,
    /// Environment values recorded for the run
    ///
    /// Only the values the runner or scenario explicitly chose to include.
    pub env: HashMap<String, String>,
    /// The version of dirstress that was used for this run
    pub dirstress_version: String,
    /// Identifies the configuration of the run, see [RunSummary::compute_fingerprint]
    ///
    /// Set by the runner once the summary is complete.
    #[serde(default)]
    pub fingerprint: String,
}

/// Tally of one named check across all VUs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckSummary {
    pub passes: u64,
    pub failures: u64,
    /// Number of distinct VU ordinals that reported this check
    pub distinct_vus: usize,
    /// Informational checks are reported for awareness and never count as failures
    pub informational: bool,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.failures
    }

    /// Ratio of failed samples, `0.0` when there are no samples.
    pub fn failure_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.failures as f64 / total as f64,
        }
    }
}

/// Timing summary for one operation id, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationSummary {
    pub count: u64,
    pub errors: u64,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// Result of evaluating one threshold at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOutcome {
    /// Human readable description, for example `rate(bind success failures) < 0.1`
    pub name: String,
    pub limit: f64,
    /// The observed value, not set when there were no samples to evaluate
    pub observed: Option<f64>,
    pub passed: bool,
    pub abort_on_fail: bool,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration: Option<u64>,
        vu_count: usize,
        assigned_behaviours: HashMap<String, usize>,
        dirstress_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration,
            actual_duration: 0,
            vu_count,
            vu_end_count: 0,
            assigned_behaviours,
            checks: BTreeMap::new(),
            operations: BTreeMap::new(),
            thresholds: Vec::new(),
            aborted_by_threshold: false,
            env: HashMap::with_capacity(0),
            dirstress_version,
            fingerprint: String::new(),
        }
    }

    /// Set the VU end count
    pub fn set_vu_end_count(&mut self, vu_end_count: usize) {
        self.vu_end_count = vu_end_count;
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// True when no threshold failed
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify the configuration used to run the scenario so that
    /// comparable runs can be grouped. It uses the
    ///     - Scenario name
    ///     - Run duration
    ///     - VU count
    ///     - Assigned behaviours
    ///     - Selected environment variables
    ///     - dirstress version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn compute_fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        if let Some(run_duration) = self.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        Digest::update(&mut hasher, (self.vu_count as u64).to_le_bytes());
        self.assigned_behaviours
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, (*v as u64).to_le_bytes());
            });
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.dirstress_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
