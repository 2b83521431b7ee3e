use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dirstress_runner::parse_vu_behaviour;
use dirstress_runner::prelude::{DirstressScenarioCli, ReporterOpt};

use crate::config::{
    default_thresholds, normalize_target, Mode, Pacing, RunConfig, Timeouts,
    DEFAULT_HEAVY_BATCH_SIZE,
};
use crate::credentials::CredentialSource;
use crate::error::ConfigError;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct LdapScenarioCli {
    /// The directory server to test. A host name, `host:port`, or an `ldap://` or `ldaps://` URL.
    ///
    /// A bare host name uses plain LDAP on port 389.
    #[clap(long)]
    pub target: String,

    /// The number of VUs to run.
    ///
    /// Defaults to 1.
    #[clap(long)]
    pub vus: Option<usize>,

    /// The number of seconds to run the scenario for.
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped.
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Assign a behaviour to a number of VUs in the format `behaviour:count`, for example
    /// `--behaviour=heavy:5`. The load scenario offers `light` and `heavy`. VUs that are not
    /// assigned a behaviour run `light`.
    #[clap(long, short, value_parser = parse_vu_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The identity to bind with when every VU uses the same credential. Defaults to `guest`.
    #[clap(long)]
    pub identity: Option<String>,

    /// The secret to bind with when every VU uses the same credential. Defaults to `guest`.
    #[clap(long)]
    pub secret: Option<String>,

    /// A file with one `identity,secret` pair per line. VU `i` binds with line `i mod n`.
    #[clap(long, conflicts_with_all = ["identity", "secret"])]
    pub credentials_file: Option<PathBuf>,

    /// Search under this DN instead of discovering the scope.
    #[clap(long)]
    pub base_dn: Option<String>,

    /// Stop the run when more than this fraction of binds fail.
    #[clap(long, default_value_t = 0.10)]
    pub max_bind_failure_rate: f64,

    /// Fail the run when the 95th percentile search latency is above this many milliseconds.
    #[clap(long, default_value_t = 5000.0)]
    pub max_search_p95_ms: f64,

    /// Upper bound of the random delay before each VU's first iteration.
    #[clap(long, default_value_t = 2000)]
    pub start_jitter_ms: u64,

    /// Sleep after a failed dial.
    #[clap(long, default_value_t = 1000)]
    pub dial_cooldown_ms: u64,

    /// Sleep after a failed bind.
    #[clap(long, default_value_t = 2000)]
    pub bind_cooldown_ms: u64,

    #[clap(long, default_value_t = 100)]
    pub light_pause_min_ms: u64,

    #[clap(long, default_value_t = 600)]
    pub light_pause_max_ms: u64,

    #[clap(long, default_value_t = 100)]
    pub heavy_pause_ms: u64,

    /// Number of subtree searches per heavy iteration.
    #[clap(long, default_value_t = DEFAULT_HEAVY_BATCH_SIZE)]
    pub heavy_batch_size: usize,

    #[clap(long, default_value_t = 5000)]
    pub dial_timeout_ms: u64,

    #[clap(long, default_value_t = 5000)]
    pub bind_timeout_ms: u64,

    #[clap(long, default_value_t = 15000)]
    pub search_timeout_ms: u64,

    /// Do not show a progress bar on the CLI.
    ///
    /// A "Test in progress" line is logged periodically instead.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Directory that the `json-lines` reporter writes into.
    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,

    /// Append the summary of this run, as one JSON line, to this file.
    #[arg(long)]
    pub summary_file: Option<PathBuf>,
}

impl LdapScenarioCli {
    /// Validate the arguments and split them into the runner settings and the LDAP run
    /// configuration.
    pub fn into_parts(self, mode: Mode) -> Result<(DirstressScenarioCli, RunConfig), ConfigError> {
        let credentials = match self.credentials_file {
            Some(_) if self.identity.is_some() || self.secret.is_some() => {
                return Err(ConfigError::ConflictingCredentials);
            }
            Some(path) => CredentialSource::from_file(&path)?,
            None => CredentialSource::single(self.identity, self.secret),
        };

        if !(self.max_bind_failure_rate > 0.0 && self.max_bind_failure_rate <= 1.0) {
            return Err(ConfigError::InvalidThreshold(format!(
                "the bind failure rate must be in (0, 1], got {}",
                self.max_bind_failure_rate
            )));
        }
        if self.max_search_p95_ms <= 0.0 {
            return Err(ConfigError::InvalidThreshold(format!(
                "the search p95 must be positive, got {}",
                self.max_search_p95_ms
            )));
        }

        let config = RunConfig {
            target: normalize_target(&self.target)?,
            vus: self.vus.unwrap_or(1),
            duration: self.duration,
            mode,
            credentials,
            base_dn_override: self.base_dn,
            thresholds: match mode {
                Mode::Load => default_thresholds(self.max_bind_failure_rate, self.max_search_p95_ms),
                Mode::Audit => Vec::new(),
            },
            pacing: Pacing {
                start_jitter: Duration::from_millis(self.start_jitter_ms),
                dial_cooldown: Duration::from_millis(self.dial_cooldown_ms),
                bind_cooldown: Duration::from_millis(self.bind_cooldown_ms),
                light_pause_min: Duration::from_millis(self.light_pause_min_ms),
                light_pause_max: Duration::from_millis(self.light_pause_max_ms),
                heavy_pause: Duration::from_millis(self.heavy_pause_ms),
            },
            timeouts: Timeouts {
                dial: Duration::from_millis(self.dial_timeout_ms),
                bind: Duration::from_millis(self.bind_timeout_ms),
                search: Duration::from_millis(self.search_timeout_ms),
                ..Timeouts::default()
            },
            heavy_batch_size: self.heavy_batch_size,
        };
        config.validate()?;

        let runner_cli = DirstressScenarioCli {
            connection_string: Some(config.target.clone()),
            vus: Some(config.vus),
            behaviour: self.behaviour,
            duration: config.duration,
            soak: self.soak,
            no_progress: self.no_progress,
            reporter: self.reporter,
            report_dir: self.report_dir,
            run_id: self.run_id,
            summary_file: self.summary_file,
        };

        Ok((runner_cli, config))
    }
}
