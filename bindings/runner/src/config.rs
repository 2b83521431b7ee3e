use std::time::Duration;

use dirstress_runner::prelude::Threshold;
use rand::Rng;

use crate::checks::{BIND_SUCCESS, SEARCH_OPERATION};
use crate::credentials::CredentialSource;
use crate::error::ConfigError;

pub const DEFAULT_LDAP_PORT: u16 = 389;
pub const DEFAULT_HEAVY_BATCH_SIZE: usize = 20;
pub const DEFAULT_MAX_BIND_FAILURE_RATE: f64 = 0.10;
pub const DEFAULT_MAX_SEARCH_P95_MS: f64 = 5000.0;

/// What the VUs of a run do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Repeatedly dial, bind and search.
    Load,
    /// Run the security probes once per VU.
    Audit,
}

/// Sleeps between and around iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    /// Upper bound of the random delay before a VU's first iteration.
    pub start_jitter: Duration,
    /// Sleep after a failed dial.
    pub dial_cooldown: Duration,
    /// Sleep after a failed bind, instead of the steady state pause.
    pub bind_cooldown: Duration,
    pub light_pause_min: Duration,
    pub light_pause_max: Duration,
    pub heavy_pause: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            start_jitter: Duration::from_secs(2),
            dial_cooldown: Duration::from_secs(1),
            bind_cooldown: Duration::from_secs(2),
            light_pause_min: Duration::from_millis(100),
            light_pause_max: Duration::from_millis(600),
            heavy_pause: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    /// No sleeps at all. Useful for tests.
    pub fn none() -> Self {
        Self {
            start_jitter: Duration::ZERO,
            dial_cooldown: Duration::ZERO,
            bind_cooldown: Duration::ZERO,
            light_pause_min: Duration::ZERO,
            light_pause_max: Duration::ZERO,
            heavy_pause: Duration::ZERO,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.light_pause_min > self.light_pause_max {
            return Err(ConfigError::InvalidPacing(format!(
                "light pause minimum {:?} is greater than the maximum {:?}",
                self.light_pause_min, self.light_pause_max
            )));
        }

        Ok(())
    }

    /// Random delay in `[0, start_jitter)`.
    pub fn start_jitter_sample(&self) -> Duration {
        random_between(Duration::ZERO, self.start_jitter)
    }

    /// Random pause in `[light_pause_min, light_pause_max)`.
    pub fn light_pause_sample(&self) -> Duration {
        random_between(self.light_pause_min, self.light_pause_max)
    }
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }

    rand::thread_rng().gen_range(min..max)
}

/// Upper bounds for each protocol phase. A phase that runs over counts as failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    pub dial: Duration,
    pub bind: Duration,
    pub search: Duration,
    pub close: Duration,
}

impl Timeouts {
    fn validate(&self) -> Result<(), ConfigError> {
        for (phase, timeout) in [
            ("dial", self.dial),
            ("bind", self.bind),
            ("search", self.search),
            ("close", self.close),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(phase));
            }
        }

        Ok(())
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(5),
            bind: Duration::from_secs(5),
            search: Duration::from_secs(15),
            close: Duration::from_secs(2),
        }
    }
}

/// Everything a run needs to know about the target and the VU workload.
///
/// Created once before the run starts and shared read-only between the VUs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Normalised `ldap://` or `ldaps://` URL.
    pub target: String,
    pub vus: usize,
    /// Requested duration in seconds. The scenario default applies when not set.
    pub duration: Option<u64>,
    pub mode: Mode,
    pub credentials: CredentialSource,
    pub base_dn_override: Option<String>,
    pub thresholds: Vec<Threshold>,
    pub pacing: Pacing,
    pub timeouts: Timeouts,
    pub heavy_batch_size: usize,
}

impl RunConfig {
    /// A configuration with default settings for the given target, one VU and the guest
    /// credential.
    pub fn new(target: &str, mode: Mode) -> Result<Self, ConfigError> {
        Ok(Self {
            target: normalize_target(target)?,
            vus: 1,
            duration: None,
            mode,
            credentials: CredentialSource::single(None, None),
            base_dn_override: None,
            thresholds: match mode {
                Mode::Load => {
                    default_thresholds(DEFAULT_MAX_BIND_FAILURE_RATE, DEFAULT_MAX_SEARCH_P95_MS)
                }
                Mode::Audit => Vec::new(),
            },
            pacing: Pacing::default(),
            timeouts: Timeouts::default(),
            heavy_batch_size: DEFAULT_HEAVY_BATCH_SIZE,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vus == 0 {
            return Err(ConfigError::InvalidVuCount);
        }
        if self.duration == Some(0) {
            return Err(ConfigError::InvalidDuration);
        }
        if self.credentials.is_empty() {
            return Err(ConfigError::EmptyCredentialPool);
        }
        if self.heavy_batch_size == 0 {
            return Err(ConfigError::InvalidPacing(
                "the heavy batch size must be at least 1".to_string(),
            ));
        }

        self.timeouts.validate()?;
        self.pacing.validate()
    }

    /// The override, if one was given and is not blank.
    pub fn base_dn_override(&self) -> Option<&str> {
        self.base_dn_override
            .as_deref()
            .map(str::trim)
            .filter(|dn| !dn.is_empty())
    }
}

/// Bind failure rate below `max_bind_failure_rate`, stopping the run early when crossed, and p95
/// search latency below `max_search_p95_ms`.
pub fn default_thresholds(max_bind_failure_rate: f64, max_search_p95_ms: f64) -> Vec<Threshold> {
    vec![
        Threshold::CheckFailureRate {
            check: BIND_SUCCESS.to_string(),
            max_rate: max_bind_failure_rate,
            abort_on_fail: true,
        },
        Threshold::OperationP95 {
            operation_id: SEARCH_OPERATION.to_string(),
            max_ms: max_search_p95_ms,
            abort_on_fail: false,
        },
    ]
}

/// Turn a host, `host:port` or URL into an `ldap://` or `ldaps://` URL. Bare hosts get the
/// default port 389.
pub fn normalize_target(target: &str) -> Result<String, ConfigError> {
    let target = target.trim();
    let invalid = |reason: &str| ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    if target.is_empty() {
        return Err(invalid("the target is empty"));
    }

    let with_scheme = if target.contains("://") {
        target.to_string()
    } else {
        format!("ldap://{target}")
    };

    let mut url = url::Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "ldap" | "ldaps" => {}
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("no host given"));
    }

    if !target.contains("://") && url.port().is_none() {
        url.set_port(Some(DEFAULT_LDAP_PORT))
            .map_err(|_| invalid("cannot set the default port"))?;
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_host_gets_scheme_and_port() {
        assert_eq!("ldap://dc01:389", normalize_target("dc01").unwrap());
        assert_eq!("ldap://dc01:3268", normalize_target(" dc01:3268 ").unwrap());
        assert_eq!(
            "ldaps://dc01.corp.local",
            normalize_target("ldaps://dc01.corp.local").unwrap()
        );
    }

    #[test]
    fn invalid_targets_are_rejected() {
        assert!(normalize_target("").is_err());
        assert!(normalize_target("http://dc01").is_err());
        assert!(normalize_target("ldap://").is_err());
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = RunConfig::new("dc01", Mode::Load).unwrap();
        config.base_dn_override = Some("   ".to_string());
        assert_eq!(None, config.base_dn_override());

        config.base_dn_override = Some(" OU=Staff,DC=corp,DC=local ".to_string());
        assert_eq!(Some("OU=Staff,DC=corp,DC=local"), config.base_dn_override());
    }

    #[test]
    fn validation() {
        let mut config = RunConfig::new("dc01", Mode::Load).unwrap();
        assert!(config.validate().is_ok());

        config.vus = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidVuCount)));

        config.vus = 1;
        config.pacing.light_pause_min = Duration::from_secs(2);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPacing(_))));
    }

    #[test]
    fn samples_stay_in_range() {
        let pacing = Pacing::default();
        for _ in 0..100 {
            assert!(pacing.start_jitter_sample() < pacing.start_jitter);
            let pause = pacing.light_pause_sample();
            assert!(pause >= pacing.light_pause_min && pause < pacing.light_pause_max);
        }

        assert_eq!(Duration::ZERO, Pacing::none().light_pause_sample());
    }

    #[test]
    fn audit_mode_has_no_thresholds() {
        assert!(RunConfig::new("dc01", Mode::Audit)
            .unwrap()
            .thresholds
            .is_empty());
        assert_eq!(2, RunConfig::new("dc01", Mode::Load).unwrap().thresholds.len());
    }
}
