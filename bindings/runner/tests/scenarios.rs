use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ldap_dirstress_runner::prelude::*;
use parking_lot::Mutex;

const NAMING_CONTEXT: &str = "DC=corp,DC=local";

/// In-memory directory that records what the VUs asked of it.
#[derive(Debug, Default)]
struct FakeDirectory {
    refuse_connections: bool,
    reject_binds: bool,
    drop_binds: bool,
    anonymous_bind: bool,
    root_dse_readable: bool,
    binds: Mutex<Vec<String>>,
    search_bases: Mutex<Vec<String>>,
    open_sessions: Mutex<usize>,
}

impl FakeDirectory {
    fn binds_by_identity(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for identity in self.binds.lock().iter() {
            *counts.entry(identity.clone()).or_default() += 1;
        }
        counts
    }

    fn searches_under(&self, base: &str) -> usize {
        self.search_bases
            .lock()
            .iter()
            .filter(|searched| searched.as_str() == base)
            .count()
    }
}

#[derive(Debug)]
struct FakeConnector(Arc<FakeDirectory>);

#[async_trait]
impl DirectoryConnector for FakeConnector {
    async fn open(&self, target: &str) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        if self.0.refuse_connections {
            return Err(DirectoryError::Connection {
                target: target.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        *self.0.open_sessions.lock() += 1;
        Ok(Box::new(FakeSession(self.0.clone())))
    }
}

struct FakeSession(Arc<FakeDirectory>);

#[async_trait]
impl DirectorySession for FakeSession {
    async fn bind(&mut self, identity: &str, _secret: &str) -> Result<(), DirectoryError> {
        self.0.binds.lock().push(identity.to_string());

        if self.0.drop_binds {
            return Err(DirectoryError::Connection {
                target: "dc01.corp.local".to_string(),
                reason: "connection reset".to_string(),
            });
        }

        let accepted = if identity.is_empty() {
            self.0.anonymous_bind
        } else {
            !self.0.reject_binds
        };
        if accepted {
            Ok(())
        } else {
            Err(DirectoryError::Auth("invalid credentials".to_string()))
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.0.search_bases.lock().push(request.base.clone());

        if !request.base.is_empty() {
            return Ok(vec![DirectoryEntry::default()]);
        }

        if !self.0.root_dse_readable {
            return Err(DirectoryError::Query {
                base: String::new(),
                reason: "insufficient access".to_string(),
            });
        }

        Ok(vec![DirectoryEntry {
            dn: String::new(),
            attributes: HashMap::from([(
                "defaultNamingContext".to_string(),
                vec![NAMING_CONTEXT.to_string()],
            )]),
        }])
    }

    async fn close(&mut self) -> Result<(), DirectoryError> {
        *self.0.open_sessions.lock() -= 1;
        Ok(())
    }
}

fn sample_cli_cfg() -> DirstressScenarioCli {
    DirstressScenarioCli {
        connection_string: None,
        vus: None,
        behaviour: vec![],
        duration: None,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        report_dir: PathBuf::from("reports"),
        run_id: None,
        summary_file: None,
    }
}

fn sample_config(mode: Mode, vus: usize) -> RunConfig {
    let mut config = RunConfig::new("dc01.corp.local", mode).unwrap();
    config.vus = vus;
    config.pacing = Pacing::none();
    config.timeouts = Timeouts {
        dial: Duration::from_secs(2),
        bind: Duration::from_secs(2),
        search: Duration::from_secs(2),
        close: Duration::from_secs(1),
    };
    config
}

fn run_against(
    name: &str,
    cli: DirstressScenarioCli,
    config: RunConfig,
    directory: &Arc<FakeDirectory>,
    iterations_per_vu: Option<u64>,
) -> RunSummary {
    let mut scenario = LdapScenarioDefinitionBuilder::from_config(name, cli, config)
        .unwrap()
        .with_connector(Arc::new(FakeConnector(directory.clone())))
        .into_std()
        .with_default_duration_s(30);
    if iterations_per_vu.is_some() {
        scenario = scenario.with_iterations_per_vu(iterations_per_vu);
    }

    run(scenario).unwrap()
}

#[test]
fn every_vu_binds_with_the_shared_credential() {
    let directory = Arc::new(FakeDirectory {
        root_dse_readable: true,
        ..Default::default()
    });

    let summary = run_against(
        "every_vu_binds_with_the_shared_credential",
        sample_cli_cfg(),
        sample_config(Mode::Load, 10),
        &directory,
        Some(1),
    );

    let bind = &summary.checks[BIND_SUCCESS];
    assert_eq!(10, bind.passes);
    assert_eq!(0, bind.failures);
    assert_eq!(10, bind.distinct_vus);
    assert_eq!(10, summary.operations[ITERATION_OPERATION].count);
    assert_eq!(0, summary.operations[ITERATION_OPERATION].errors);
    assert_eq!(
        HashMap::from([(DEFAULT_IDENTITY.to_string(), 10)]),
        directory.binds_by_identity()
    );

    // Scope discovered from the root DSE and used for the light search.
    assert_eq!(10, directory.searches_under(NAMING_CONTEXT));
    assert_eq!(0, *directory.open_sessions.lock());
    assert!(summary.thresholds_passed());
}

#[test]
fn pool_credentials_are_spread_round_robin() {
    let directory = Arc::new(FakeDirectory::default());

    let mut config = sample_config(Mode::Load, 9);
    config.credentials = CredentialSource::pool(vec![
        Credential::new("svc-a", "one"),
        Credential::new("svc-b", "two"),
        Credential::new("svc-c", "three"),
    ])
    .unwrap();

    run_against(
        "pool_credentials_are_spread_round_robin",
        sample_cli_cfg(),
        config,
        &directory,
        Some(1),
    );

    assert_eq!(
        HashMap::from([
            ("svc-a".to_string(), 3),
            ("svc-b".to_string(), 3),
            ("svc-c".to_string(), 3),
        ]),
        directory.binds_by_identity()
    );

    // Root DSE is not readable, so every VU falls back to the default scope.
    assert_eq!(9, directory.searches_under(FALLBACK_BASE_DN));
}

#[test]
fn scope_override_skips_discovery() {
    let directory = Arc::new(FakeDirectory {
        root_dse_readable: true,
        ..Default::default()
    });

    let mut config = sample_config(Mode::Load, 2);
    config.base_dn_override = Some("OU=Staff,DC=corp,DC=local".to_string());

    run_against(
        "scope_override_skips_discovery",
        sample_cli_cfg(),
        config,
        &directory,
        Some(2),
    );

    assert_eq!(0, directory.searches_under(""));
    assert_eq!(4, directory.searches_under("OU=Staff,DC=corp,DC=local"));
}

#[test]
fn heavy_vus_search_in_batches() {
    let directory = Arc::new(FakeDirectory {
        root_dse_readable: true,
        ..Default::default()
    });

    let mut cli = sample_cli_cfg();
    cli.behaviour = vec![(HEAVY_BEHAVIOUR.to_string(), 1)];
    let mut config = sample_config(Mode::Load, 2);
    config.heavy_batch_size = 5;

    let summary = run_against(
        "heavy_vus_search_in_batches",
        cli,
        config,
        &directory,
        Some(1),
    );

    // One light search plus a batch of five.
    assert_eq!(6, directory.searches_under(NAMING_CONTEXT));
    assert_eq!(
        Some(&1),
        summary.assigned_behaviours.get(HEAVY_BEHAVIOUR)
    );
}

#[test]
fn connection_failures_are_contained() {
    let directory = Arc::new(FakeDirectory {
        refuse_connections: true,
        ..Default::default()
    });

    let summary = run_against(
        "connection_failures_are_contained",
        sample_cli_cfg(),
        sample_config(Mode::Load, 3),
        &directory,
        Some(2),
    );

    assert_eq!(3, summary.vu_end_count);
    assert!(!summary.checks.contains_key(BIND_SUCCESS));
    assert_eq!(6, summary.operations[ITERATION_OPERATION].errors);
    assert!(directory.binds.lock().is_empty());
}

#[test]
fn rejected_binds_stop_the_run() {
    let directory = Arc::new(FakeDirectory {
        reject_binds: true,
        ..Default::default()
    });

    let summary = run_against(
        "rejected_binds_stop_the_run",
        sample_cli_cfg(),
        sample_config(Mode::Load, 2),
        &directory,
        None,
    );

    assert!(summary.aborted_by_threshold);
    assert!(!summary.thresholds_passed());
    assert_eq!(0, summary.checks[BIND_SUCCESS].passes);
    assert!(summary.actual_duration < 30);

    // Failed binds skip the workload.
    assert!(directory.search_bases.lock().is_empty());
}

#[test]
fn audit_reports_exactly_the_two_findings() {
    let directory = Arc::new(FakeDirectory {
        anonymous_bind: true,
        root_dse_readable: true,
        ..Default::default()
    });

    let summary = run_against(
        "audit_reports_exactly_the_two_findings",
        sample_cli_cfg(),
        sample_config(Mode::Audit, 1),
        &directory,
        None,
    );

    assert_eq!(2, summary.checks.len());

    let anonymous = &summary.checks[ANONYMOUS_BIND_ALERT];
    assert_eq!(0, anonymous.passes);
    assert_eq!(1, anonymous.failures);
    assert!(!anonymous.informational);

    let root_dse = &summary.checks[ROOT_DSE_EXPOSED];
    assert_eq!(1, root_dse.passes);
    assert!(root_dse.informational);

    // No workload in audit mode.
    assert!(summary.operations.is_empty());
    assert_eq!(vec![String::new()], *directory.search_bases.lock());
    assert_eq!(0, *directory.open_sessions.lock());
}

#[test]
fn hardened_directory_passes_the_audit() {
    let directory = Arc::new(FakeDirectory::default());

    let summary = run_against(
        "hardened_directory_passes_the_audit",
        sample_cli_cfg(),
        sample_config(Mode::Audit, 1),
        &directory,
        None,
    );

    assert_eq!(1, summary.checks.len());
    assert_eq!(1, summary.checks[ANONYMOUS_BIND_ALERT].passes);
    assert!(!summary.checks.contains_key(ROOT_DSE_EXPOSED));
}

#[test]
fn scope_is_discovered_once_per_vu() {
    let directory = Arc::new(FakeDirectory {
        root_dse_readable: true,
        ..Default::default()
    });

    run_against(
        "scope_is_discovered_once_per_vu",
        sample_cli_cfg(),
        sample_config(Mode::Load, 2),
        &directory,
        Some(3),
    );

    assert_eq!(2, directory.searches_under(""));
    assert_eq!(6, directory.searches_under(NAMING_CONTEXT));
}

#[test]
fn dial_failures_wait_for_the_cooldown() {
    let directory = Arc::new(FakeDirectory {
        refuse_connections: true,
        ..Default::default()
    });

    let mut config = sample_config(Mode::Load, 1);
    config.pacing.dial_cooldown = Duration::from_millis(300);

    let started = Instant::now();
    let summary = run_against(
        "dial_failures_wait_for_the_cooldown",
        sample_cli_cfg(),
        config,
        &directory,
        Some(3),
    );

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(3, summary.operations[ITERATION_OPERATION].errors);
}

#[test]
fn rejected_binds_wait_for_the_cooldown() {
    let directory = Arc::new(FakeDirectory {
        reject_binds: true,
        ..Default::default()
    });

    let mut config = sample_config(Mode::Load, 1);
    config.pacing.bind_cooldown = Duration::from_millis(300);

    let started = Instant::now();
    let summary = run_against(
        "rejected_binds_wait_for_the_cooldown",
        sample_cli_cfg(),
        config,
        &directory,
        Some(3),
    );

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(3, summary.checks[BIND_SUCCESS].failures);
    assert!(directory.search_bases.lock().is_empty());
}

#[test]
fn dropped_anonymous_bind_gives_no_verdict() {
    let directory = Arc::new(FakeDirectory {
        drop_binds: true,
        ..Default::default()
    });

    let summary = run_against(
        "dropped_anonymous_bind_gives_no_verdict",
        sample_cli_cfg(),
        sample_config(Mode::Audit, 1),
        &directory,
        None,
    );

    assert!(!summary.checks.contains_key(ANONYMOUS_BIND_ALERT));
    assert!(!summary.checks.contains_key(ROOT_DSE_EXPOSED));
}
