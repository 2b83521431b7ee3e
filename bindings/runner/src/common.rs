use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dirstress_runner::prelude::{
    report_operation, CheckRecord, DelegatedShutdownListener, Executor, HookResult,
    OperationRecord, Reporter, RunnerContext, VuContext,
};

use crate::checks::{ANONYMOUS_BIND_ALERT, BIND_SUCCESS, ITERATION_OPERATION, ROOT_DSE_EXPOSED};
use crate::config::{RunConfig, Timeouts};
use crate::context::{LdapRunnerContext, LdapVuContext};
use crate::credentials::Credential;
use crate::directory::{DirectoryConnector, DirectorySession, LdapConnector, SearchRequest};
use crate::error::DirectoryError;
use crate::scope::{resolve_scope, ResolvedScope};

/// Global setup hook. Installs the ldap3 backed connector unless the scenario already provided
/// one.
pub fn install_ldap_connector(ctx: &mut RunnerContext<LdapRunnerContext>) -> HookResult {
    let config = ctx.get().config()?;
    log::info!(
        "Testing {} in {:?} mode with {} VUs",
        config.target,
        config.mode,
        config.vus
    );

    if ctx.get().connector.is_none() {
        let connector = LdapConnector::new(ctx.reporter(), config.timeouts.clone());
        ctx.get_mut().connector = Some(Arc::new(connector));
    }

    Ok(())
}

/// VU setup hook. Gives the VU its credential, which it keeps for the whole run.
pub fn assign_credential(ctx: &mut VuContext<LdapRunnerContext, LdapVuContext>) -> HookResult {
    let config = ctx.runner_context().get().config()?;
    let credential = config.credentials.resolve(ctx.vu_index());
    log::debug!("{} binds as {}", ctx.vu_id(), credential.identity);

    ctx.get_mut().credential = Some(credential);
    Ok(())
}

/// One load iteration with a single one-level search.
pub fn light_behaviour(ctx: &mut VuContext<LdapRunnerContext, LdapVuContext>) -> HookResult {
    load_iteration(ctx, Workload::Light)
}

/// One load iteration with a batch of subtree searches.
pub fn heavy_behaviour(ctx: &mut VuContext<LdapRunnerContext, LdapVuContext>) -> HookResult {
    load_iteration(ctx, Workload::Heavy)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Workload {
    Light,
    Heavy,
}

enum Outcome {
    BindFailed,
    Completed { failed_searches: usize },
    Stopped,
}

/// Dial, bind, resolve the scope on first use, search and release.
///
/// A failed dial or bind ends the iteration early, followed by the matching cooldown. Search
/// failures are counted and do not stop the rest of the batch. The session is always released,
/// even when the run is stopping.
fn load_iteration(
    ctx: &mut VuContext<LdapRunnerContext, LdapVuContext>,
    workload: Workload,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let config = runner_context.get().config()?;
    let connector = runner_context.get().connector()?;
    let executor = runner_context.executor();
    let reporter = runner_context.reporter();
    let credential = ctx.get().credential()?.clone();
    let vu_id = ctx.vu_id().to_string();

    if ctx.is_first_iteration() {
        executor.sleep(config.pacing.start_jitter_sample())?;
    }

    let iteration_record = OperationRecord::new(ITERATION_OPERATION).with_vu_id(&vu_id);

    let mut session = match executor
        .execute_in_place(async { Ok(dial(connector.as_ref(), &config).await) })?
    {
        Ok(session) => session,
        Err(e) => {
            log::debug!("{} could not connect: {}", vu_id, e);
            report_operation(reporter, iteration_record, &Err::<(), _>(e));
            executor.sleep(config.pacing.dial_cooldown)?;
            return Ok(());
        }
    };

    let iteration = LoadIteration {
        config: &config,
        credential: &credential,
        reporter: &reporter,
        vu_index: ctx.vu_index(),
        vu_id: &vu_id,
        workload,
        shutdown_listener: ctx.shutdown_listener().clone(),
    };
    let cached_scope = &mut ctx.get_mut().scope;
    let outcome = executor
        .execute_in_place(async { Ok(iteration.run(session.as_mut(), cached_scope).await) });

    release(executor, session, &config.timeouts, &vu_id);

    match outcome? {
        Outcome::BindFailed => {
            report_operation(reporter, iteration_record, &Err::<(), _>("bind failed"));
            executor.sleep(config.pacing.bind_cooldown)?;
        }
        Outcome::Completed { failed_searches } => {
            let result = match failed_searches {
                0 => Ok(()),
                _ => Err(failed_searches),
            };
            report_operation(reporter, iteration_record, &result);

            executor.sleep(match workload {
                Workload::Light => config.pacing.light_pause_sample(),
                Workload::Heavy => config.pacing.heavy_pause,
            })?;
        }
        Outcome::Stopped => {}
    }

    Ok(())
}

struct LoadIteration<'a> {
    config: &'a RunConfig,
    credential: &'a Credential,
    reporter: &'a Reporter,
    vu_index: usize,
    vu_id: &'a str,
    workload: Workload,
    shutdown_listener: DelegatedShutdownListener,
}

impl LoadIteration<'_> {
    async fn run(
        &self,
        session: &mut dyn DirectorySession,
        cached_scope: &mut Option<ResolvedScope>,
    ) -> Outcome {
        let timeouts = &self.config.timeouts;

        let bind = with_timeout(
            "bind",
            timeouts.bind,
            session.bind(&self.credential.identity, &self.credential.secret),
        )
        .await;
        self.reporter
            .add_check(CheckRecord::new(BIND_SUCCESS, bind.is_ok(), self.vu_index));
        if let Err(e) = bind {
            log::debug!(
                "{} bind as {} failed: {}",
                self.vu_id,
                self.credential.identity,
                e
            );
            return Outcome::BindFailed;
        }

        let scope = match cached_scope.take() {
            Some(scope) => scope,
            None => {
                let scope = resolve_scope(
                    self.config.base_dn_override(),
                    &self.credential.identity,
                    &mut *session,
                    timeouts.search,
                )
                .await;
                log::info!(
                    "{} resolved search scope {} from {}",
                    self.vu_id,
                    scope.base_dn,
                    scope.source
                );
                scope
            }
        };
        let base_dn = cached_scope.insert(scope).base_dn.as_str();

        if self.shutdown_listener.should_shutdown() {
            return Outcome::Stopped;
        }

        let (request, count) = match self.workload {
            Workload::Light => (SearchRequest::light(base_dn), 1),
            Workload::Heavy => (SearchRequest::heavy(base_dn), self.config.heavy_batch_size),
        };

        let mut failed_searches = 0;
        for _ in 0..count {
            if let Err(e) = with_timeout("search", timeouts.search, session.search(&request)).await
            {
                failed_searches += 1;
                log::debug!("{} search under {} failed: {}", self.vu_id, base_dn, e);
            }
        }

        Outcome::Completed { failed_searches }
    }
}

/// Runs both security probes once. Each probe uses its own connection, so a failure in one does
/// not affect the other. Never runs the load workload.
pub fn audit_behaviour(ctx: &mut VuContext<LdapRunnerContext, LdapVuContext>) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let config = runner_context.get().config()?;
    let connector = runner_context.get().connector()?;
    let executor = runner_context.executor();
    let reporter = runner_context.reporter();
    let vu_index = ctx.vu_index();
    let vu_id = ctx.vu_id();

    if let Some(accepted) = run_probe(
        executor,
        connector.as_ref(),
        &config,
        Probe::AnonymousBind,
        vu_id,
    )? {
        if accepted {
            log::warn!("{} accepts anonymous binds", config.target);
        }
        reporter.add_check(CheckRecord::new(ANONYMOUS_BIND_ALERT, !accepted, vu_index));
    }

    if let Some(true) = run_probe(executor, connector.as_ref(), &config, Probe::RootDse, vu_id)? {
        log::info!("{} exposes its root DSE without authentication", config.target);
        reporter.add_check(CheckRecord::new(ROOT_DSE_EXPOSED, true, vu_index).informational());
    }

    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Probe {
    AnonymousBind,
    RootDse,
}

impl Probe {
    /// True when the finding is present. A rejected bind or a refused read means it is not.
    async fn run(
        self,
        session: &mut dyn DirectorySession,
        timeouts: &Timeouts,
    ) -> Result<bool, DirectoryError> {
        match self {
            Probe::AnonymousBind => {
                match with_timeout("bind", timeouts.bind, session.bind("", "")).await {
                    Ok(()) => Ok(true),
                    Err(DirectoryError::Auth(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Probe::RootDse => {
                let request = SearchRequest::root_dse();
                match with_timeout("search", timeouts.search, session.search(&request)).await {
                    Ok(entries) => Ok(!entries.is_empty()),
                    Err(DirectoryError::Query { .. } | DirectoryError::Auth(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// `Ok(None)` when the probe could not reach a verdict.
fn run_probe(
    executor: &Executor,
    connector: &dyn DirectoryConnector,
    config: &RunConfig,
    probe: Probe,
    vu_id: &str,
) -> anyhow::Result<Option<bool>> {
    let mut session =
        match executor.execute_in_place(async { Ok(dial(connector, config).await) })? {
            Ok(session) => session,
            Err(e) => {
                log::warn!("{} {:?} probe could not connect: {}", vu_id, probe, e);
                return Ok(None);
            }
        };

    let finding = executor
        .execute_in_place(async { Ok(probe.run(session.as_mut(), &config.timeouts).await) });

    release(executor, session, &config.timeouts, vu_id);

    match finding? {
        Ok(finding) => Ok(Some(finding)),
        Err(e) => {
            log::warn!("{} {:?} probe failed: {}", vu_id, probe, e);
            Ok(None)
        }
    }
}

async fn dial(
    connector: &dyn DirectoryConnector,
    config: &RunConfig,
) -> Result<Box<dyn DirectorySession>, DirectoryError> {
    with_timeout("dial", config.timeouts.dial, connector.open(&config.target)).await
}

/// Close the session without racing the stop signal, bounded by the close timeout.
fn release(
    executor: &Executor,
    mut session: Box<dyn DirectorySession>,
    timeouts: &Timeouts,
    vu_id: &str,
) {
    let closed =
        executor.execute_to_completion(with_timeout("close", timeouts.close, session.close()));
    if let Err(e) = closed {
        log::debug!("{} did not close its session cleanly: {}", vu_id, e);
    }
}

async fn with_timeout<T>(
    phase: &'static str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, DirectoryError>>,
) -> Result<T, DirectoryError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(DirectoryError::Timeout { phase, timeout }))
}
