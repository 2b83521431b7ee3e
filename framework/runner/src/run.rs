use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use dirstress_core::prelude::{ShutdownSignalError, VuBailError};
use dirstress_instruments::ReportConfig;
use dirstress_summary_model::{append_run_summary, RunSummary};

use crate::cli::ReporterOpt;
use crate::monitor::start_monitor;
use crate::progress::{start_progress, start_progress_ticks};
use crate::watchdog::start_threshold_watchdog;
use crate::{
    context::{RunnerContext, UserValuesConstraint, VuContext},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// Run the scenario to completion and return its summary.
///
/// The run ends when the configured duration elapses, when every VU has finished its iterations,
/// on Ctrl-C, or when an aborting threshold is crossed. Errors in VU hooks are logged and do not
/// fail the run. Only configuration problems and a failing global setup hook are returned as
/// errors.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let assigned_behaviours = definition.assigned_behaviours_flat();
    let behaviour_counts = definition.assigned_behaviour_counts();

    log::info!(
        "Running scenario: {} (run id {})",
        definition.name,
        definition.run_id
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;

    let report_config = ReportConfig::new(&definition.name, &definition.run_id)
        .with_thresholds(definition.thresholds.clone());
    let report_config = match definition.reporter {
        ReporterOpt::InMemory => report_config.enable_summary_table(),
        ReporterOpt::JsonLines => report_config.enable_json_lines(definition.report_dir.clone()),
        ReporterOpt::Noop => report_config,
    };
    let reporter = Arc::new(report_config.init(&runtime)?);

    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        definition.connection_string.clone(),
        definition.run_id.clone(),
        definition.runner_values,
    );

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let started_at = chrono::Utc::now().timestamp();
    let start = Instant::now();

    if definition.no_progress {
        start_progress_ticks(
            definition.duration_s.map(Duration::from_secs),
            shutdown_handle.new_listener(),
        )?;
    }

    // After the setup has run, and if this is a time bounded scenario, then we need to take additional actions
    if let Some(duration) = definition.duration_s {
        if !definition.no_progress {
            start_progress(Duration::from_secs(duration), shutdown_handle.new_listener())?;
        }

        // Set a timer to shut down the test after the duration has elapsed
        let shutdown_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration)).await;
            shutdown_handle.shutdown();
        });
    }

    let aborted = start_threshold_watchdog(reporter.clone(), shutdown_handle.clone())?;

    let runner_context = Arc::new(runner_context);

    // Ready to start spawning VUs so start the resource monitor to report high usage by the
    // runner itself, which might lead to misleading latencies.
    start_monitor(shutdown_handle.new_listener())?;

    let running_vus = Arc::new(AtomicUsize::new(assigned_behaviours.len()));

    let mut handles = Vec::with_capacity(assigned_behaviours.len());
    for (vu_index, assigned_behaviour) in assigned_behaviours.iter().enumerate() {
        let runner_context = runner_context.clone();
        let running_vus = running_vus.clone();

        let setup_vu_fn = definition.setup_vu_fn;
        let behaviour_fn = definition.vu_behaviour.get(assigned_behaviour).copied();
        let teardown_vu_fn = definition.teardown_vu_fn;
        let iterations_per_vu = definition.iterations_per_vu;

        // For us to check if the VU should stop between behaviour cycles
        let cycle_shutdown_listener = shutdown_handle.new_listener();
        // For the behaviour implementation to listen for shutdown and respond appropriately
        let delegated_shutdown_listener = shutdown_handle.new_listener();

        let spawned = std::thread::Builder::new()
            .name(format!("vu-{}", vu_index))
            .spawn(move || {
                let mut context =
                    VuContext::new(vu_index, runner_context, delegated_shutdown_listener);
                let vu_id = context.vu_id().to_string();

                if let Some(setup_vu_fn) = setup_vu_fn {
                    if let Err(e) = setup_vu_fn(&mut context) {
                        log::error!("VU setup failed for {}: {:?}", vu_id, e);
                        running_vus.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                }

                if let Some(behaviour) = behaviour_fn {
                    loop {
                        if cycle_shutdown_listener.should_shutdown() {
                            log::debug!("Stopping {}", vu_id);
                            break;
                        }

                        if iterations_per_vu.is_some_and(|max| context.iteration() >= max) {
                            log::debug!("{} finished its iterations", vu_id);
                            break;
                        }

                        let result = behaviour(&mut context);
                        context.next_iteration();

                        match result {
                            Ok(()) => {}
                            Err(e) if e.is::<ShutdownSignalError>() => {
                                // Expected while the run is stopping, the check at the top of the
                                // loop will break out.
                            }
                            Err(e) if e.is::<VuBailError>() => {
                                log::warn!("{} stopped running its behaviour: {}", vu_id, e);
                                running_vus.fetch_sub(1, Ordering::AcqRel);
                                break;
                            }
                            Err(e) => {
                                log::error!("VU behaviour failed for {}: {:?}", vu_id, e);
                            }
                        }
                    }
                }

                if let Some(teardown_vu_fn) = teardown_vu_fn {
                    if let Err(e) = teardown_vu_fn(&mut context) {
                        log::error!("VU teardown failed for {}: {:?}", vu_id, e);
                    }
                }
            });

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                shutdown_handle.shutdown();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(e).context("Failed to spawn thread for VU");
            }
        }
    }

    for handle in handles {
        if let Err(e) = handle.join() {
            log::error!("VU thread panicked: {:?}", e);
            running_vus.fetch_sub(1, Ordering::AcqRel);
        }
    }

    // Every VU has stopped, make sure the timers and background threads stop too.
    shutdown_handle.shutdown();

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let snapshot = reporter.finalize();

    let mut summary = RunSummary::new(
        definition.run_id.clone(),
        definition.name.clone(),
        started_at,
        definition.duration_s,
        definition.vu_count,
        behaviour_counts,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.actual_duration = start.elapsed().as_secs();
    summary.set_vu_end_count(running_vus.load(Ordering::Acquire));
    summary.checks = snapshot.checks;
    summary.operations = snapshot.operations;
    summary.thresholds = snapshot.thresholds;
    summary.aborted_by_threshold = aborted.load(Ordering::Acquire);
    if let Some(target) = &definition.connection_string {
        summary.add_env("target".to_string(), target.clone());
    }
    summary.fingerprint = summary.compute_fingerprint();

    for outcome in summary.thresholds.iter().filter(|t| !t.passed) {
        log::warn!(
            "Threshold failed: {} (observed {:?})",
            outcome.name,
            outcome.observed
        );
    }

    if let Some(summary_file) = &definition.summary_file {
        append_run_summary(&summary, summary_file).with_context(|| {
            format!("Failed to write run summary to {}", summary_file.display())
        })?;
        log::info!("Run summary appended to {}", summary_file.display());
    }

    Ok(summary)
}
