use std::path::PathBuf;
use std::sync::Arc;

use dirstress_runner::prelude::{
    run, CheckRecord, DirstressScenarioCli, HookResult, ReporterOpt, RunnerContext,
    ScenarioDefinitionBuilder, Threshold, UserValuesConstraint, VuBailError, VuContext,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct VuContextValue {
    value: i32,
}

impl UserValuesConstraint for VuContextValue {}

fn sample_cli_cfg() -> DirstressScenarioCli {
    DirstressScenarioCli {
        connection_string: Some("test_connection_string".to_string()),
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

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_tx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_setup(setup);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn capture_error_in_vu_setup() {
    fn vu_setup(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in VU setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_setup",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_vu_setup(vu_setup);

    let result = run(scenario);

    assert!(result.is_ok());
    assert_eq!(0, result.unwrap().vu_end_count);
}

#[test]
fn capture_error_in_vu_behaviour_and_continue() {
    fn vu_behaviour(ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by shutting down once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Err(anyhow::anyhow!("Error in VU behaviour hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_behaviour_and_continue",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_vu_behaviour(vu_behaviour);

    let result = run(scenario);

    assert!(result.is_ok());
    assert_eq!(1, result.unwrap().vu_end_count);
}

#[test]
fn bail_error_stops_vu_behaviour() {
    fn vu_behaviour_1(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        Err(VuBailError::default().into())
    }

    fn vu_behaviour_2(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        std::thread::sleep(std::time::Duration::from_millis(10));
        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(2);
    cfg.behaviour = vec![("bail".to_string(), 1), ("continue".to_string(), 1)];
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "bail_error_stops_vu_behaviour",
        cfg,
    )
    .with_default_duration_s(1)
    .use_named_vu_behaviour("bail", vu_behaviour_1)
    .use_named_vu_behaviour("continue", vu_behaviour_2);

    let result = run(scenario);

    assert!(result.is_ok());
    assert_eq!(1, result.unwrap().vu_end_count);
}

#[test]
fn capture_error_in_vu_teardown() {
    fn vu_teardown(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in VU teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_teardown",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_vu_teardown(vu_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_teardown",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_teardown(teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn iteration_cap_ends_the_run_early() {
    fn vu_behaviour(ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        let first = ctx.is_first_iteration();
        ctx.runner_context().reporter().add_check(CheckRecord::new(
            "first iteration seen",
            first || ctx.iteration() > 0,
            ctx.vu_index(),
        ));
        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(4);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "iteration_cap_ends_the_run_early",
        cfg,
    )
    .with_default_duration_s(60)
    .with_iterations_per_vu(Some(3))
    .use_vu_behaviour(vu_behaviour);

    let summary = run(scenario).unwrap();

    let check = &summary.checks["first iteration seen"];
    assert_eq!(12, check.passes);
    assert_eq!(4, check.distinct_vus);
    assert!(summary.actual_duration < 60);
    assert_eq!(4, summary.vu_end_count);
}

#[test]
fn aborting_threshold_stops_the_run() {
    fn vu_behaviour(ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        ctx.runner_context()
            .reporter()
            .add_check(CheckRecord::new("bind success", false, ctx.vu_index()));
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.vus = Some(2);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "aborting_threshold_stops_the_run",
        cfg,
    )
    .with_default_duration_s(30)
    .with_thresholds(vec![Threshold::CheckFailureRate {
        check: "bind success".to_string(),
        max_rate: 0.1,
        abort_on_fail: true,
    }])
    .use_vu_behaviour(vu_behaviour);

    let summary = run(scenario).unwrap();

    assert!(summary.aborted_by_threshold);
    assert!(!summary.thresholds_passed());
    assert!(summary.actual_duration < 30);
}

#[test]
fn summary_is_appended_to_history_file() {
    fn vu_behaviour(_ctx: &mut VuContext<RunnerContextValue, VuContextValue>) -> HookResult {
        Ok(())
    }

    let dir = tempfile::tempdir().unwrap();
    let summary_file = dir.path().join("runs.jsonl");

    let mut cfg = sample_cli_cfg();
    cfg.run_id = Some("history".to_string());
    cfg.summary_file = Some(summary_file.clone());
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "summary_is_appended_to_history_file",
        cfg,
    )
    .with_default_duration_s(5)
    .with_iterations_per_vu(Some(1))
    .use_vu_behaviour(vu_behaviour);

    let summary = run(scenario).unwrap();

    let runs = dirstress_summary_model::load_summary_runs(&summary_file).unwrap();
    assert_eq!(1, runs.len());
    assert_eq!("history", runs[0].run_id);
    assert_eq!(Some(5), runs[0].run_duration);
    assert!(!runs[0].fingerprint.is_empty());
    assert_eq!(runs[0].compute_fingerprint(), runs[0].fingerprint);
    assert_eq!(summary.fingerprint, runs[0].fingerprint);
}
