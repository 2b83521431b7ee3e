use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use dirstress_instruments::Threshold;

use crate::cli::{DirstressScenarioCli, ReporterOpt};
use crate::context::{RunnerContext, UserValuesConstraint, VuContext};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type VuHookMut<RV, V> = fn(&mut VuContext<RV, V>) -> HookResult;

/// The behaviour name used by [ScenarioDefinitionBuilder::use_vu_behaviour] and given to every VU
/// that is not explicitly assigned a behaviour on the command line.
pub const DEFAULT_BEHAVIOUR: &str = "default";

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: DirstressScenarioCli,
    default_duration_s: Option<u64>,
    iterations_per_vu: Option<u64>,
    runner_values: Option<RV>,
    thresholds: Vec<Threshold>,
    /// Global setup hook for this scenario. It will be run once, before any VUs are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a VU, which will be run once for each VU as it starts.
    setup_vu_fn: Option<VuHookMut<RV, V>>,
    /// The VU behaviours for this scenario. There are two ways that this can be used:
    /// - Specify a single behaviour for all VUs using [ScenarioDefinitionBuilder::use_vu_behaviour].
    /// - Specify multiple behaviours using [ScenarioDefinitionBuilder::use_named_vu_behaviour]. You
    ///   then need to tell the runner how many VUs you want to run each behaviour.
    vu_behaviour: HashMap<String, VuHookMut<RV, V>>,
    /// Teardown hook for a VU, run once per VU after it has stopped running its behaviour.
    teardown_vu_fn: Option<VuHookMut<RV, V>>,
    /// Global teardown hook. Best effort, a failure is logged and does not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) vu_count: usize,
    pub(crate) assigned_behaviours: Vec<(String, usize)>,
    pub(crate) duration_s: Option<u64>,
    pub(crate) iterations_per_vu: Option<u64>,
    pub(crate) connection_string: Option<String>,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) report_dir: PathBuf,
    pub(crate) run_id: String,
    pub(crate) summary_file: Option<PathBuf>,
    pub(crate) runner_values: RV,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_vu_fn: Option<VuHookMut<RV, V>>,
    pub(crate) vu_behaviour: HashMap<String, VuHookMut<RV, V>>,
    pub(crate) teardown_vu_fn: Option<VuHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: DirstressScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_duration_s: None,
            iterations_per_vu: None,
            runner_values: None,
            thresholds: Vec::new(),
            setup_fn: None,
            setup_vu_fn: None,
            vu_behaviour: HashMap::new(),
            teardown_vu_fn: None,
            teardown_fn: None,
        }
    }

    /// Like [ScenarioDefinitionBuilder::new] but also initialises logging and parses the command
    /// line with [crate::init::init].
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// The duration to use when none is given on the command line.
    pub fn with_default_duration_s(mut self, duration: u64) -> Self {
        self.default_duration_s = Some(duration);
        self
    }

    /// Stop each VU after it has run its behaviour this many times. The run ends early once every
    /// VU has stopped.
    pub fn with_iterations_per_vu(mut self, iterations: Option<u64>) -> Self {
        self.iterations_per_vu = iterations;
        self
    }

    /// Initial value of the runner context, instead of `RV::default()`.
    pub fn with_runner_values(mut self, values: RV) -> Self {
        self.runner_values = Some(values);
        self
    }

    /// Criteria that decide whether the run passed. They are evaluated at the end of the run and
    /// aborting thresholds are also watched while the run is in progress.
    pub fn with_thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the VU setup hook [ScenarioDefinitionBuilder::setup_vu_fn] for this scenario.
    pub fn use_vu_setup(mut self, setup_vu_fn: VuHookMut<RV, V>) -> Self {
        self.setup_vu_fn = Some(setup_vu_fn);
        self
    }

    /// Set the default VU behaviour hook [ScenarioDefinitionBuilder::vu_behaviour] for this scenario.
    pub fn use_vu_behaviour(self, behaviour: VuHookMut<RV, V>) -> Self {
        self.use_named_vu_behaviour(DEFAULT_BEHAVIOUR, behaviour)
    }

    /// Set a named VU behaviour hook [ScenarioDefinitionBuilder::vu_behaviour] for this scenario.
    pub fn use_named_vu_behaviour(mut self, name: &str, behaviour: VuHookMut<RV, V>) -> Self {
        let previous = self.vu_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            log::warn!("Behaviour [{}] was defined twice, using the last one", name);
        }

        self
    }

    /// Set the VU teardown hook [ScenarioDefinitionBuilder::teardown_vu_fn] for this scenario.
    pub fn use_vu_teardown(mut self, teardown_vu_fn: VuHookMut<RV, V>) -> Self {
        self.teardown_vu_fn = Some(teardown_vu_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let vu_count = self.cli.vus.unwrap_or(1);
        if vu_count == 0 {
            bail!("The number of VUs must be at least 1");
        }

        let duration_s = if self.cli.soak {
            None
        } else {
            self.cli.duration.or(self.default_duration_s)
        };
        if duration_s == Some(0) {
            bail!("The duration must be greater than zero seconds");
        }

        let mut assigned = 0;
        for (name, count) in &self.cli.behaviour {
            if !self.vu_behaviour.contains_key(name) {
                bail!("Behaviour [{}] is not defined by this scenario", name);
            }
            assigned += count;
        }
        if assigned > vu_count {
            bail!(
                "Behaviours were assigned to {} VUs but only {} VUs are configured",
                assigned,
                vu_count
            );
        }

        let mut assigned_behaviours = self.cli.behaviour.clone();
        if assigned < vu_count {
            if !self.vu_behaviour.is_empty() && !self.vu_behaviour.contains_key(DEFAULT_BEHAVIOUR)
            {
                bail!(
                    "{} VUs have no behaviour assigned and the scenario has no default behaviour",
                    vu_count - assigned
                );
            }
            assigned_behaviours.push((DEFAULT_BEHAVIOUR.to_string(), vu_count - assigned));
        }

        Ok(ScenarioDefinition {
            name: self.name,
            vu_count,
            assigned_behaviours,
            duration_s,
            iterations_per_vu: self.iterations_per_vu,
            connection_string: self.cli.connection_string,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            report_dir: self.cli.report_dir,
            run_id: self
                .cli
                .run_id
                .unwrap_or_else(|| nanoid::nanoid!()),
            summary_file: self.cli.summary_file,
            runner_values: self.runner_values.unwrap_or_default(),
            thresholds: self.thresholds,
            setup_fn: self.setup_fn,
            setup_vu_fn: self.setup_vu_fn,
            vu_behaviour: self.vu_behaviour,
            teardown_vu_fn: self.teardown_vu_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinition<RV, V> {
    /// One behaviour name per VU, indexed by VU ordinal.
    pub(crate) fn assigned_behaviours_flat(&self) -> Vec<String> {
        self.assigned_behaviours
            .iter()
            .flat_map(|(name, count)| std::iter::repeat(name.clone()).take(*count))
            .collect()
    }

    pub(crate) fn assigned_behaviour_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (name, count) in &self.assigned_behaviours {
            *counts.entry(name.clone()).or_default() += count;
        }
        counts
    }
}
