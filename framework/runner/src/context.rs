use std::{fmt::Debug, sync::Arc};

use dirstress_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use dirstress_instruments::Reporter;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// The context shared by every VU of a run.
///
/// It is mutable during the global setup hook and read-only once the VUs have started.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    run_id: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
        run_id: String,
        value: RV,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            run_id,
            value,
        }
    }

    /// A handle to the executor for running async code from the synchronous hooks.
    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// The reporter that checks and timing samples are recorded into.
    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string that the run was configured with, if any.
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop the run as if the configured duration had elapsed. VUs finish their current iteration
    /// and the run is reported normally.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// The context owned by a single VU for the whole run.
pub struct VuContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    vu_index: usize,
    vu_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    iteration: u64,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuContext<RV, V> {
    pub(crate) fn new(
        vu_index: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            vu_index,
            vu_id: format!("vu-{}", vu_index),
            runner_context,
            shutdown_listener,
            iteration: 0,
            value: Default::default(),
        }
    }

    /// The ordinal of this VU, from `0` to the VU count minus one. Stable for the whole run.
    pub fn vu_index(&self) -> usize {
        self.vu_index
    }

    /// A printable id for this VU, derived from its ordinal.
    pub fn vu_id(&self) -> &str {
        &self.vu_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// A listener for the stop signal, for behaviours that wait on something other than the
    /// executor.
    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// The number of behaviour iterations this VU has completed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn is_first_iteration(&self) -> bool {
        self.iteration == 0
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
