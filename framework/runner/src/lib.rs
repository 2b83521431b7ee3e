mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod types;
mod watchdog;

pub use cli::parse_vu_behaviour;

pub mod prelude {
    pub use crate::cli::{DirstressScenarioCli, ReporterOpt};
    pub use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder, DEFAULT_BEHAVIOUR};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::types::DirstressResult;

    pub use dirstress_core::prelude::*;
    pub use dirstress_instruments::{
        report_operation, CheckRecord, OperationRecord, Reporter, Threshold,
    };
    pub use dirstress_summary_model::RunSummary;
}
