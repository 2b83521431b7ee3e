use crate::cli::DirstressScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the dirstress runner.
pub fn init() -> DirstressScenarioCli {
    env_logger::init();

    DirstressScenarioCli::parse()
}
