use std::sync::Arc;

use clap::Parser;
use dirstress_runner::prelude::{DirstressScenarioCli, ScenarioDefinitionBuilder};

use crate::cli::LdapScenarioCli;
use crate::common::{
    assign_credential, audit_behaviour, heavy_behaviour, install_ldap_connector, light_behaviour,
};
use crate::config::{Mode, RunConfig};
use crate::context::{LdapRunnerContext, LdapVuContext};
use crate::directory::DirectoryConnector;
use crate::error::ConfigError;

/// Behaviour name for the single search workload. VUs without an assigned behaviour run it.
pub const LIGHT_BEHAVIOUR: &str = "light";

/// Behaviour name for the batched subtree search workload.
pub const HEAVY_BEHAVIOUR: &str = "heavy";

/// Builds the [ScenarioDefinitionBuilder] for an LDAP scenario from a validated [RunConfig].
///
/// The hooks and behaviours are fixed by the [Mode]. Load scenarios define `light` and `heavy`
/// and audit scenarios run the probes once per VU.
#[derive(Debug)]
pub struct LdapScenarioDefinitionBuilder {
    name: String,
    cli: DirstressScenarioCli,
    config: RunConfig,
    connector: Option<Arc<dyn DirectoryConnector>>,
}

impl LdapScenarioDefinitionBuilder {
    /// Initialise logging, parse the command line and build the definition.
    pub fn new_with_init(name: &str, mode: Mode) -> anyhow::Result<Self> {
        env_logger::init();

        Ok(Self::new(name, LdapScenarioCli::parse(), mode)?)
    }

    pub fn new(name: &str, cli: LdapScenarioCli, mode: Mode) -> Result<Self, ConfigError> {
        let (cli, config) = cli.into_parts(mode)?;
        Self::from_config(name, cli, config)
    }

    /// Use a configuration built in code. The runner options that the configuration also carries
    /// are taken from the configuration.
    pub fn from_config(
        name: &str,
        mut cli: DirstressScenarioCli,
        config: RunConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        cli.connection_string = Some(config.target.clone());
        cli.vus = Some(config.vus);
        if config.duration.is_some() {
            cli.duration = config.duration;
        }

        Ok(Self {
            name: name.to_string(),
            cli,
            config,
            connector: None,
        })
    }

    /// Talk to the directory through `connector` instead of the ldap3 client.
    pub fn with_connector(mut self, connector: Arc<dyn DirectoryConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn into_std(self) -> ScenarioDefinitionBuilder<LdapRunnerContext, LdapVuContext> {
        let mode = self.config.mode;
        let thresholds = self.config.thresholds.clone();

        let builder = ScenarioDefinitionBuilder::new(&self.name, self.cli)
            .with_runner_values(LdapRunnerContext::new(
                Arc::new(self.config),
                self.connector,
            ))
            .with_thresholds(thresholds)
            .use_setup(install_ldap_connector)
            .use_vu_setup(assign_credential);

        match mode {
            Mode::Load => builder
                .use_vu_behaviour(light_behaviour)
                .use_named_vu_behaviour(LIGHT_BEHAVIOUR, light_behaviour)
                .use_named_vu_behaviour(HEAVY_BEHAVIOUR, heavy_behaviour),
            Mode::Audit => builder
                .use_vu_behaviour(audit_behaviour)
                .with_iterations_per_vu(Some(1)),
        }
    }
}
