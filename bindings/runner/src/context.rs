use std::sync::Arc;

use dirstress_runner::prelude::{UserValuesConstraint, VuBailError};

use crate::config::RunConfig;
use crate::credentials::Credential;
use crate::directory::DirectoryConnector;
use crate::scope::ResolvedScope;

/// LDAP specific runner context values.
#[derive(Debug, Default)]
pub struct LdapRunnerContext {
    pub(crate) config: Option<Arc<RunConfig>>,
    pub(crate) connector: Option<Arc<dyn DirectoryConnector>>,
}

impl UserValuesConstraint for LdapRunnerContext {}

impl LdapRunnerContext {
    pub(crate) fn new(config: Arc<RunConfig>, connector: Option<Arc<dyn DirectoryConnector>>) -> Self {
        Self {
            config: Some(config),
            connector,
        }
    }

    pub fn config(&self) -> Result<Arc<RunConfig>, VuBailError> {
        self.config
            .clone()
            .ok_or_else(|| VuBailError::new("the run configuration is not set"))
    }

    pub fn connector(&self) -> Result<Arc<dyn DirectoryConnector>, VuBailError> {
        self.connector.clone().ok_or_else(|| {
            VuBailError::new("no directory connector, did the scenario setup hook run?")
        })
    }
}

/// LDAP specific VU context values.
#[derive(Debug, Default)]
pub struct LdapVuContext {
    pub(crate) credential: Option<Credential>,
    pub(crate) scope: Option<ResolvedScope>,
}

impl UserValuesConstraint for LdapVuContext {}

impl LdapVuContext {
    pub fn credential(&self) -> Result<&Credential, VuBailError> {
        self.credential.as_ref().ok_or_else(|| {
            VuBailError::new("no credential assigned, did the VU setup hook run?")
        })
    }

    /// The search scope, once it has been resolved by the first successful bind.
    pub fn scope(&self) -> Option<&ResolvedScope> {
        self.scope.as_ref()
    }
}
