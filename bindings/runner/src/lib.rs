mod checks;
mod cli;
mod common;
mod config;
mod context;
mod credentials;
mod definition;
mod directory;
mod error;
mod scope;

pub mod prelude {
    /// Hooks and behaviours for LDAP scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::checks::*;
    pub use crate::cli::LdapScenarioCli;
    pub use crate::config::{
        default_thresholds, normalize_target, Mode, Pacing, RunConfig, Timeouts,
        DEFAULT_HEAVY_BATCH_SIZE, DEFAULT_LDAP_PORT, DEFAULT_MAX_BIND_FAILURE_RATE,
        DEFAULT_MAX_SEARCH_P95_MS,
    };
    pub use crate::context::{LdapRunnerContext, LdapVuContext};
    pub use crate::credentials::{
        parse_credential_list, Credential, CredentialSource, DEFAULT_IDENTITY, DEFAULT_SECRET,
    };
    pub use crate::definition::{LdapScenarioDefinitionBuilder, HEAVY_BEHAVIOUR, LIGHT_BEHAVIOUR};
    pub use crate::directory::{
        DirectoryConnector, DirectoryEntry, DirectorySession, LdapConnector, SearchRequest,
        SearchScope, HEAVY_ATTRIBUTES, MATCH_ALL_FILTER,
    };
    pub use crate::error::{ConfigError, DirectoryError};
    pub use crate::scope::{resolve_scope, ResolvedScope, ScopeSource, FALLBACK_BASE_DN};

    /// Re-export of the `dirstress_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use dirstress_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use ldap_client_instrumented::prelude::*;
}
