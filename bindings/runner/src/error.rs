use std::path::PathBuf;
use std::time::Duration;

/// Problems with the run configuration. These are reported before any VU starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the credential pool is empty, at least one `identity,secret` line is required")]
    EmptyCredentialPool,
    #[error("could not read credentials file {path}: {source}")]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("use either --identity/--secret or --credentials-file, not both")]
    ConflictingCredentials,
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("the number of VUs must be at least 1")]
    InvalidVuCount,
    #[error("the duration must be greater than zero seconds")]
    InvalidDuration,
    #[error("invalid pacing: {0}")]
    InvalidPacing(String),
    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("the {0} timeout must be greater than zero")]
    InvalidTimeout(&'static str),
}

/// Failure of one protocol phase. Contained within the VU iteration that hit it.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("could not connect to {target}: {reason}")]
    Connection { target: String, reason: String },
    #[error("bind rejected: {0}")]
    Auth(String),
    #[error("search under '{base}' failed: {reason}")]
    Query { base: String, reason: String },
    #[error("scope discovery failed: {0}")]
    Discovery(String),
    #[error("{phase} timed out after {timeout:?}")]
    Timeout {
        phase: &'static str,
        timeout: Duration,
    },
}
