use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;

/// Identity used when neither an identity nor a credentials file is given.
pub const DEFAULT_IDENTITY: &str = "guest";
/// Secret used when neither a secret nor a credentials file is given.
pub const DEFAULT_SECRET: &str = "guest";

/// An identity/secret pair for a simple bind.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub identity: String,
    pub secret: String,
}

impl Credential {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where VUs get their credentials from.
///
/// The pool is loaded once and shared read-only by every VU.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Every VU binds with the same pair.
    Single(Credential),
    /// VU `i` binds with `pool[i mod len]`. Never empty.
    Pool(Arc<[Credential]>),
}

impl CredentialSource {
    /// A single pair, falling back to `guest`/`guest` for whichever part is not given.
    pub fn single(identity: Option<String>, secret: Option<String>) -> Self {
        Self::Single(Credential::new(
            identity.unwrap_or_else(|| DEFAULT_IDENTITY.to_string()),
            secret.unwrap_or_else(|| DEFAULT_SECRET.to_string()),
        ))
    }

    pub fn pool(credentials: Vec<Credential>) -> Result<Self, ConfigError> {
        if credentials.is_empty() {
            return Err(ConfigError::EmptyCredentialPool);
        }

        Ok(Self::Pool(credentials.into()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;

        let source = Self::pool(parse_credential_list(&content))?;
        log::info!(
            "Loaded {} credentials from {}",
            source.len(),
            path.display()
        );
        Ok(source)
    }

    /// The credential for the VU with the given ordinal. Deterministic for the life of the run.
    pub fn resolve(&self, ordinal: usize) -> Credential {
        match self {
            Self::Single(credential) => credential.clone(),
            Self::Pool(pool) => pool[ordinal % pool.len()].clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Pool(pool) => pool.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse `identity,secret` lines. The line is split at the first comma so secrets may contain
/// commas. Blank lines are ignored, malformed lines are skipped with a warning.
pub fn parse_credential_list(content: &str) -> Vec<Credential> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }

            let Some((identity, secret)) = line.split_once(',') else {
                log::warn!("Skipping credential line {}: no comma found", index + 1);
                return None;
            };

            let identity = identity.trim();
            if identity.is_empty() {
                log::warn!("Skipping credential line {}: empty identity", index + 1);
                return None;
            }

            Some(Credential::new(identity, secret.trim()))
        })
        .collect()
}
