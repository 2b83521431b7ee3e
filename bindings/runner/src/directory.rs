use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dirstress_runner::prelude::Reporter;
use ldap_client_instrumented::prelude::{LdapError, LdapSession, Scope, SearchEntry};

use crate::config::Timeouts;
use crate::error::DirectoryError;

/// Filter matching every entry.
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Attributes read by every heavy search.
pub const HEAVY_ATTRIBUTES: [&str; 6] = [
    "cn",
    "objectClass",
    "memberOf",
    "sAMAccountName",
    "description",
    "whenChanged",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Read the naming contexts from the root DSE.
    pub fn root_dse() -> Self {
        Self {
            base: String::new(),
            scope: SearchScope::Base,
            filter: MATCH_ALL_FILTER.to_string(),
            attributes: vec![
                "defaultNamingContext".to_string(),
                "namingContexts".to_string(),
            ],
        }
    }

    /// True for a base search of the empty DN, which reads the root DSE.
    pub fn is_root_dse(&self) -> bool {
        self.base.is_empty() && self.scope == SearchScope::Base
    }

    /// List the names of the direct children of `base`.
    pub fn light(base: &str) -> Self {
        Self {
            base: base.to_string(),
            scope: SearchScope::OneLevel,
            filter: MATCH_ALL_FILTER.to_string(),
            attributes: vec!["dn".to_string()],
        }
    }

    /// Read common attributes of every entry under `base`.
    pub fn heavy(base: &str) -> Self {
        Self {
            base: base.to_string(),
            scope: SearchScope::Subtree,
            filter: MATCH_ALL_FILTER.to_string(),
            attributes: HEAVY_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// One entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `name`. Attribute names are matched case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// Opens sessions against the directory under test.
#[async_trait]
pub trait DirectoryConnector: Debug + Send + Sync {
    async fn open(&self, target: &str) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open connection to the directory.
#[async_trait]
pub trait DirectorySession: Send {
    async fn bind(&mut self, identity: &str, secret: &str) -> Result<(), DirectoryError>;

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    async fn close(&mut self) -> Result<(), DirectoryError>;
}

/// Connects with the instrumented ldap3 client, so every protocol operation is timed.
#[derive(Debug)]
pub struct LdapConnector {
    reporter: Arc<Reporter>,
    timeouts: Timeouts,
}

impl LdapConnector {
    pub fn new(reporter: Arc<Reporter>, timeouts: Timeouts) -> Self {
        Self { reporter, timeouts }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn open(&self, target: &str) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let session = LdapSession::connect(target, self.timeouts.dial, self.reporter.clone())
            .await
            .map_err(|e| DirectoryError::Connection {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(LdapDirectorySession {
            session,
            target: target.to_string(),
            timeouts: self.timeouts.clone(),
        }))
    }
}

struct LdapDirectorySession {
    session: LdapSession,
    target: String,
    timeouts: Timeouts,
}

impl LdapDirectorySession {
    /// Only a result code returned by the server is a protocol level failure. Anything else,
    /// such as a dropped connection, means the session is gone.
    fn classify(
        &self,
        error: LdapError,
        phase: &'static str,
        timeout: Duration,
        rejected: impl FnOnce(String) -> DirectoryError,
    ) -> DirectoryError {
        match error {
            LdapError::Timeout { .. } => DirectoryError::Timeout { phase, timeout },
            e @ LdapError::LdapResult { .. } => rejected(e.to_string()),
            e => DirectoryError::Connection {
                target: self.target.clone(),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl DirectorySession for LdapDirectorySession {
    async fn bind(&mut self, identity: &str, secret: &str) -> Result<(), DirectoryError> {
        let timeout = self.timeouts.bind;
        match self.session.simple_bind(identity, secret, timeout).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.classify(e, "bind", timeout, DirectoryError::Auth)),
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let timeout = self.timeouts.search;
        let result = if request.is_root_dse() {
            self.session
                .read_root_dse(&request.filter, request.attributes.clone(), timeout)
                .await
        } else {
            let scope = match request.scope {
                SearchScope::Base => Scope::Base,
                SearchScope::OneLevel => Scope::OneLevel,
                SearchScope::Subtree => Scope::Subtree,
            };
            self.session
                .search(
                    &request.base,
                    scope,
                    &request.filter,
                    request.attributes.clone(),
                    timeout,
                )
                .await
        };

        match result {
            Ok(entries) => Ok(entries.into_iter().map(into_directory_entry).collect()),
            Err(e) => Err(self.classify(e, "search", timeout, |reason| {
                DirectoryError::Query {
                    base: request.base.clone(),
                    reason,
                }
            })),
        }
    }

    async fn close(&mut self) -> Result<(), DirectoryError> {
        self.session
            .unbind()
            .await
            .map_err(|e| DirectoryError::Connection {
                target: self.target.clone(),
                reason: e.to_string(),
            })
    }
}

fn into_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    DirectoryEntry {
        dn: entry.dn,
        attributes: entry.attrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{ROOT_DSE_OPERATION, SEARCH_OPERATION};

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = DirectoryEntry {
            dn: String::new(),
            attributes: HashMap::from([(
                "defaultnamingcontext".to_string(),
                vec!["DC=corp,DC=local".to_string()],
            )]),
        };

        assert_eq!(
            Some("DC=corp,DC=local"),
            entry.first_value("defaultNamingContext")
        );
        assert_eq!(None, entry.first_value("namingContexts"));
    }

    #[test]
    fn workload_requests() {
        let light = SearchRequest::light("DC=corp,DC=local");
        assert_eq!(SearchScope::OneLevel, light.scope);
        assert_eq!(vec!["dn".to_string()], light.attributes);

        let heavy = SearchRequest::heavy("DC=corp,DC=local");
        assert_eq!(SearchScope::Subtree, heavy.scope);
        assert_eq!(6, heavy.attributes.len());
    }

    /// Accepts every connection, reads the first request and hangs up without answering.
    async fn hang_up_listener() -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = stream.read(&mut buf).await;
            }
        });

        format!("ldap://{}", address)
    }

    fn connector(reporter: Arc<Reporter>) -> LdapConnector {
        LdapConnector::new(reporter, Timeouts::default())
    }

    #[tokio::test]
    async fn dropped_connection_during_bind_is_not_a_rejection() {
        let target = hang_up_listener().await;
        let reporter = Arc::new(Reporter::new(Vec::new(), Vec::new()));

        let mut session = connector(reporter).open(&target).await.unwrap();
        let result = session.bind("", "").await;

        assert!(
            matches!(result, Err(DirectoryError::Connection { .. })),
            "unexpected bind result {:?}",
            result
        );
    }

    #[tokio::test]
    async fn dropped_connection_during_search_is_not_a_query_failure() {
        let target = hang_up_listener().await;
        let reporter = Arc::new(Reporter::new(Vec::new(), Vec::new()));

        let mut session = connector(reporter.clone()).open(&target).await.unwrap();
        let result = session.search(&SearchRequest::root_dse()).await;

        assert!(
            matches!(result, Err(DirectoryError::Connection { .. })),
            "unexpected search result {:?}",
            result
        );

        let operations = reporter.snapshot().operations;
        assert_eq!(1, operations[ROOT_DSE_OPERATION].errors);
        assert!(!operations.contains_key(SEARCH_OPERATION));
    }

    #[test]
    fn only_the_empty_base_reads_the_root_dse() {
        assert!(SearchRequest::root_dse().is_root_dse());
        assert!(!SearchRequest::light("").is_root_dse());
        assert!(!SearchRequest::light("DC=corp,DC=local").is_root_dse());
    }
}
