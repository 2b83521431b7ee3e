use std::sync::Arc;
use std::time::Duration;

use dirstress_instruments::{report_operation, OperationRecord, Reporter};
use dirstress_instruments_derive::dirstress_instrument;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Scope, SearchEntry};

/// An LDAP session that reports the timing of every protocol operation.
///
/// Operations are reported as `ldap_connect`, `ldap_simple_bind`, `ldap_search`,
/// `ldap_read_root_dse` and `ldap_unbind`.
pub struct LdapSessionInstrumented {
    inner: Ldap,
    reporter: Arc<Reporter>,
}

impl LdapSessionInstrumented {
    /// Dial `url`, which may use the `ldap` or `ldaps` scheme.
    ///
    /// The connection is driven by a task on the current Tokio runtime until the session is
    /// unbound or dropped.
    pub async fn connect(
        url: &str,
        timeout: Duration,
        reporter: Arc<Reporter>,
    ) -> Result<Self, LdapError> {
        let operation_record = OperationRecord::new("ldap_connect");
        let result = Self::open(url, timeout).await;
        report_operation(reporter.clone(), operation_record, &result);

        Ok(Self {
            inner: result?,
            reporter,
        })
    }

    async fn open(url: &str, timeout: Duration) -> Result<Ldap, LdapError> {
        let settings = LdapConnSettings::new().set_conn_timeout(timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, url).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                log::debug!("LDAP connection ended with an error: {}", e);
            }
        });

        Ok(ldap)
    }

    #[dirstress_instrument(prefix = "ldap_")]
    pub async fn simple_bind(
        &mut self,
        identity: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<LdapResult, LdapError> {
        self.inner
            .with_timeout(timeout)
            .simple_bind(identity, secret)
            .await
            .and_then(LdapResult::success)
    }

    #[dirstress_instrument(prefix = "ldap_")]
    pub async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<SearchEntry>, LdapError> {
        self.inner
            .with_timeout(timeout)
            .search(base, scope, filter, attrs)
            .await
            .and_then(|result| result.success())
            .map(|(entries, _)| entries.into_iter().map(SearchEntry::construct).collect())
    }

    /// Base search of the empty DN. Reported separately from [Self::search] so that scope
    /// discovery and audit reads do not skew the workload latency.
    #[dirstress_instrument(prefix = "ldap_")]
    pub async fn read_root_dse(
        &mut self,
        filter: &str,
        attrs: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<SearchEntry>, LdapError> {
        self.inner
            .with_timeout(timeout)
            .search("", Scope::Base, filter, attrs)
            .await
            .and_then(|result| result.success())
            .map(|(entries, _)| entries.into_iter().map(SearchEntry::construct).collect())
    }

    /// Politely end the session. The server does not answer an unbind, so this completes as soon
    /// as the request is written.
    #[dirstress_instrument(prefix = "ldap_")]
    pub async fn unbind(&mut self) -> Result<(), LdapError> {
        self.inner.unbind().await
    }
}
