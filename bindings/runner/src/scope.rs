use std::fmt;
use std::time::Duration;

use crate::directory::{DirectoryEntry, DirectorySession, SearchRequest};
use crate::error::DirectoryError;

/// Search base used when no other source yields one.
pub const FALLBACK_BASE_DN: &str = "DC=example,DC=com";

/// Where a resolved scope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSource {
    Override,
    Identity,
    RootDse,
    Fallback,
}

impl fmt::Display for ScopeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeSource::Override => "configured override",
            ScopeSource::Identity => "bind identity",
            ScopeSource::RootDse => "root DSE",
            ScopeSource::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub base_dn: String,
    pub source: ScopeSource,
}

/// Work out the search base for a VU. The first of these wins:
///
/// 1. a non-blank override,
/// 2. the parent of a DN-shaped bind identity,
/// 3. the naming context advertised by the root DSE of the bound session,
/// 4. [FALLBACK_BASE_DN].
pub async fn resolve_scope(
    base_dn_override: Option<&str>,
    identity: &str,
    session: &mut dyn DirectorySession,
    search_timeout: Duration,
) -> ResolvedScope {
    if let Some(base_dn) = base_dn_override.map(str::trim).filter(|dn| !dn.is_empty()) {
        return ResolvedScope {
            base_dn: base_dn.to_string(),
            source: ScopeSource::Override,
        };
    }

    if let Some(base_dn) = scope_from_identity(identity) {
        return ResolvedScope {
            base_dn,
            source: ScopeSource::Identity,
        };
    }

    match discover_naming_context(session, search_timeout).await {
        Ok(base_dn) => ResolvedScope {
            base_dn,
            source: ScopeSource::RootDse,
        },
        Err(e) => {
            log::debug!("Falling back to {}: {}", FALLBACK_BASE_DN, e);
            ResolvedScope {
                base_dn: FALLBACK_BASE_DN.to_string(),
                source: ScopeSource::Fallback,
            }
        }
    }
}

async fn discover_naming_context(
    session: &mut dyn DirectorySession,
    search_timeout: Duration,
) -> Result<String, DirectoryError> {
    let entries = tokio::time::timeout(search_timeout, session.search(&SearchRequest::root_dse()))
        .await
        .unwrap_or(Err(DirectoryError::Timeout {
            phase: "root DSE search",
            timeout: search_timeout,
        }))
        .map_err(|e| DirectoryError::Discovery(e.to_string()))?;

    naming_context(&entries).ok_or_else(|| {
        DirectoryError::Discovery("the root DSE does not advertise a naming context".to_string())
    })
}

/// `defaultNamingContext` of the first entry, else its first `namingContexts` value.
pub fn naming_context(entries: &[DirectoryEntry]) -> Option<String> {
    let entry = entries.first()?;
    entry
        .first_value("defaultNamingContext")
        .or_else(|| entry.first_value("namingContexts"))
        .map(str::trim)
        .filter(|dn| !dn.is_empty())
        .map(str::to_string)
}

/// The parent of `identity` when it looks like a DN: at least two RDNs, one of them a `DC`.
pub fn scope_from_identity(identity: &str) -> Option<String> {
    let rdns = split_rdns(identity);
    if rdns.len() < 2 || rdns.iter().any(|rdn| !rdn.contains('=')) {
        return None;
    }

    let has_dc = rdns.iter().any(|rdn| {
        rdn.split_once('=')
            .is_some_and(|(kind, _)| kind.trim().eq_ignore_ascii_case("dc"))
    });
    if !has_dc {
        return None;
    }

    parent_dn(identity)
}

/// Drop the leading RDN. `None` when there is nothing left.
pub fn parent_dn(dn: &str) -> Option<String> {
    let split_at = first_unescaped_comma(dn)?;
    let parent = dn[split_at + 1..].trim();
    (!parent.is_empty()).then(|| parent.to_string())
}

fn split_rdns(dn: &str) -> Vec<&str> {
    let mut rdns = Vec::new();
    let mut rest = dn;
    while let Some(index) = first_unescaped_comma(rest) {
        rdns.push(rest[..index].trim());
        rest = &rest[index + 1..];
    }
    rdns.push(rest.trim());
    rdns.retain(|rdn| !rdn.is_empty());
    rdns
}

fn first_unescaped_comma(dn: &str) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => return Some(index),
            _ => {}
        }
    }
    None
}
