//! Names of the checks and operations recorded by the LDAP behaviours.

/// Recorded once per bind attempt in load mode.
pub const BIND_SUCCESS: &str = "bind success";

/// Passes when the target rejects an anonymous bind.
pub const ANONYMOUS_BIND_ALERT: &str = "Security Alert: Anonymous Bind Enabled";

/// Recorded, as a passing informational check, when the root DSE can be read without binding.
pub const ROOT_DSE_EXPOSED: &str = "Info: RootDSE Exposed";

/// Timing of one whole load iteration, from dial to release.
pub const ITERATION_OPERATION: &str = "iteration";

/// Timing of a workload search as reported by the instrumented client.
pub const SEARCH_OPERATION: &str = "ldap_search";

/// Timing of a root DSE read, used for scope discovery and the audit. Kept apart from
/// [SEARCH_OPERATION] so the search latency threshold only sees the workload.
pub const ROOT_DSE_OPERATION: &str = "ldap_read_root_dse";
