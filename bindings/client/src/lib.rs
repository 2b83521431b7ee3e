mod session;

pub mod prelude {
    pub use crate::session::LdapSessionInstrumented as LdapSession;

    // Types defined in ldap3 that appear in the session API are re-exported here so that users of
    // this wrapper do not need to depend on ldap3 directly.
    pub use ldap3::{LdapError, LdapResult, Scope, SearchEntry};
}
