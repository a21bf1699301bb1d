//! Deterministic cache key derivation.
//!
//! One logical entry occupies three keys in the store: the payload, its
//! metadata, and a short-lived refresh lock. Key construction is pure string
//! assembly, collision-free as long as (tenant, client) pairs are unique.

use std::fmt;

/// The multi-tenant isolation pair identifying one cache slot owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub tenant: String,
    pub client: String,
}

impl Scope {
    pub fn new(tenant: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            client: client.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.client)
    }
}

/// The three store keys backing one logical cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    pub payload: String,
    pub meta: String,
    pub lock: String,
}

/// Derive the key set for `(namespace, resource, tenant, client)`.
pub fn key_set(namespace: &str, resource: &str, scope: &Scope) -> KeySet {
    KeySet {
        payload: format!(
            "{}:{}:{}:{}",
            namespace, resource, scope.tenant, scope.client
        ),
        meta: format!(
            "{}:{}:meta:{}:{}",
            namespace, resource, scope.tenant, scope.client
        ),
        lock: format!(
            "{}:{}:lock:{}:{}",
            namespace, resource, scope.tenant, scope.client
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_store_conventions() {
        let scope = Scope::new("t1", "c1");
        let keys = key_set("muninn", "chats", &scope);

        assert_eq!(keys.payload, "muninn:chats:t1:c1");
        assert_eq!(keys.meta, "muninn:chats:meta:t1:c1");
        assert_eq!(keys.lock, "muninn:chats:lock:t1:c1");
    }

    #[test]
    fn distinct_scopes_get_distinct_keys() {
        let a = key_set("muninn", "chats", &Scope::new("t1", "c1"));
        let b = key_set("muninn", "chats", &Scope::new("t1", "c2"));
        let c = key_set("muninn", "chats", &Scope::new("t2", "c1"));

        assert_ne!(a.payload, b.payload);
        assert_ne!(a.payload, c.payload);
        assert_ne!(b.payload, c.payload);
    }

    #[test]
    fn derivation_is_deterministic() {
        let scope = Scope::new("t1", "c1");
        assert_eq!(
            key_set("muninn", "chats", &scope),
            key_set("muninn", "chats", &scope)
        );
    }
}
