//! Email -> remote user ID cache.
//!
//! The cache only holds mappings the owning adapter has observed itself, via
//! a fetch or an add. A missing entry means "not learned yet", never "not a
//! member". It lives as long as the adapter and is never persisted.

use std::collections::HashMap;

use crate::types::RemoteUserId;

#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    entries: HashMap<String, RemoteUserId>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping, overwriting any stale entry for the email.
    pub fn insert(&mut self, email: impl Into<String>, id: RemoteUserId) {
        self.entries.insert(email.into(), id);
    }

    pub fn get(&self, email: &str) -> Option<&RemoteUserId> {
        self.entries.get(email)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries.contains_key(email)
    }

    /// Drop a single mapping. Returns the evicted ID, if any.
    pub fn evict(&mut self, email: &str) -> Option<RemoteUserId> {
        self.entries.remove(email)
    }

    /// Discard every mapping.
    pub fn reset(&mut self) {
        self.entries = HashMap::new();
    }

    /// Replace the whole cache with a freshly observed membership.
    pub fn replace_with(&mut self, entries: HashMap<String, RemoteUserId>) {
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
