//! Identity types used for caching and resource tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a provider.
///
/// Every built [`Provider`](crate::Provider) receives a process-unique id. The
/// id is the resolution unit: two markers pointing at the same provider are the
/// same dependency, while two providers that merely share a name are not.
/// The name is kept for diagnostics only.
///
/// # Examples
///
/// ```rust
/// use event_di::Provider;
///
/// let a = Provider::value("get_db", |_| Ok(1u32)).build();
/// let b = Provider::value("get_db", |_| Ok(1u32)).build();
///
/// assert_eq!(a.key().name(), b.key().name());
/// assert_ne!(a.key(), b.key());
/// assert_eq!(a.key(), a.clone().key());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ProviderKey {
    id: u64,
    name: &'static str,
}

impl ProviderKey {
    pub(crate) fn next(name: &'static str) -> Self {
        Self {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
            name,
        }
    }

    /// Diagnostic name of the provider.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Process-unique numeric id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

// Identity is the id alone; the name is diagnostic.
impl PartialEq for ProviderKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProviderKey {}

impl std::hash::Hash for ProviderKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Request boundary for REQUEST-scoped caching.
///
/// Derived from the sender identity of an event by
/// [`CacheRegistry::derive_cache_key`](crate::CacheRegistry::derive_cache_key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a cache key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an open resource handle within one resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleId {
    /// Provider that opened the resource
    pub provider: ProviderKey,
    /// Cache key of the cycle that opened it
    pub cache_key: CacheKey,
}

impl HandleId {
    /// Creates a handle identity.
    pub fn new(provider: ProviderKey, cache_key: CacheKey) -> Self {
        Self { provider, cache_key }
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.provider.name(), self.cache_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn provider_keys_are_unique_per_allocation() {
        let a = ProviderKey::next("dep");
        let b = ProviderKey::next("dep");
        assert_ne!(a, b);
        assert!(b.id() > a.id());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
    }

    #[test]
    fn handle_id_display() {
        let provider = ProviderKey::next("get_session");
        let id = HandleId::new(provider, CacheKey::from("user_7"));
        assert_eq!(id.to_string(), "get_session@user_7");
    }
}
