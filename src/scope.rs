//! Dependency scope definitions.

/// Scopes controlling how long a resolved value is reused
///
/// The scope is chosen per dependency marker, not per provider: the same
/// provider may be requested as a singleton in one place and as transient in
/// another, and each scope keeps its own cache slot.
///
/// # Examples
///
/// ```rust
/// use event_di::{CacheKey, CacheRegistry, Provider, Scope, Value};
///
/// let provider = Provider::value("settings", |_| Ok("prod".to_string())).build();
/// let registry = CacheRegistry::new();
/// let value = Value::new("prod".to_string());
///
/// // Singleton: the cache key is ignored
/// registry.set(provider.key(), value.clone(), Scope::Singleton, &CacheKey::from("user_1"));
/// assert!(registry.get(provider.key(), Scope::Singleton, &CacheKey::from("user_2")).is_some());
///
/// // Transient: nothing is ever stored
/// registry.set(provider.key(), value, Scope::Transient, &CacheKey::from("user_1"));
/// assert!(registry.get(provider.key(), Scope::Transient, &CacheKey::from("user_1")).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Scope {
    /// One value per provider for the whole process
    ///
    /// Concurrent first resolutions of the same singleton are not serialized;
    /// the provider may run more than once and the last write wins.
    Singleton,
    /// One value per provider and cache key
    ///
    /// Events from the same sender share the value; events from different
    /// senders never see each other's values.
    #[default]
    Request,
    /// Recomputed on every resolution, never cached
    Transient,
}

impl Scope {
    /// Returns true if values of this scope are written to the cache.
    #[inline]
    pub fn is_cached(self) -> bool {
        !matches!(self, Scope::Transient)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scope::Singleton => "singleton",
            Scope::Request => "request",
            Scope::Transient => "transient",
        };
        f.write_str(name)
    }
}
