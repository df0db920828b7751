//! Scope-aware cache of resolved values.

use parking_lot::RwLock;

use crate::config::ResolverConfig;
use crate::event::Event;
use crate::key::{CacheKey, ProviderKey};
use crate::scope::Scope;
use crate::value::Value;

#[cfg(feature = "ahash")]
type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
type Map<K, V> = std::collections::HashMap<K, V>;

/// Process-wide store of resolved values keyed by provider, scope and cache key.
///
/// - **Singleton** entries have one slot per provider; the cache key is
///   ignored on both read and write.
/// - **Request** entries are keyed by `(provider, cache key)`.
/// - **Transient** entries are never stored.
///
/// Locks are held only for the duration of a single map operation, never
/// across a provider invocation, so concurrent cycles never block each other
/// on a slow provider.
///
/// # Examples
///
/// ```
/// use event_di::{CacheKey, CacheRegistry, Provider, Scope, Value};
///
/// let provider = Provider::value("get_service", |_| Ok(0u8)).build();
/// let registry = CacheRegistry::new();
///
/// registry.set(provider.key(), Value::new("v1"), Scope::Request, &CacheKey::from("user_1"));
/// registry.set(provider.key(), Value::new("v2"), Scope::Request, &CacheKey::from("user_2"));
///
/// let v1 = registry.get(provider.key(), Scope::Request, &CacheKey::from("user_1")).unwrap();
/// assert_eq!(*v1.downcast::<&str>().unwrap(), "v1");
/// ```
#[derive(Debug)]
pub struct CacheRegistry {
    config: ResolverConfig,
    singletons: RwLock<Map<ProviderKey, Value>>,
    requests: RwLock<Map<CacheKey, Map<ProviderKey, Value>>>,
}

impl CacheRegistry {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    /// Creates an empty registry with the given configuration.
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            singletons: RwLock::new(Map::default()),
            requests: RwLock::new(Map::default()),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Derives the REQUEST cache key from the sender identity of `event`.
    ///
    /// Prefers the user id, then the chat id, then the global token. The
    /// result depends only on those two fields.
    ///
    /// ```
    /// use event_di::{CacheRegistry, SenderEvent};
    ///
    /// let registry = CacheRegistry::new();
    /// assert_eq!(registry.derive_cache_key(&SenderEvent::from_user(123)).as_str(), "user_123");
    /// assert_eq!(registry.derive_cache_key(&SenderEvent::in_chat(456)).as_str(), "chat_456");
    /// assert_eq!(registry.derive_cache_key(&SenderEvent::anonymous()).as_str(), "global");
    /// ```
    pub fn derive_cache_key(&self, event: &dyn Event) -> CacheKey {
        if let Some(user_id) = event.from_user_id() {
            CacheKey::new(format!("{}{}", self.config.user_key_prefix, user_id))
        } else if let Some(chat_id) = event.chat_id() {
            CacheKey::new(format!("{}{}", self.config.chat_key_prefix, chat_id))
        } else {
            CacheKey::new(self.config.global_cache_key.clone())
        }
    }

    /// Looks up a cached value.
    pub fn get(&self, provider: ProviderKey, scope: Scope, key: &CacheKey) -> Option<Value> {
        match scope {
            Scope::Transient => None,
            Scope::Singleton => self.singletons.read().get(&provider).cloned(),
            Scope::Request => self.requests.read().get(key)?.get(&provider).cloned(),
        }
    }

    /// Stores a value; a no-op for TRANSIENT scope.
    pub fn set(&self, provider: ProviderKey, value: Value, scope: Scope, key: &CacheKey) {
        match scope {
            Scope::Transient => {}
            Scope::Singleton => {
                self.singletons.write().insert(provider, value);
            }
            Scope::Request => {
                self.requests
                    .write()
                    .entry(key.clone())
                    .or_default()
                    .insert(provider, value);
            }
        }
    }

    /// Removes a single entry, returning it.
    pub fn remove(&self, provider: ProviderKey, scope: Scope, key: &CacheKey) -> Option<Value> {
        match scope {
            Scope::Transient => None,
            Scope::Singleton => self.singletons.write().remove(&provider),
            Scope::Request => {
                let mut requests = self.requests.write();
                let slot = requests.get_mut(key)?;
                let removed = slot.remove(&provider);
                if slot.is_empty() {
                    requests.remove(key);
                }
                removed
            }
        }
    }

    /// Drops every REQUEST entry of one cache key, returning how many were removed.
    ///
    /// Hosts call this to close a request boundary, e.g. when a conversation
    /// ends; singleton entries are untouched.
    pub fn evict_request(&self, key: &CacheKey) -> usize {
        self.requests.write().remove(key).map_or(0, |slot| slot.len())
    }

    /// Drops every cached value.
    pub fn clear(&self) {
        self.singletons.write().clear();
        self.requests.write().clear();
    }

    /// Number of cached values across all scopes and keys.
    pub fn len(&self) -> usize {
        let requests: usize = self.requests.read().values().map(|slot| slot.len()).sum();
        self.singletons.read().len() + requests
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
