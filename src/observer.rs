//! Diagnostic observers for resolution traceability.
//!
//! Observers receive resolution and teardown events for one resolver. They
//! are the hook for metrics and for surfacing teardown failures to the host
//! without turning them into request failures.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::{CacheKey, ProviderKey};
use crate::lifecycle::TeardownReport;
use crate::scope::Scope;

/// Observer trait for resolution events.
///
/// All methods except [`resolving`](DiObserver::resolving) and
/// [`resolved`](DiObserver::resolved) have empty default implementations.
///
/// # Performance
///
/// Observer calls are made synchronously during resolution. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use event_di::{CacheKey, DiObserver, ProviderKey, TeardownReport};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct TeardownAlarm {
///     failed_cycles: AtomicUsize,
/// }
///
/// impl DiObserver for TeardownAlarm {
///     fn resolving(&self, _provider: &ProviderKey, _cache_key: &CacheKey) {}
///     fn resolved(&self, _provider: &ProviderKey, _duration: Duration) {}
///
///     fn teardown_completed(&self, report: &TeardownReport) {
///         if !report.is_clean() {
///             self.failed_cycles.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a provider is invoked (after cache and cycle checks).
    fn resolving(&self, provider: &ProviderKey, cache_key: &CacheKey);

    /// Called after a provider produced its value.
    fn resolved(&self, provider: &ProviderKey, duration: Duration);

    /// Called when a cached value is returned without invoking the provider.
    fn cache_hit(&self, _provider: &ProviderKey, _scope: Scope) {}

    /// Called when resolving a provider failed.
    fn resolution_failed(&self, _provider: &ProviderKey, _error: &DiError) {}

    /// Called after a cycle's teardown, clean or not.
    fn teardown_completed(&self, _report: &TeardownReport) {}
}

/// Container for registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, provider: &ProviderKey, cache_key: &CacheKey) {
        for observer in &self.observers {
            observer.resolving(provider, cache_key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, provider: &ProviderKey, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(provider, duration);
        }
    }

    #[inline]
    pub(crate) fn cache_hit(&self, provider: &ProviderKey, scope: Scope) {
        for observer in &self.observers {
            observer.cache_hit(provider, scope);
        }
    }

    #[inline]
    pub(crate) fn resolution_failed(&self, provider: &ProviderKey, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(provider, error);
        }
    }

    pub(crate) fn teardown_completed(&self, report: &TeardownReport) {
        for observer in &self.observers {
            observer.teardown_completed(report);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// # Examples
///
/// ```
/// use event_di::{CacheRegistry, Resolver, TracingObserver};
/// use std::sync::Arc;
///
/// let mut resolver = Resolver::new(Arc::new(CacheRegistry::new()));
/// resolver.add_observer(Arc::new(TracingObserver::new()));
/// ```
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates the observer.
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, provider: &ProviderKey, cache_key: &CacheKey) {
        tracing::debug!(provider = provider.name(), cache_key = %cache_key, "resolving");
    }

    fn resolved(&self, provider: &ProviderKey, duration: Duration) {
        tracing::debug!(provider = provider.name(), ?duration, "resolved");
    }

    fn cache_hit(&self, provider: &ProviderKey, scope: Scope) {
        tracing::trace!(provider = provider.name(), %scope, "cache hit");
    }

    fn resolution_failed(&self, provider: &ProviderKey, error: &DiError) {
        tracing::error!(provider = provider.name(), error = %error, "resolution failed");
    }

    fn teardown_completed(&self, report: &TeardownReport) {
        for failure in &report.failures {
            tracing::warn!(handle = %failure.handle, error = %failure.error, "teardown failure");
        }
    }
}
