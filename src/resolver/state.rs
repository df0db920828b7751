//! Per-call resolution state and circular dependency detection.

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::event::EventRef;
use crate::key::{CacheKey, ProviderKey};
use crate::lifecycle::LifecycleManager;
use crate::value::{ContextData, Resolved};

/// State of one top-level `resolve_all` call.
///
/// Created fresh for every call and threaded through the recursion, so
/// concurrent cycles never observe each other's in-flight providers.
pub(crate) struct ResolutionState<'a> {
    pub(crate) event: EventRef,
    pub(crate) data: &'a ContextData,
    pub(crate) cache_key: CacheKey,
    pub(crate) resolved: Resolved,
    pub(crate) lifecycle: &'a mut LifecycleManager,
    // Providers currently being computed, outermost first.
    resolving: SmallVec<[ProviderKey; 8]>,
    max_depth: usize,
}

impl<'a> ResolutionState<'a> {
    pub(crate) fn new(
        event: EventRef,
        data: &'a ContextData,
        cache_key: CacheKey,
        lifecycle: &'a mut LifecycleManager,
        max_depth: usize,
    ) -> Self {
        Self {
            event,
            data,
            cache_key,
            resolved: Resolved::new(),
            lifecycle,
            resolving: SmallVec::new(),
            max_depth,
        }
    }

    /// Marks `provider` as resolving.
    ///
    /// Fails without side effects if the provider is already being resolved
    /// or the nesting limit is reached.
    pub(crate) fn enter(&mut self, provider: ProviderKey) -> DiResult<()> {
        // Circular detection BEFORE pushing the new provider
        if self.resolving.iter().any(|p| *p == provider) {
            let mut path: Vec<&'static str> = self.resolving.iter().map(|p| p.name()).collect();
            path.push(provider.name());
            return Err(DiError::Circular { provider: provider.name(), path });
        }

        if self.resolving.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(self.max_depth));
        }

        self.resolving.push(provider);
        Ok(())
    }

    /// Unmarks `provider`; must pair with a successful [`enter`](Self::enter).
    pub(crate) fn leave(&mut self, provider: ProviderKey) {
        let last = self.resolving.pop();
        debug_assert_eq!(last, Some(provider));
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.resolving.is_empty()
    }

    pub(crate) fn into_resolved(self) -> Resolved {
        self.resolved
    }
}
