//! The dependency resolver.
//!
//! Walks a target's declared parameters, resolves each dependency marker
//! (recursing into the provider's own parameters first), caches values per
//! scope and hands every opened resource to the cycle's
//! [`LifecycleManager`].

use std::sync::Arc;
use std::time::Instant;

use crate::depends::{Depends, Target, DATA_PARAM, EVENT_PARAM};
use crate::error::{BoxError, DiError, DiResult};
use crate::event::EventRef;
use crate::key::{CacheKey, HandleId};
use crate::lifecycle::{ActiveHandle, LifecycleManager};
use crate::observer::{DiObserver, Observers};
use crate::provider::{Args, BoxFuture, Provider, ProviderKind};
use crate::registry::CacheRegistry;
use crate::scope::Scope;
use crate::value::{ContextData, Resolved, Value};

mod state;
use state::ResolutionState;

/// Resolves dependency markers into values.
///
/// A resolver is shared by all cycles: it holds the [`CacheRegistry`] and the
/// observers, nothing else. All per-cycle state is created inside each
/// [`resolve_all`](Resolver::resolve_all) call, and opened resources go to the
/// caller's [`LifecycleManager`].
///
/// # Examples
///
/// ```
/// use event_di::{
///     CacheRegistry, ContextData, Depends, EventRef, LifecycleManager, Provider, Resolver,
///     SenderEvent, Target,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), event_di::DiError> {
/// let get_database = Provider::value("get_database", |_| Ok("database_connection".to_string())).build();
/// let get_user_service = Provider::value("get_user_service", |args| {
///     let db = args.required::<String>("db")?;
///     Ok(format!("user_service_with_{db}"))
/// })
/// .depends("db", Depends::on(&get_database))
/// .build();
///
/// let handler = Target::new("on_message")
///     .param("event")
///     .depends("user_service", Depends::on(&get_user_service));
///
/// let resolver = Resolver::new(Arc::new(CacheRegistry::new()));
/// let event: EventRef = Arc::new(SenderEvent::from_user(123));
/// let mut lifecycle = LifecycleManager::new();
///
/// let resolved = resolver
///     .resolve_all(&handler, &event, &ContextData::new(), &mut lifecycle)
///     .await?;
/// let service = resolved["user_service"].downcast::<String>().unwrap();
/// assert_eq!(*service, "user_service_with_database_connection");
///
/// let _ = lifecycle.teardown_all().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<CacheRegistry>,
    observers: Observers,
}

impl Resolver {
    /// Creates a resolver over a shared cache registry.
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self {
            registry,
            observers: Observers::new(),
        }
    }

    /// Attaches an observer.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// The shared cache registry.
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.observers
    }

    /// The REQUEST cache key this resolver uses for `event`.
    pub fn cache_key_for(&self, event: &EventRef) -> CacheKey {
        self.registry.derive_cache_key(event.as_ref())
    }

    /// Resolves every marked parameter of `target`, in declaration order.
    ///
    /// Parameters without markers are skipped. A marker without a provider
    /// resolves to [`Value::empty`]. The first failure aborts the batch;
    /// resources opened before it remain registered with `lifecycle` and
    /// must still be torn down by the caller.
    pub async fn resolve_all(
        &self,
        target: &Target,
        event: &EventRef,
        data: &ContextData,
        lifecycle: &mut LifecycleManager,
    ) -> DiResult<Resolved> {
        let cache_key = self.cache_key_for(event);
        tracing::debug!(handler = target.name(), cache_key = %cache_key, "resolving handler dependencies");

        let max_depth = self.registry.config().max_depth;
        let mut state = ResolutionState::new(event.clone(), data, cache_key, lifecycle, max_depth);

        for (name, marker) in target.dependencies() {
            let value = match marker.provider() {
                Some(provider) => {
                    self.resolve_one(provider, marker.scope(), &mut state).await?
                }
                None => Value::empty(),
            };
            state.resolved.insert(name.to_string(), value);
        }

        debug_assert!(state.is_idle(), "resolving set leaked past resolve_all");
        Ok(state.into_resolved())
    }

    /// Resolves a single marker outside of any target.
    pub async fn resolve(
        &self,
        marker: &Depends,
        event: &EventRef,
        data: &ContextData,
        lifecycle: &mut LifecycleManager,
    ) -> DiResult<Value> {
        let Some(provider) = marker.provider() else {
            return Ok(Value::empty());
        };
        let cache_key = self.cache_key_for(event);
        let max_depth = self.registry.config().max_depth;
        let mut state = ResolutionState::new(event.clone(), data, cache_key, lifecycle, max_depth);
        self.resolve_one(provider, marker.scope(), &mut state).await
    }

    fn resolve_one<'s, 'a: 's>(
        &'s self,
        provider: Arc<Provider>,
        scope: Scope,
        state: &'s mut ResolutionState<'a>,
    ) -> BoxFuture<'s, DiResult<Value>> {
        Box::pin(async move {
            let key = provider.key();

            if let Some(cached) = self.registry.get(key, scope, &state.cache_key) {
                if self.observers.has_observers() {
                    self.observers.cache_hit(&key, scope);
                }
                return Ok(cached);
            }

            if let Err(err) = state.enter(key) {
                self.observers.resolution_failed(&key, &err);
                return Err(err);
            }
            let result = self.compute(&provider, scope, state).await;
            state.leave(key);
            result
        })
    }

    async fn compute(
        &self,
        provider: &Provider,
        scope: Scope,
        state: &mut ResolutionState<'_>,
    ) -> DiResult<Value> {
        let key = provider.key();
        let args = self.collect_args(provider, state).await?;

        self.observers.resolving(&key, &state.cache_key);
        let started = Instant::now();

        let value = match self.invoke(provider, args, state).await {
            Ok(value) => value,
            Err(err) => {
                self.observers.resolution_failed(&key, &err);
                return Err(err);
            }
        };

        // Only a generator that never yielded produces an empty value; it is not cached
        if !value.is_empty() {
            self.registry.set(key, value.clone(), scope, &state.cache_key);
        }

        let elapsed = started.elapsed();
        self.observers.resolved(&key, elapsed);
        tracing::trace!(provider = provider.name(), %scope, ?elapsed, "provider invoked");
        Ok(value)
    }

    /// Assembles the provider's arguments, resolving nested markers post-order.
    async fn collect_args(&self, provider: &Provider, state: &mut ResolutionState<'_>) -> DiResult<Args> {
        let mut args = Args::new(provider.name());

        for param in provider.params() {
            let name = param.name();
            if name == EVENT_PARAM {
                args.set_event(state.event.clone());
            } else if name == DATA_PARAM {
                args.set_data(state.data.clone());
            } else if let Some(value) = state.data.get(name) {
                args.insert(name, value.clone());
            } else if let Some(value) = state.resolved.get(name) {
                args.insert(name, value.clone());
            } else if let Some(marker) = param.marker() {
                let value = match marker.provider() {
                    Some(nested) => self.resolve_one(nested, marker.scope(), state).await?,
                    None => Value::empty(),
                };
                args.insert(name, value);
            }
        }

        Ok(args)
    }

    async fn invoke(
        &self,
        provider: &Provider,
        args: Args,
        state: &mut ResolutionState<'_>,
    ) -> DiResult<Value> {
        let name = provider.name();
        let failed = |err: BoxError| DiError::from_provider(name, err);
        let handle_id = HandleId::new(provider.key(), state.cache_key.clone());

        match provider.kind() {
            ProviderKind::Value(f) => f(args).map_err(failed),
            ProviderKind::AsyncValue(f) => f(args).await.map_err(failed),
            ProviderKind::Generator(f) => {
                let mut generator = f(args).map_err(failed)?;
                let Some(value) = generator.start().map_err(failed)? else {
                    tracing::warn!(provider = name, "generator finished without yielding a value");
                    return Ok(Value::empty());
                };
                state.lifecycle.register(handle_id, ActiveHandle::Generator(generator));
                Ok(value)
            }
            ProviderKind::AsyncGenerator(f) => {
                let mut generator = f(args).map_err(failed)?;
                let Some(value) = generator.start().await.map_err(failed)? else {
                    tracing::warn!(provider = name, "async generator finished without yielding a value");
                    return Ok(Value::empty());
                };
                state.lifecycle.register(handle_id, ActiveHandle::AsyncGenerator(generator));
                Ok(value)
            }
            ProviderKind::ContextManager(f) => {
                let mut context = f(args).map_err(failed)?;
                let value = context.enter().map_err(failed)?;
                state.lifecycle.register(handle_id, ActiveHandle::Context(context));
                Ok(value)
            }
            ProviderKind::AsyncContextManager(f) => {
                let mut context = f(args).map_err(failed)?;
                let value = context.enter().await.map_err(failed)?;
                state.lifecycle.register(handle_id, ActiveHandle::AsyncContext(context));
                Ok(value)
            }
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("observers", &self.observers.has_observers())
            .finish()
    }
}
