//! Host integration: resolve, run the handler, always tear down.

use std::future::Future;
use std::sync::Arc;

use crate::depends::Target;
use crate::error::DiError;
use crate::event::EventRef;
use crate::lifecycle::{LifecycleManager, TeardownReport};
use crate::observer::DiObserver;
use crate::registry::CacheRegistry;
use crate::resolver::Resolver;
use crate::value::ContextData;

/// Wraps handler invocation with dependency resolution and resource cleanup.
///
/// For every event, [`dispatch`](DependencyMiddleware::dispatch) resolves the
/// target's dependencies, merges them into the context data, runs the handler
/// and then finalizes every resource opened for the cycle. Teardown runs on
/// every exit path, including resolution failures, and never changes the
/// handler's outcome; its report goes to the resolver's observers.
///
/// # Examples
///
/// ```
/// use event_di::{
///     ContextData, DependencyMiddleware, DiError, Depends, EventRef, Provider, SenderEvent,
///     Target,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), DiError> {
/// let get_test_service = Provider::value("get_test_service", |_| Ok("injected_service".to_string())).build();
/// let handler = Target::new("echo").depends("service", Depends::on(&get_test_service));
///
/// let middleware = DependencyMiddleware::new();
/// let event: EventRef = Arc::new(SenderEvent::from_user(123));
/// let mut data = ContextData::new();
///
/// let reply = middleware
///     .dispatch(&handler, event, &mut data, |_event, data| async move {
///         let service = data.get_as::<String>("service")?.unwrap();
///         Ok::<_, DiError>(format!("handled by {service}"))
///     })
///     .await?;
///
/// assert_eq!(reply, "handled by injected_service");
/// assert!(data.contains("service"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DependencyMiddleware {
    resolver: Resolver,
}

impl DependencyMiddleware {
    /// Middleware with its own fresh cache registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(CacheRegistry::new()))
    }

    /// Middleware over a shared cache registry.
    pub fn with_registry(registry: Arc<CacheRegistry>) -> Self {
        Self::with_resolver(Resolver::new(registry))
    }

    /// Middleware around an existing resolver.
    pub fn with_resolver(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Attaches an observer to the underlying resolver.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.resolver.add_observer(observer);
        self
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The shared cache registry.
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        self.resolver.registry()
    }

    /// Resolves `target`'s dependencies into `data`, runs `handler`, and
    /// tears down the cycle's resources.
    ///
    /// Resolution failures are converted into the handler's error type and
    /// the handler is not run. Targets without markers leave `data`
    /// untouched.
    pub async fn dispatch<T, E, H, Fut>(
        &self,
        target: &Target,
        event: EventRef,
        data: &mut ContextData,
        handler: H,
    ) -> Result<T, E>
    where
        H: FnOnce(EventRef, ContextData) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DiError>,
    {
        let mut lifecycle = LifecycleManager::new();

        let outcome = match self.prepare(target, &event, data, &mut lifecycle).await {
            Ok(()) => handler(event, data.clone()).await,
            Err(err) => Err(E::from(err)),
        };

        let report = lifecycle.teardown_all().await;
        self.report(report);
        outcome
    }

    async fn prepare(
        &self,
        target: &Target,
        event: &EventRef,
        data: &mut ContextData,
        lifecycle: &mut LifecycleManager,
    ) -> Result<(), DiError> {
        if !target.has_dependencies() {
            return Ok(());
        }
        let resolved = self.resolver.resolve_all(target, event, data, lifecycle).await?;
        data.merge(resolved);
        Ok(())
    }

    fn report(&self, report: TeardownReport) {
        self.resolver.observers().teardown_completed(&report);
        if let Some(err) = report.into_error() {
            tracing::warn!(error = %err, "teardown failures ignored");
        }
    }
}

impl Default for DependencyMiddleware {
    fn default() -> Self {
        Self::new()
    }
}
