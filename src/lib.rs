//! # event-di
//!
//! Dependency injection for event-driven handler pipelines.
//!
//! Handlers and providers declare their parameters up front. Parameters
//! carrying a [`Depends`] marker are resolved per incoming event, recursively,
//! with scoped caching, circular dependency detection and guaranteed teardown
//! of every resource opened along the way.
//!
//! ## Features
//!
//! - **Three scopes**: Singleton, Request (keyed by the event's sender) and Transient
//! - **Six provider shapes**: sync/async values, sync/async generators, sync/async context managers
//! - **Circular dependency detection**: per-call, with the full provider path in the error
//! - **Guaranteed teardown**: LIFO, exactly once, even when the handler or a sibling provider fails
//! - **Runtime agnostic**: any executor can drive the resolver futures
//!
//! ## Quick Start
//!
//! ```rust
//! use event_di::{ContextData, DependencyMiddleware, DiError, Depends, EventRef, Provider, Scope, SenderEvent, Target};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), DiError> {
//! // Declare providers
//! let get_database = Provider::value("get_database", |_| {
//!     Ok(Database { connection_string: "postgres://localhost".to_string() })
//! })
//! .build();
//!
//! let get_user_service = Provider::value("get_user_service", |args| {
//!     Ok(UserService { db: args.required::<Database>("db")? })
//! })
//! .depends("db", Depends::new(get_database.clone(), Scope::Singleton))
//! .build();
//!
//! // Declare the handler's parameters
//! let handler = Target::new("on_message")
//!     .param("event")
//!     .depends("users", Depends::on(&get_user_service));
//!
//! // Dispatch an event through the middleware
//! let middleware = DependencyMiddleware::new();
//! let event: EventRef = Arc::new(SenderEvent::from_user(123));
//! let mut data = ContextData::new();
//!
//! let url = middleware
//!     .dispatch(&handler, event, &mut data, |_event, data| async move {
//!         let users = data.get_as::<UserService>("users")?.unwrap();
//!         Ok::<_, DiError>(users.db.connection_string.clone())
//!     })
//!     .await?;
//! assert_eq!(url, "postgres://localhost");
//! # Ok(())
//! # }
//! ```
//!
//! ## Scopes
//!
//! - **Singleton**: computed once, shared by every event
//! - **Request**: computed once per cache key (`user_{id}`, else `chat_{id}`, else `global`)
//! - **Transient**: computed on every resolution, never cached
//!
//! ## Resources
//!
//! Generator and context-manager providers open a resource whose value is
//! injected and whose finalize step runs after the handler returns:
//!
//! ```rust
//! use event_di::{ContextData, Depends, EventRef, LifecycleManager, Provider, Resolver, CacheRegistry, SenderEvent, Target, Yielded};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), event_di::DiError> {
//! let committed = Arc::new(AtomicBool::new(false));
//! let flag = committed.clone();
//!
//! let get_transaction = Provider::generator("get_transaction", move |_| {
//!     let flag = flag.clone();
//!     Ok(Yielded::new("tx-1".to_string(), move || {
//!         flag.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }))
//! })
//! .build();
//!
//! let handler = Target::new("transfer").depends("tx", Depends::on(&get_transaction));
//! let resolver = Resolver::new(Arc::new(CacheRegistry::new()));
//! let event: EventRef = Arc::new(SenderEvent::from_user(7));
//! let mut lifecycle = LifecycleManager::new();
//!
//! let resolved = resolver.resolve_all(&handler, &event, &ContextData::new(), &mut lifecycle).await?;
//! assert_eq!(*resolved["tx"].downcast::<String>().unwrap(), "tx-1");
//! assert!(!committed.load(Ordering::SeqCst));
//!
//! let report = lifecycle.teardown_all().await;
//! assert!(report.is_clean());
//! assert!(committed.load(Ordering::SeqCst));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod depends;
pub mod error;
pub mod event;
pub mod key;
pub mod lifecycle;
pub mod middleware;
pub mod observer;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod value;

// Re-export core types
pub use config::{ConfigSource, EnvironmentConfigSource, MapConfigSource, ResolverConfig};
pub use depends::{Depends, Param, ProviderSlot, Target, DATA_PARAM, EVENT_PARAM};
pub use error::{BoxError, DiError, DiResult};
pub use event::{Event, EventRef, SenderEvent};
pub use key::{CacheKey, HandleId, ProviderKey};
pub use lifecycle::{ActiveHandle, LifecycleManager, TeardownError, TeardownFailure, TeardownReport};
pub use middleware::DependencyMiddleware;
pub use observer::{DiObserver, TracingObserver};
pub use provider::{
    Args, AsyncContextManager, AsyncResourceGenerator, AsyncYielded, BoxFuture, ContextManager,
    Provider, ProviderBuilder, ProviderShape, ResourceGenerator, Yielded,
};
pub use registry::CacheRegistry;
pub use resolver::Resolver;
pub use scope::Scope;
pub use value::{ContextData, Resolved, Value};
