//! Providers: the callables that produce dependency values.
//!
//! A provider is built once, at composition time, with its shape and its own
//! parameter list declared explicitly. The resulting `Arc<Provider>` is what
//! dependency markers point at; its [`ProviderKey`] is the cache and cycle
//! detection identity.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::depends::{Depends, Param};
use crate::error::{BoxError, DiError, DiResult};
use crate::event::{Event, EventRef};
use crate::key::ProviderKey;
use crate::value::{ContextData, Value};

pub mod resource;
pub use resource::{
    AsyncContextManager, AsyncResourceGenerator, AsyncYielded, ContextManager, ResourceGenerator,
    Yielded,
};

/// Boxed, `Send` future used for asynchronous provider bodies and finalizers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type ValueFn = dyn Fn(Args) -> Result<Value, BoxError> + Send + Sync;
type AsyncValueFn = dyn Fn(Args) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync;
type GeneratorFn = dyn Fn(Args) -> Result<Box<dyn ResourceGenerator>, BoxError> + Send + Sync;
type AsyncGeneratorFn =
    dyn Fn(Args) -> Result<Box<dyn AsyncResourceGenerator>, BoxError> + Send + Sync;
type ContextFn = dyn Fn(Args) -> Result<Box<dyn ContextManager>, BoxError> + Send + Sync;
type AsyncContextFn = dyn Fn(Args) -> Result<Box<dyn AsyncContextManager>, BoxError> + Send + Sync;

/// The six provider shapes, fixed when the provider is built.
pub(crate) enum ProviderKind {
    Value(Box<ValueFn>),
    AsyncValue(Box<AsyncValueFn>),
    Generator(Box<GeneratorFn>),
    AsyncGenerator(Box<AsyncGeneratorFn>),
    ContextManager(Box<ContextFn>),
    AsyncContextManager(Box<AsyncContextFn>),
}

/// Shape of a provider, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderShape {
    /// Synchronous, returns a value
    Value,
    /// Asynchronous, returns a value
    AsyncValue,
    /// Synchronous resource generator
    Generator,
    /// Asynchronous resource generator
    AsyncGenerator,
    /// Returns a synchronous context manager
    ContextManager,
    /// Returns an asynchronous context manager
    AsyncContextManager,
}

impl ProviderShape {
    /// Returns true for shapes that open a resource needing finalization.
    pub fn is_resource(self) -> bool {
        !matches!(self, ProviderShape::Value | ProviderShape::AsyncValue)
    }
}

impl ProviderKind {
    fn shape(&self) -> ProviderShape {
        match self {
            ProviderKind::Value(_) => ProviderShape::Value,
            ProviderKind::AsyncValue(_) => ProviderShape::AsyncValue,
            ProviderKind::Generator(_) => ProviderShape::Generator,
            ProviderKind::AsyncGenerator(_) => ProviderShape::AsyncGenerator,
            ProviderKind::ContextManager(_) => ProviderShape::ContextManager,
            ProviderKind::AsyncContextManager(_) => ProviderShape::AsyncContextManager,
        }
    }
}

/// A dependency provider.
///
/// # Examples
///
/// ```
/// use event_di::{Depends, Provider, Scope};
///
/// struct Database { url: String }
/// struct UserService { db: std::sync::Arc<Database> }
///
/// let get_database = Provider::value("get_database", |_| {
///     Ok(Database { url: "postgres://localhost".to_string() })
/// })
/// .build();
///
/// let get_user_service = Provider::value("get_user_service", |args| {
///     Ok(UserService { db: args.required::<Database>("db")? })
/// })
/// .depends("db", Depends::new(get_database.clone(), Scope::Singleton))
/// .build();
///
/// assert_eq!(get_user_service.params().len(), 1);
/// assert!(!get_user_service.shape().is_resource());
/// ```
pub struct Provider {
    key: ProviderKey,
    params: Vec<Param>,
    kind: ProviderKind,
}

impl Provider {
    /// Synchronous value-returning provider.
    pub fn value<T, F>(name: &'static str, f: F) -> ProviderBuilder
    where
        T: Any + Send + Sync,
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new(name, ProviderKind::Value(Box::new(move |args: Args| f(args).map(Value::new))))
    }

    /// Asynchronous value-returning provider.
    ///
    /// ```
    /// use event_di::Provider;
    ///
    /// let get_token = Provider::async_value("get_token", |_args| async move {
    ///     Ok("secret".to_string())
    /// })
    /// .build();
    /// ```
    pub fn async_value<T, F, Fut>(name: &'static str, f: F) -> ProviderBuilder
    where
        T: Any + Send + Sync,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        ProviderBuilder::new(
            name,
            ProviderKind::AsyncValue(Box::new(move |args: Args| -> BoxFuture<'static, Result<Value, BoxError>> {
                let fut = f(args);
                Box::pin(async move { fut.await.map(Value::new) })
            })),
        )
    }

    /// Synchronous resource generator provider.
    pub fn generator<G, F>(name: &'static str, f: F) -> ProviderBuilder
    where
        G: ResourceGenerator + 'static,
        F: Fn(Args) -> Result<G, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new(
            name,
            ProviderKind::Generator(Box::new(move |args: Args| {
                f(args).map(|g| Box::new(g) as Box<dyn ResourceGenerator>)
            })),
        )
    }

    /// Asynchronous resource generator provider.
    pub fn async_generator<G, F>(name: &'static str, f: F) -> ProviderBuilder
    where
        G: AsyncResourceGenerator + 'static,
        F: Fn(Args) -> Result<G, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new(
            name,
            ProviderKind::AsyncGenerator(Box::new(move |args: Args| {
                f(args).map(|g| Box::new(g) as Box<dyn AsyncResourceGenerator>)
            })),
        )
    }

    /// Provider returning a synchronous context manager.
    pub fn context_manager<C, F>(name: &'static str, f: F) -> ProviderBuilder
    where
        C: ContextManager + 'static,
        F: Fn(Args) -> Result<C, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new(
            name,
            ProviderKind::ContextManager(Box::new(move |args: Args| {
                f(args).map(|c| Box::new(c) as Box<dyn ContextManager>)
            })),
        )
    }

    /// Provider returning an asynchronous context manager.
    pub fn async_context_manager<C, F>(name: &'static str, f: F) -> ProviderBuilder
    where
        C: AsyncContextManager + 'static,
        F: Fn(Args) -> Result<C, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new(
            name,
            ProviderKind::AsyncContextManager(Box::new(move |args: Args| {
                f(args).map(|c| Box::new(c) as Box<dyn AsyncContextManager>)
            })),
        )
    }

    /// Identity of this provider.
    #[inline]
    pub fn key(&self) -> ProviderKey {
        self.key
    }

    /// Diagnostic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The provider's shape.
    pub fn shape(&self) -> ProviderShape {
        self.kind.shape()
    }

    pub(crate) fn kind(&self) -> &ProviderKind {
        &self.kind
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("shape", &self.shape())
            .field("params", &self.params)
            .finish()
    }
}

/// Builder declaring a provider's parameters.
pub struct ProviderBuilder {
    name: &'static str,
    params: Vec<Param>,
    kind: ProviderKind,
}

impl ProviderBuilder {
    fn new(name: &'static str, kind: ProviderKind) -> Self {
        Self { name, params: Vec::new(), kind }
    }

    /// Declares a plain parameter, supplied from the reserved names, the
    /// context data, or values resolved earlier in the same batch.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::plain(name));
        self
    }

    /// Declares a parameter carrying a dependency marker.
    pub fn depends(mut self, name: impl Into<String>, marker: Depends) -> Self {
        self.params.push(Param::with_marker(name, marker));
        self
    }

    /// Finishes the provider, assigning its identity.
    pub fn build(self) -> Arc<Provider> {
        Arc::new(Provider {
            key: ProviderKey::next(self.name),
            params: self.params,
            kind: self.kind,
        })
    }
}

/// Arguments assembled for one provider invocation.
///
/// Only declared parameters are present. The reserved `event` and `data`
/// parameters are exposed through [`event`](Args::event) and
/// [`data`](Args::data).
pub struct Args {
    provider: &'static str,
    event: Option<EventRef>,
    data: Option<ContextData>,
    values: HashMap<String, Value>,
}

impl Args {
    pub(crate) fn new(provider: &'static str) -> Self {
        Self {
            provider,
            event: None,
            data: None,
            values: HashMap::new(),
        }
    }

    pub(crate) fn set_event(&mut self, event: EventRef) {
        self.event = Some(event);
    }

    pub(crate) fn set_data(&mut self, data: ContextData) {
        self.data = Some(data);
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Name of the provider being invoked.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// The triggering event, if the provider declared `event`.
    pub fn event(&self) -> Option<&EventRef> {
        self.event.as_ref()
    }

    /// The triggering event downcast to a concrete type.
    pub fn event_as<T: Event>(&self) -> Option<&T> {
        self.event.as_deref().and_then(|event| event.downcast_ref::<T>())
    }

    /// The full context mapping, if the provider declared `data`.
    pub fn data(&self) -> Option<&ContextData> {
        self.data.as_ref()
    }

    /// Raw value of a declared parameter.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true if the parameter was supplied.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Typed value of a parameter, `None` if absent, empty or of another type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values.get(name).and_then(Value::downcast::<T>)
    }

    /// Typed value of a parameter that must be present.
    pub fn required<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        let value = self
            .values
            .get(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DiError::MissingArgument {
                provider: self.provider,
                parameter: name.to_string(),
            })?;
        value.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
            parameter: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Args")
            .field("provider", &self.provider)
            .field("event", &self.event.is_some())
            .field("data", &self.data.is_some())
            .field("values", &names)
            .finish()
    }
}
