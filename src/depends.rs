//! Dependency markers and parameter descriptors.
//!
//! Handlers and providers declare their parameters explicitly when they are
//! composed. A parameter either carries a [`Depends`] marker, in which case the
//! resolver computes its value, or is plain and gets supplied from the
//! reserved names and the context.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::provider::Provider;
use crate::scope::Scope;

/// Reserved parameter name receiving the triggering event.
pub const EVENT_PARAM: &str = "event";

/// Reserved parameter name receiving the full context mapping.
pub const DATA_PARAM: &str = "data";

/// Dependency marker: a provider reference and a scope.
///
/// Two markers referring to the same `Arc<Provider>` are the same dependency.
///
/// # Examples
///
/// ```
/// use event_di::{Depends, Provider, Scope};
///
/// let get_config = Provider::value("get_config", |_| Ok(42u32)).build();
///
/// let default_scope = Depends::on(&get_config);
/// assert_eq!(default_scope.scope(), Scope::Request);
///
/// let singleton = Depends::on(&get_config).scoped(Scope::Singleton);
/// assert_eq!(singleton.scope(), Scope::Singleton);
///
/// assert!(Depends::empty().provider().is_none());
/// ```
#[derive(Clone)]
pub struct Depends {
    source: Source,
    scope: Scope,
}

#[derive(Clone)]
enum Source {
    Empty,
    Fixed(Arc<Provider>),
    Slot(ProviderSlot),
}

impl Depends {
    /// Marker for `provider` in the given scope.
    pub fn new(provider: Arc<Provider>, scope: Scope) -> Self {
        Self { source: Source::Fixed(provider), scope }
    }

    /// Marker for `provider` with the default REQUEST scope.
    pub fn on(provider: &Arc<Provider>) -> Self {
        Self::new(provider.clone(), Scope::default())
    }

    /// Marker for whatever provider `slot` is bound to at resolution time.
    pub fn late(slot: &ProviderSlot) -> Self {
        Self { source: Source::Slot(slot.clone()), scope: Scope::default() }
    }

    /// Marker without a provider; resolves to the empty value.
    pub fn empty() -> Self {
        Self { source: Source::Empty, scope: Scope::default() }
    }

    /// Replaces the scope.
    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// The provider reference, if any.
    ///
    /// An unbound slot, or one whose provider has been dropped, has no provider.
    pub fn provider(&self) -> Option<Arc<Provider>> {
        match &self.source {
            Source::Empty => None,
            Source::Fixed(provider) => Some(provider.clone()),
            Source::Slot(slot) => slot.get(),
        }
    }

    /// The scope.
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

/// Forward reference to a provider that is built later.
///
/// Providers are immutable once built, so a provider cannot name itself or
/// one built after it directly. A slot is created first, handed to
/// [`Depends::late`], and bound once the provider exists.
///
/// The slot holds the provider weakly, so a provider depending on its own
/// slot is still freed. Keep the provider alive elsewhere (usually through the
/// handler's marker); once it is dropped the slot resolves like an unbound one.
///
/// # Examples
///
/// ```
/// use event_di::{Depends, Provider, ProviderSlot};
///
/// let slot = ProviderSlot::new();
/// let get_node = Provider::value("get_node", |_| Ok(1u8))
///     .depends("parent", Depends::late(&slot))
///     .build();
///
/// assert!(slot.bind(&get_node));
/// assert!(!slot.bind(&get_node));
/// assert!(slot.get().is_some());
///
/// drop(get_node);
/// assert!(slot.get().is_none());
/// ```
#[derive(Clone, Default)]
pub struct ProviderSlot {
    cell: Arc<OnceCell<Weak<Provider>>>,
}

impl ProviderSlot {
    /// Creates an unbound slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the slot; returns false if it was already bound.
    pub fn bind(&self, provider: &Arc<Provider>) -> bool {
        self.cell.set(Arc::downgrade(provider)).is_ok()
    }

    /// The bound provider, if any and still alive.
    pub fn get(&self) -> Option<Arc<Provider>> {
        self.cell.get().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderSlot").field(&self.get().map(|p| p.key())).finish()
    }
}

impl fmt::Debug for Depends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Depends")
            .field("provider", &self.provider().map(|p| p.key()))
            .field("scope", &self.scope)
            .finish()
    }
}

/// A declared parameter.
#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    marker: Option<Depends>,
}

impl Param {
    /// Plain parameter without a marker.
    pub fn plain(name: impl Into<String>) -> Self {
        Self { name: name.into(), marker: None }
    }

    /// Parameter carrying a dependency marker.
    pub fn with_marker(name: impl Into<String>, marker: Depends) -> Self {
        Self { name: name.into(), marker: Some(marker) }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependency marker, if any.
    pub fn marker(&self) -> Option<&Depends> {
        self.marker.as_ref()
    }
}

/// A handler whose dependencies get resolved before it runs.
///
/// Only parameters with markers are resolved; plain parameters are left to
/// the host.
///
/// # Examples
///
/// ```
/// use event_di::{Depends, Provider, Target};
///
/// let get_service = Provider::value("get_service", |_| Ok("service".to_string())).build();
///
/// let handler = Target::new("on_message")
///     .param("event")
///     .depends("service", Depends::on(&get_service));
///
/// assert!(handler.has_dependencies());
/// assert_eq!(handler.dependencies().count(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Target {
    name: &'static str,
    params: Vec<Param>,
}

impl Target {
    /// Creates a target with no parameters.
    pub fn new(name: &'static str) -> Self {
        Self { name, params: Vec::new() }
    }

    /// Declares a plain parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::plain(name));
        self
    }

    /// Declares a parameter carrying a dependency marker.
    pub fn depends(mut self, name: impl Into<String>, marker: Depends) -> Self {
        self.params.push(Param::with_marker(name, marker));
        self
    }

    /// Diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All declared parameters, in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Parameters carrying markers, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &Depends)> {
        self.params
            .iter()
            .filter_map(|p| p.marker().map(|m| (p.name(), m)))
    }

    /// Returns true if any parameter carries a marker.
    pub fn has_dependencies(&self) -> bool {
        self.params.iter().any(|p| p.marker.is_some())
    }
}
