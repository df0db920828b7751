//! Type-erased values flowing through resolution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{DiError, DiResult};

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A resolved value, or the explicit empty value.
///
/// Cloning is cheap: the payload is shared behind an `Arc`, so clones of the
/// same resolution are reference-equal.
///
/// # Examples
///
/// ```rust
/// use event_di::Value;
///
/// let v = Value::new(42u32);
/// assert_eq!(*v.downcast::<u32>().unwrap(), 42);
/// assert!(v.ptr_eq(&v.clone()));
/// assert!(!v.ptr_eq(&Value::new(42u32)));
///
/// assert!(Value::empty().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Value(Option<AnyArc>);

impl Value {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Wraps an already shared value without re-allocating.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(Some(value as AnyArc))
    }

    /// The explicit empty value.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Returns true for the empty value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Downcasts to a concrete type, `None` if empty or of another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone()?.downcast::<T>().ok()
    }

    /// Returns true if both values are empty or share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Value(..)"),
            None => f.write_str("Value(empty)"),
        }
    }
}

/// Named values resolved for one target, in parameter declaration order.
pub type Resolved = IndexMap<String, Value>;

/// The ambient context mapping handed to handlers.
///
/// Hosts fill it with whatever they already know about the event (bot
/// handles, session objects, ...); resolved dependencies are merged into it
/// before the handler runs. Providers see it through the reserved `data`
/// parameter, and same-named entries take precedence over nested
/// dependencies.
#[derive(Clone, Default, Debug)]
pub struct ContextData {
    values: HashMap<String, Value>,
}

impl ContextData {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one if present.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) -> Option<Value> {
        self.values.insert(name.into(), Value::new(value))
    }

    /// Inserts an already wrapped value.
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    /// Builder-style insert.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Looks up a raw value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Looks up a value and downcasts it.
    ///
    /// Returns `Ok(None)` if the name is absent and `TypeMismatch` if it holds
    /// something else.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) if value.is_empty() => Ok(None),
            Some(value) => value.downcast::<T>().map(Some).ok_or_else(|| DiError::TypeMismatch {
                parameter: name.to_string(),
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Returns true if the name is present (even with the empty value).
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Merges a resolved mapping, overwriting same-named entries.
    pub fn merge(&mut self, resolved: Resolved) {
        self.values.extend(resolved);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
