//! Resource-shaped provider contracts.
//!
//! A resource-shaped provider produces its value now and defers the rest of
//! its work (closing a session, releasing a lock, ...) to an explicit finalize
//! step that the [`LifecycleManager`](crate::LifecycleManager) runs exactly once
//! after the handler completes.

use std::future::Future;

use async_trait::async_trait;

use super::BoxFuture;
use crate::error::BoxError;
use crate::value::Value;

/// Synchronous resource generator.
///
/// `start` runs the body up to the point where the value is handed out;
/// `close` runs the remainder. Returning `Ok(None)` from `start` means the
/// body finished without producing a value.
///
/// # Examples
///
/// ```
/// use event_di::{BoxError, ResourceGenerator, Value};
///
/// struct Transaction {
///     committed: bool,
/// }
///
/// impl ResourceGenerator for Transaction {
///     fn start(&mut self) -> Result<Option<Value>, BoxError> {
///         Ok(Some(Value::new("tx-1".to_string())))
///     }
///
///     fn close(self: Box<Self>) -> Result<(), BoxError> {
///         if self.committed { Ok(()) } else { Err("rolled back".into()) }
///     }
/// }
/// ```
pub trait ResourceGenerator: Send {
    /// Runs the body up to its single yield.
    fn start(&mut self) -> Result<Option<Value>, BoxError>;

    /// Runs the body after the yield to completion.
    fn close(self: Box<Self>) -> Result<(), BoxError>;
}

/// Asynchronous resource generator.
#[async_trait]
pub trait AsyncResourceGenerator: Send {
    /// Runs the body up to its single yield.
    async fn start(&mut self) -> Result<Option<Value>, BoxError>;

    /// Runs the body after the yield to completion.
    async fn close(self: Box<Self>) -> Result<(), BoxError>;
}

/// Synchronous context manager.
pub trait ContextManager: Send {
    /// Enters the context, producing the resolved value.
    fn enter(&mut self) -> Result<Value, BoxError>;

    /// Exits the context.
    fn exit(self: Box<Self>) -> Result<(), BoxError>;
}

/// Asynchronous context manager.
///
/// # Examples
///
/// ```
/// use event_di::{AsyncContextManager, BoxError, Value};
/// use async_trait::async_trait;
///
/// struct PoolLease {
///     pool: &'static str,
/// }
///
/// #[async_trait]
/// impl AsyncContextManager for PoolLease {
///     async fn enter(&mut self) -> Result<Value, BoxError> {
///         Ok(Value::new(format!("conn from {}", self.pool)))
///     }
///
///     async fn exit(self: Box<Self>) -> Result<(), BoxError> {
///         println!("returning connection to {}", self.pool);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncContextManager: Send {
    /// Enters the context, producing the resolved value.
    async fn enter(&mut self) -> Result<Value, BoxError>;

    /// Exits the context.
    async fn exit(self: Box<Self>) -> Result<(), BoxError>;
}

type Teardown = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;
type AsyncTeardown = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// A generator built from a value and a teardown closure.
///
/// This covers the common "set up, yield, clean up" provider without writing a
/// [`ResourceGenerator`] by hand.
///
/// # Examples
///
/// ```
/// use event_di::{Provider, Yielded};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Session {
///     open: AtomicBool,
/// }
///
/// let get_session = Provider::generator("get_session", |_args| {
///     let session = Arc::new(Session { open: AtomicBool::new(true) });
///     let closing = session.clone();
///     Ok(Yielded::from_arc(session, move || {
///         closing.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }))
/// })
/// .build();
/// ```
pub struct Yielded {
    value: Option<Value>,
    teardown: Option<Teardown>,
}

impl Yielded {
    /// Yields `value`; `teardown` runs when the resource is finalized.
    pub fn new<T, F>(value: T, teardown: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::from_value(Value::new(value), teardown)
    }

    /// Yields a shared value; `teardown` runs when the resource is finalized.
    pub fn from_arc<T, F>(value: std::sync::Arc<T>, teardown: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::from_value(Value::from_arc(value), teardown)
    }

    /// Yields an already wrapped value.
    pub fn from_value<F>(value: Value, teardown: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            value: Some(value),
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A generator whose body ends before yielding anything.
    pub fn nothing() -> Self {
        Self { value: None, teardown: None }
    }
}

impl ResourceGenerator for Yielded {
    fn start(&mut self) -> Result<Option<Value>, BoxError> {
        Ok(self.value.take())
    }

    fn close(self: Box<Self>) -> Result<(), BoxError> {
        match self.teardown {
            Some(teardown) => teardown(),
            None => Ok(()),
        }
    }
}

/// Asynchronous counterpart of [`Yielded`].
pub struct AsyncYielded {
    value: Option<Value>,
    teardown: Option<AsyncTeardown>,
}

impl AsyncYielded {
    /// Yields `value`; the future returned by `teardown` is awaited on finalize.
    pub fn new<T, F, Fut>(value: T, teardown: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::from_value(Value::new(value), teardown)
    }

    /// Yields a shared value.
    pub fn from_arc<T, F, Fut>(value: std::sync::Arc<T>, teardown: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::from_value(Value::from_arc(value), teardown)
    }

    /// Yields an already wrapped value.
    pub fn from_value<F, Fut>(value: Value, teardown: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            value: Some(value),
            teardown: Some(Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(teardown())
            })),
        }
    }

    /// A generator whose body ends before yielding anything.
    pub fn nothing() -> Self {
        Self { value: None, teardown: None }
    }
}

#[async_trait]
impl AsyncResourceGenerator for AsyncYielded {
    async fn start(&mut self) -> Result<Option<Value>, BoxError> {
        Ok(self.value.take())
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        let Self { teardown, .. } = *self;
        match teardown {
            Some(teardown) => teardown().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn yielded_hands_out_value_once_and_runs_teardown() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let mut generator = Box::new(Yielded::new(5u8, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let first = generator.start().unwrap().unwrap();
        assert_eq!(*first.downcast::<u8>().unwrap(), 5);
        assert!(generator.start().unwrap().is_none());

        generator.close().unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_yielded_awaits_teardown() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = closed.clone();
        let mut generator = Box::new(AsyncYielded::new("conn", move || async move {
            tokio::task::yield_now().await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        assert!(generator.start().await.unwrap().is_some());
        generator.close().await.unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
