//! Per-cycle tracking and finalization of opened resources.

use std::fmt;

use indexmap::IndexMap;

use crate::error::BoxError;
use crate::key::HandleId;
use crate::provider::{
    AsyncContextManager, AsyncResourceGenerator, ContextManager, ResourceGenerator,
};

/// An opened-but-not-finalized resource.
pub enum ActiveHandle {
    /// Paused synchronous generator
    Generator(Box<dyn ResourceGenerator>),
    /// Paused asynchronous generator
    AsyncGenerator(Box<dyn AsyncResourceGenerator>),
    /// Entered synchronous context manager
    Context(Box<dyn ContextManager>),
    /// Entered asynchronous context manager
    AsyncContext(Box<dyn AsyncContextManager>),
}

impl ActiveHandle {
    /// Runs the single finalize step appropriate to the handle's shape.
    pub async fn finalize(self) -> Result<(), BoxError> {
        match self {
            ActiveHandle::Generator(generator) => generator.close(),
            ActiveHandle::AsyncGenerator(generator) => generator.close().await,
            ActiveHandle::Context(context) => context.exit(),
            ActiveHandle::AsyncContext(context) => context.exit().await,
        }
    }

    /// Finalizes synchronous handles; hands asynchronous ones back.
    fn finalize_blocking(self) -> Result<Result<(), BoxError>, ActiveHandle> {
        match self {
            ActiveHandle::Generator(generator) => Ok(generator.close()),
            ActiveHandle::Context(context) => Ok(context.exit()),
            other => Err(other),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ActiveHandle::Generator(_) => "generator",
            ActiveHandle::AsyncGenerator(_) => "async generator",
            ActiveHandle::Context(_) => "context manager",
            ActiveHandle::AsyncContext(_) => "async context manager",
        }
    }
}

impl fmt::Debug for ActiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActiveHandle({})", self.kind())
    }
}

/// One failed finalize step.
#[derive(Debug)]
pub struct TeardownFailure {
    /// The handle that failed to finalize
    pub handle: HandleId,
    /// The failure it reported
    pub error: BoxError,
}

/// Outcome of [`LifecycleManager::teardown_all`].
///
/// Teardown never fails the request: the report is logged and handed back
/// for hosts that want to inspect it.
#[derive(Debug, Default)]
#[must_use = "teardown failures are only visible through the report"]
pub struct TeardownReport {
    /// Number of handles finalized successfully
    pub closed: usize,
    /// Failures, in finalization order
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// Returns true if every handle finalized cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of handles processed.
    pub fn processed(&self) -> usize {
        self.closed + self.failures.len()
    }

    /// Converts the failures into an aggregate error, if there were any.
    pub fn into_error(self) -> Option<TeardownError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(TeardownError { failures: self.failures })
        }
    }
}

/// Aggregate of failed finalize steps.
#[derive(Debug, thiserror::Error)]
#[error("Cleanup completed with {} errors: {}", .failures.len(), summarize(.failures))]
pub struct TeardownError {
    /// Individual failures
    pub failures: Vec<TeardownFailure>,
}

fn summarize(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.handle, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Owns every resource opened during one resolution cycle.
///
/// Each registered handle is finalized exactly once by
/// [`teardown_all`](LifecycleManager::teardown_all), in reverse registration
/// order, whether the cycle succeeded or not.
///
/// # Examples
///
/// ```
/// use event_di::{ActiveHandle, CacheKey, HandleId, LifecycleManager, Provider, Yielded};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let closed = Arc::new(AtomicBool::new(false));
/// let flag = closed.clone();
/// let provider = Provider::value("get_session", |_| Ok(())).build();
///
/// let mut lifecycle = LifecycleManager::new();
/// lifecycle.register(
///     HandleId::new(provider.key(), CacheKey::from("user_1")),
///     ActiveHandle::Generator(Box::new(Yielded::new((), move || {
///         flag.store(true, Ordering::SeqCst);
///         Ok(())
///     }))),
/// );
///
/// let report = lifecycle.teardown_all().await;
/// assert!(report.is_clean());
/// assert!(closed.load(Ordering::SeqCst));
/// # }
/// ```
#[derive(Default)]
pub struct LifecycleManager {
    active: IndexMap<HandleId, ActiveHandle>,
    // Handles pushed out of their slot by a later registration under the same id.
    displaced: Vec<(HandleId, ActiveHandle)>,
}

impl LifecycleManager {
    /// Creates an empty manager for one cycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an open handle.
    ///
    /// Registering an identity that is already active indicates a reuse bug
    /// in the caller. The new handle takes the slot, the earlier one is kept
    /// aside and still finalized, and a warning is logged.
    pub fn register(&mut self, id: HandleId, handle: ActiveHandle) {
        tracing::trace!(handle = %id, kind = handle.kind(), "resource opened");
        if let Some(previous) = self.active.shift_remove(&id) {
            tracing::warn!(
                handle = %id,
                "resource handle registered twice in one cycle; both will be finalized, earlier one last"
            );
            self.displaced.push((id.clone(), previous));
        }
        self.active.insert(id, handle);
    }

    /// Returns true if a handle with this identity is active.
    pub fn is_active(&self, id: &HandleId) -> bool {
        self.active.contains_key(id)
    }

    /// Number of handles awaiting finalization.
    pub fn len(&self) -> usize {
        self.active.len() + self.displaced.len()
    }

    /// Returns true if nothing awaits finalization.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.displaced.is_empty()
    }

    /// Finalizes every tracked handle exactly once.
    ///
    /// Handles are processed newest first, then displaced handles newest
    /// first. A failing handle never stops the others. Calling this again
    /// without new registrations does nothing.
    pub async fn teardown_all(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        while let Some((id, handle)) = self.active.pop() {
            Self::finalize_one(id, handle, &mut report).await;
        }
        while let Some((id, handle)) = self.displaced.pop() {
            Self::finalize_one(id, handle, &mut report).await;
        }

        if !report.is_clean() {
            tracing::warn!(
                failed = report.failures.len(),
                closed = report.closed,
                "Cleanup completed with errors"
            );
        } else if report.closed > 0 {
            tracing::debug!(closed = report.closed, "resources finalized");
        }
        report
    }

    async fn finalize_one(id: HandleId, handle: ActiveHandle, report: &mut TeardownReport) {
        match handle.finalize().await {
            Ok(()) => report.closed += 1,
            Err(error) => {
                tracing::warn!(handle = %id, error = %error, "error cleaning up resource");
                report.failures.push(TeardownFailure { handle: id, error });
            }
        }
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .field("displaced", &self.displaced.len())
            .finish()
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        // The owning task was cancelled or never ran teardown_all.
        let leftovers = self.active.drain(..).rev().chain(self.displaced.drain(..).rev());
        for (id, handle) in leftovers {
            match handle.finalize_blocking() {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(handle = %id, error = %error, "error cleaning up resource on drop");
                }
                Err(handle) => {
                    tracing::warn!(
                        handle = %id,
                        kind = handle.kind(),
                        "lifecycle manager dropped with an unfinalized async resource; call teardown_all().await"
                    );
                }
            }
        }
    }
}
