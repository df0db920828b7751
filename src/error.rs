//! Error types for dependency resolution.

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by provider bodies and resource finalizers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency resolution errors
///
/// Represents the failures that abort a `resolve_all` call. Teardown problems
/// are never reported through this type; see
/// [`TeardownReport`](crate::TeardownReport).
///
/// # Examples
///
/// ```rust
/// use event_di::DiError;
///
/// let circular = DiError::Circular {
///     provider: "get_session",
///     path: vec!["get_repo", "get_session", "get_repo"],
/// };
/// assert_eq!(
///     circular.to_string(),
///     "Circular dependency detected: get_session (get_repo -> get_session -> get_repo)"
/// );
///
/// let missing = DiError::MissingArgument { provider: "get_repo", parameter: "db".into() };
/// println!("Error: {}", missing);
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Provider requested while it is already being resolved (includes path)
    #[error("Circular dependency detected: {provider} ({})", .path.join(" -> "))]
    Circular {
        /// The provider that closed the cycle
        provider: &'static str,
        /// Resolution path from the outermost provider to the repeated one
        path: Vec<&'static str>,
    },
    /// A provider body failed while being invoked
    #[error("Provider {provider} failed: {source}")]
    Provider {
        /// The failing provider
        provider: &'static str,
        /// The original failure
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// A provider asked for an argument that was never supplied
    #[error("Provider {provider} is missing argument `{parameter}`")]
    MissingArgument {
        /// The provider reading its arguments
        provider: &'static str,
        /// The parameter name
        parameter: String,
    },
    /// A value could not be downcast to the requested type
    #[error("Type mismatch for `{parameter}`: expected {expected}")]
    TypeMismatch {
        /// The parameter or context name being read
        parameter: String,
        /// The requested type name
        expected: &'static str,
    },
    /// Maximum nesting depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
}

impl DiError {
    /// Wraps a provider failure, leaving resolution errors untouched.
    ///
    /// Providers commonly propagate errors from `Args::required` with `?`;
    /// those already are `DiError`s and must not be wrapped twice.
    pub(crate) fn from_provider(provider: &'static str, error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(di) => *di,
            Err(source) => DiError::Provider {
                provider,
                source: Arc::from(source),
            },
        }
    }

    /// Returns the provider name the error is attributed to, if any.
    pub fn provider(&self) -> Option<&'static str> {
        match self {
            DiError::Circular { provider, .. }
            | DiError::Provider { provider, .. }
            | DiError::MissingArgument { provider, .. } => Some(provider),
            DiError::TypeMismatch { .. } | DiError::DepthExceeded(_) => None,
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
