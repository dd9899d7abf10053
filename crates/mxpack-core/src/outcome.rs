//! Results for operations that may fall back instead of failing.

use crate::Error;

/// Outcome of a best-effort operation.
///
/// A `Degraded` value still carries a usable fallback; the cause is kept so
/// callers can report it, but it never aborts the pipeline.
#[derive(Debug)]
pub enum BestEffort<T> {
    Resolved(T),
    Degraded { fallback: T, cause: Error },
}

impl<T> BestEffort<T> {
    /// Run `result`, substituting `fallback` on error.
    pub fn or_fallback(result: Result<T, Error>, fallback: T) -> Self {
        match result {
            Ok(value) => BestEffort::Resolved(value),
            Err(cause) => BestEffort::Degraded { fallback, cause },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BestEffort::Degraded { .. })
    }

    pub fn cause(&self) -> Option<&Error> {
        match self {
            BestEffort::Resolved(_) => None,
            BestEffort::Degraded { cause, .. } => Some(cause),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            BestEffort::Resolved(value) => value,
            BestEffort::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            BestEffort::Resolved(value) => value,
            BestEffort::Degraded { fallback, .. } => fallback,
        }
    }
}
