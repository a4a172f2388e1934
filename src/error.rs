use std::sync::Arc;

use thiserror::Error;

/// Error returned by a [`BatchFunction`](crate::BatchFunction) when an entire
/// batch fails.
///
/// The same error instance is delivered to every caller waiting on the failed
/// window, so the message is stored behind an `Arc` to keep the fan-out cheap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BatchError(Arc<str>);

impl BatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

/// Outcome of a failed load.
///
/// A key that the batch function simply did not return is *not* an error; it
/// surfaces as `Ok(None)` from [`Loader::load`](crate::Loader::load).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The batch function failed; every caller in the same window receives
    /// this same error.
    #[error("batch load failed: {0}")]
    BatchFailed(#[from] BatchError),
    /// The owning request scope ended while this load was still pending.
    #[error("request scope ended before the load completed")]
    Cancelled,
    /// The load was requested after its scope had already ended. Fails fast at
    /// the call site rather than hanging.
    #[error("load requested on an ended request scope")]
    ScopeEnded,
}

/// Failure to decode an opaque pagination cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("cursor payload is not utf-8: {0}")]
    Payload(#[from] std::str::Utf8Error),
    #[error("cursor does not contain an account id: {0}")]
    Id(#[from] uuid::Error),
}

/// Rejected mutation input.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("first name must not be blank")]
    BlankFirstName,
}
