//! Operation result model
//!
//! Every provider operation resolves to a `CacheOperationResult` rather
//! than an `Err` - callers branch on `status`, not on exceptions. Only the
//! constructors can build a result, which keeps the invariant that `value`
//! is populated exclusively on `Success`.

use crate::domain::error::Error;
use serde::{Deserialize, Serialize};

/// Outcome classification for a cache operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStatus {
    /// Operation completed and, for reads, produced a value
    Success,
    /// The key is absent (not an error)
    NotFound,
    /// The key or options failed validation; no state was touched
    ValidationError,
    /// The underlying storage or backend failed
    ConnectionError,
    /// Encoding or decoding the payload failed
    SerializationError,
    /// The caller's cancellation token fired before completion
    OperationCancelled,
}

impl CacheStatus {
    /// True for statuses that represent an operational failure.
    ///
    /// `NotFound` is an ordinary outcome of a working cache, so it does not
    /// count as an error for events, metrics, or telemetry.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::ValidationError
                | Self::ConnectionError
                | Self::SerializationError
                | Self::OperationCancelled
        )
    }
}

/// Result of a single cache operation
#[derive(Debug, Clone)]
pub struct CacheOperationResult<T = ()> {
    status: CacheStatus,
    value: Option<T>,
    details: Option<String>,
}

impl<T> CacheOperationResult<T> {
    /// Successful operation carrying a value
    pub fn success(value: T) -> Self {
        Self {
            status: CacheStatus::Success,
            value: Some(value),
            details: None,
        }
    }

    /// The key is absent
    pub fn not_found() -> Self {
        Self {
            status: CacheStatus::NotFound,
            value: None,
            details: None,
        }
    }

    /// The key is absent, with an explanation
    pub fn not_found_with<S: Into<String>>(details: S) -> Self {
        Self {
            status: CacheStatus::NotFound,
            value: None,
            details: Some(details.into()),
        }
    }

    /// Key or option validation failed
    pub fn validation_error<S: Into<String>>(details: S) -> Self {
        Self {
            status: CacheStatus::ValidationError,
            value: None,
            details: Some(details.into()),
        }
    }

    /// Underlying storage failed
    pub fn connection_error<S: Into<String>>(details: S) -> Self {
        Self {
            status: CacheStatus::ConnectionError,
            value: None,
            details: Some(details.into()),
        }
    }

    /// Payload encoding or decoding failed
    pub fn serialization_error<S: Into<String>>(details: S) -> Self {
        Self {
            status: CacheStatus::SerializationError,
            value: None,
            details: Some(details.into()),
        }
    }

    /// The operation was cancelled by the caller's token
    pub fn cancelled() -> Self {
        Self {
            status: CacheStatus::OperationCancelled,
            value: None,
            details: None,
        }
    }

    /// Convert a domain error into the matching failure result
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Validation { message } | Error::InvalidArgument { message } => {
                Self::validation_error(message.clone())
            }
            Error::Serialization { message } => Self::serialization_error(message.clone()),
            Error::Cancelled => Self::cancelled(),
            Error::Connection { message } | Error::Config { message } => {
                Self::connection_error(message.clone())
            }
        }
    }

    /// The outcome classification
    pub fn status(&self) -> CacheStatus {
        self.status
    }

    /// Derived success predicate
    pub fn is_success(&self) -> bool {
        self.status == CacheStatus::Success
    }

    /// Borrow the value (present only on `Success`)
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consume the result, yielding the value on `Success`
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Optional human-readable detail, typically the underlying message
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Map the carried value, preserving status and details
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheOperationResult<U> {
        CacheOperationResult {
            status: self.status,
            value: self.value.map(f),
            details: self.details,
        }
    }

    /// Re-type a valueless failure result.
    ///
    /// Panics in debug builds if called on a `Success` result, which would
    /// silently drop the value.
    pub fn retype<U>(self) -> CacheOperationResult<U> {
        debug_assert!(self.value.is_none(), "retype would discard a value");
        CacheOperationResult {
            status: self.status,
            value: None,
            details: self.details,
        }
    }
}
