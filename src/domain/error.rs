//! Domain error types
//!
//! The provider contract itself reports expected outcomes through
//! `CacheOperationResult` statuses; this error type is for the seams that
//! must propagate failures (ports, decorators, configuration loading).
//!
//! Every variant carries only owned strings so the error is `Clone` - the
//! stampede protector stores one outcome and hands it to every waiter.

/// The main error type for polycache operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type alias for polycache operations
pub type Result<T> = std::result::Result<T, Error>;
