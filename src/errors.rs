//! # Error Handling
//!
//! Error taxonomy for the registry credentials controller.
//!
//! Configuration errors abort startup entirely. Everything that can fail
//! inside a refresh cycle (`Upstream`, `NoToken`, `Compile`, `Store`,
//! `DeadlineExceeded`) is caught at the cycle boundary and the loop waits
//! for the next tick. `Cancelled` is the loop's normal exit path.

use std::time::Duration;

/// Custom result type for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the registry credentials controller
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Required provider or binding fields missing after resolution
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The registry token endpoint could not be reached or rejected the call
    #[error("Registry request failed: {0}")]
    Upstream(String),

    /// The registry responded without a usable authorization token
    #[error("Registry returned no authorization token")]
    NoToken,

    /// A credential could not be turned into a secret representation
    #[error("Failed to compile secret: {0}")]
    Compile(String),

    /// Get/create/update against the secret store failed
    #[error("Secret store error: {0}")]
    Store(#[from] kube::Error),

    /// A refresh cycle overran its deadline
    #[error("Refresh cycle exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The refresh loop was asked to stop
    #[error("Refresh loop cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream(message.into())
    }

    /// Create a new compile error
    pub fn compile<S: Into<String>>(message: S) -> Self {
        Self::Compile(message.into())
    }
}
