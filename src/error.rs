//! Driver error types and result alias.

use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced to the host by the driver's public operations.
///
/// Fatal conditions (partition detected, GCS transport loss, init retry
/// budget exhausted) are not modeled here — they terminate the process via
/// [`crate::driver::FatalSink`] instead of returning a value up the call
/// stack.
#[derive(Error, Debug)]
pub enum DriverError {
    /// GCS initialization exceeded its retry budget.
    #[error("GCS initialization failed after exhausting retry budget")]
    GcsInitFailed,

    /// A multicast send failed for a reason other than `TRY_AGAIN`.
    #[error("GCS send failed: {0}")]
    SendFailed(String),

    /// The supplied driver configuration is invalid.
    #[error("invalid driver configuration: {0}")]
    ConfigError(String),

    /// A wire frame failed the codec's validity checks and was dropped.
    #[error("malformed wire frame: {0}")]
    MalformedFrame(String),

    /// An invariant was violated that the driver could recover from locally,
    /// as opposed to one that warrants a fatal exit.
    #[error("internal driver error: {0}")]
    Internal(String),
}
