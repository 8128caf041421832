use std::time::Duration;
use thiserror::Error;

/// Errors from the reasoning backend.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// A network error occurred while talking to the backend.
    #[error("network: {0}")]
    Network(String),

    /// The backend returned an error response.
    #[error("backend api: {0}")]
    Api(String),

    /// The backend response could not be parsed.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// A run did not reach a terminal or action-required state in time.
    #[error("run did not settle within {0:?}")]
    Timeout(Duration),
}
