//! Error types for the Govee integration.

use thiserror::Error;

/// Failures talking to the Govee developer API.
#[derive(Debug, Error)]
pub enum GoveeError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the documented shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type GoveeResult<T> = Result<T, GoveeError>;
