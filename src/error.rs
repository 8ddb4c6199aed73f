//! Error types for the Sightline relay and client

use thiserror::Error;

/// Result type alias for Sightline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the relay, the provider client, or the capture client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing API key, bad URL, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// The vision-language provider call failed
    #[error("provider error: {0}")]
    Provider(String),

    /// The relay answered with a non-success status
    #[error("relay error {status}: {body}")]
    Relay { status: u16, body: String },

    /// The relay answered 2xx but without a string `text` field
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Camera (or microphone) unavailable or permission denied
    #[error("media access error: {0}")]
    MediaAccess(String),

    /// Capture attempted without an active stream
    #[error("not ready: {0}")]
    NotReady(String),

    /// A capture round trip is already in flight
    #[error("busy: a capture is already in progress")]
    Busy,

    /// The session was stopped while the operation was in flight
    #[error("cancelled")]
    Cancelled,

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// Image decoding or encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
