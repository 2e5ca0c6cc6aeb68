//! Error types for service decoding

use thiserror::Error;

/// Errors from decoding service payloads
#[derive(Error, Debug)]
pub enum ServiceError {
    /// ID array was not valid base64
    #[error("ID array is not valid base64: {0}")]
    IdArrayEncoding(String),

    /// ID array decoded to a byte count that is not a multiple of four
    #[error("ID array has a trailing partial word ({0} bytes)")]
    IdArrayLength(usize),

    /// XML fragment could not be parsed
    #[error("Malformed XML in {context}: {message}")]
    MalformedXml {
        context: &'static str,
        message: String,
    },

    /// A browse action failed on the device side
    #[error("Browse failed on {device}: {message}")]
    BrowseFailed { device: String, message: String },
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
