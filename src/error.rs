//! Error types for the heartbeat PoR library

/// Error types for the heartbeat PoR library
#[derive(Debug, thiserror::Error)]
pub enum PorError {
    /// A wire object could not be decoded: truncated stream, length prefix
    /// above its ceiling, or a malformed envelope structure
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// HMAC verification of a sealed state envelope failed; the auditor
    /// cannot trust any field it carries
    #[error("state authentication failed: envelope MAC did not verify")]
    StateAuthentication,

    /// An operation was invoked on the wrong kind of engine or with
    /// arguments it cannot accept
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An underlying file operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for heartbeat operations
pub type Result<T> = std::result::Result<T, PorError>;
