//! Bolt transport error types.
//!
//! These are the failures a [`Connection`](super::Connection) may report.
//! Statement-level rejections are not errors at this layer: they arrive as
//! `FAILURE` responses inside a [`ResponseBatch`](super::ResponseBatch).

use std::fmt;
use std::io;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Bolt transport errors.
#[derive(Debug)]
pub enum BoltError {
    /// I/O error
    Io(io::Error),

    /// Connection could not be established (refused, TLS failure, ...)
    Connection(String),

    /// Handshake or framing violation reported by the wire layer
    Protocol(String),

    /// Credentials rejected during INIT
    Authentication(String),

    /// The wire layer gave up waiting for the server
    Timeout,

    /// Socket closed by the peer
    ConnectionClosed,
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltError::Io(e) => write!(f, "I/O error: {}", e),
            BoltError::Connection(msg) => write!(f, "Connection error: {}", msg),
            BoltError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BoltError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            BoltError::Timeout => write!(f, "Operation timed out"),
            BoltError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BoltError {
    fn from(err: io::Error) -> Self {
        BoltError::Io(err)
    }
}

/// Server failure codes the driver inspects.
pub struct BoltErrorCode;

impl BoltErrorCode {
    pub const SYNTAX_ERROR: &'static str = "Neo.ClientError.Statement.SyntaxError";
    pub const CONSTRAINT_VIOLATION: &'static str =
        "Neo.ClientError.Schema.ConstraintValidationFailed";
    pub const TRANSACTION_NOT_FOUND: &'static str =
        "Neo.ClientError.Transaction.TransactionNotFound";
    pub const UNAUTHORIZED: &'static str = "Neo.ClientError.Security.Unauthorized";
}
