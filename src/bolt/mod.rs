//! # Bolt Wire Interface
//!
//! The contract between the driver core and the wire layer.
//!
//! ## Overview
//!
//! Framing, chunking, PackStream byte encoding, sockets and TLS are owned by
//! an implementation of [`Connection`]. This module only defines what crosses
//! that boundary:
//!
//! - **PackStream values** - the decoded value tree, including tagged graph structures
//! - **Requests** - INIT, RUN, PULL_ALL, DISCARD_ALL, RESET
//! - **Responses** - SUCCESS, RECORD, FAILURE, IGNORED, grouped per request
//! - **Errors** - transport failures
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! talking to a connection directly.

pub mod connection;
pub mod error;
pub mod message;
pub mod packstream;

pub use connection::Connection;
pub use error::{BoltError, BoltErrorCode, BoltResult};
pub use message::{
    AuthToken, FailureMessage, RecordMessage, Request, Response, ResponseBatch, SuccessMessage,
};
pub use packstream::{PackStreamStructure, PackStreamValue};
