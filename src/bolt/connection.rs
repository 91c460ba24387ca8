//! The connection seam between the driver and the wire layer.
//!
//! A [`Connection`] owns one physical socket (plain or TLS), performs the
//! Bolt handshake and does all message framing and PackStream encoding. The
//! driver only ever sees [`Request`]s going out and [`ResponseBatch`]es coming
//! back.
//!
//! ```text
//! SessionClient ── Request ──▶ Connection ── bytes ──▶ server
//!               ◀─ ResponseBatch ─┘
//! ```

use std::future::Future;

use super::error::BoltResult;
use super::message::{Request, ResponseBatch};

/// One physical Bolt connection.
///
/// Each returned future resolves exactly once, when the server has answered
/// the request completely. Timeouts belong to the implementation; the driver
/// never retries a failed call.
pub trait Connection: Send + 'static {
    /// Open the socket and perform the version handshake.
    fn connect(&mut self) -> impl Future<Output = BoltResult<()>> + Send;

    /// Send one request and collect every response message it produces.
    ///
    /// A statement the server rejects is NOT an error: it resolves to a
    /// batch with `success == false` and a FAILURE message.
    fn request(&mut self, request: Request) -> impl Future<Output = BoltResult<ResponseBatch>> + Send;

    /// Close the socket.
    fn disconnect(&mut self) -> impl Future<Output = BoltResult<()>> + Send;
}
