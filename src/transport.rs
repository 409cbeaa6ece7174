//! The boundary to the underlying TCP connection.
//!
//! Inbound bytes arrive through [`crate::InputBuffer`] from the stack's
//! receive callback; this trait covers the outbound half. The transport
//! owns its own lifecycle — the connection never opens or closes it.

use embedded_io::ErrorType;

/// Outbound access to a non-blocking TCP connection.
pub trait TcpTransport: ErrorType {
    /// Bytes the transport can queue for transmission right now.
    fn send_space(&self) -> usize;

    /// Queues up to `data.len()` bytes and returns the number actually
    /// queued. Zero means the transport is momentarily out of send memory;
    /// it is not an error and the caller may retry later. Never blocks.
    fn send(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// The negotiated TCP maximum segment size.
    fn max_segment_size(&self) -> usize;
}
