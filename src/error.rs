// ABOUTME: Crate-wide error type
// ABOUTME: No panics on protocol input; transient conditions are recoverable by callers

use thiserror::Error;

/// Unified error type for the Sendspin client core.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel failed to open, closed unexpectedly, or a transport-level send/recv failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected message type, rejected hello, or a malformed control frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A media frame's codec differs from the active stream descriptor.
    #[error("stream format mismatch: active={active}, frame={frame}")]
    StreamFormatMismatch { active: String, frame: u8 },

    /// Per-frame decode failure; the frame is dropped, the stream continues.
    #[error("decode error: {0}")]
    Decode(String),

    /// A timestamp conversion was attempted before the time filter accumulated
    /// enough measurements (`TimeFilter::is_ready` is false).
    #[error("clock not ready")]
    ClockUnready,

    /// An external collaborator (audio sink, discovery adapter, recent-servers
    /// store) reported a failure.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// A configuration value was out of its allowed range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
