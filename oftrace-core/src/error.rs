//! Error types for oftrace-core.
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`PcapError`] - Errors from reading the capture source
//! - [`StreamError`] - Errors from reassembly and session bookkeeping
//!
//! Source-level failures stop iteration; stream failures are confined to
//! one session. See [`Error::is_recoverable`].

use thiserror::Error;

use crate::stream::FlowKey;

/// Main error type for oftrace-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading or parsing the capture
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),

    /// Error inside a reassembly session
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether iteration may continue after this error.
    ///
    /// Stream errors only affect the session they came from; everything
    /// else means the source itself is unusable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Stream(_))
    }
}

/// Errors related to capture reading.
#[derive(Error, Debug)]
pub enum PcapError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Invalid PCAP format
    #[error("Invalid PCAP format: {reason}")]
    InvalidFormat { reason: String },

    /// Unsupported link type
    #[error("Unsupported link type: {link_type}")]
    UnsupportedLinkType { link_type: u16 },

    /// Capture ends in the middle of a record
    #[error("Truncated capture after frame {frame}: {reason}")]
    TruncatedCapture { frame: u64, reason: String },

    /// Source cannot be read again from the start
    #[error("Rewind not supported on a non-seekable source")]
    RewindUnsupported,
}

/// Errors raised by reassembly sessions.
#[derive(Error, Debug)]
pub enum StreamError {
    /// `pull` asked for more bytes than the session holds
    #[error("{flow}: pull of {requested} bytes exceeds {available} queued")]
    PullBeyondQueued {
        flow: FlowKey,
        requested: usize,
        available: usize,
    },

    /// Session handle not present in the table
    #[error("No session for flow {flow}")]
    UnknownSession { flow: FlowKey },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
