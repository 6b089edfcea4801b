//! Error type shared by every crate in the receive-side pipeline.
//!
//! The pipeline distinguishes four failure kinds, each with a different
//! recovery story: a dead transport, a malformed message, a structurally
//! broken ZRLE payload, and the "no decoder registered" case a converter
//! can shrug off. Keeping them as one enum lets callers match on severity
//! without threading per-crate error types through every boundary.

use std::fmt;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum RfbError {
    /// Short read, closed socket, or other I/O failure. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Malformed rectangle header, or an encoding whose payload length
    /// can't be determined. Fatal.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Structural violation inside a ZRLE payload: truncated tile, unknown
    /// subtype, out-of-range index, RLE overrun, declared-length mismatch.
    /// Fatal to the session — the continuous zlib stream is desynchronised
    /// the moment this fires.
    #[error("zrle format error: {0}")]
    Format(String),

    /// A ZRLE rectangle arrived but no decoder is configured for the
    /// session. Not fatal at this layer; callers typically log and pass
    /// the raw bytes through.
    #[error("no decoder configured for encoding {0}")]
    DecoderMissing(i32),
}

impl RfbError {
    pub fn protocol(msg: impl fmt::Display) -> Self {
        RfbError::Protocol(msg.to_string())
    }

    pub fn format(msg: impl fmt::Display) -> Self {
        RfbError::Format(msg.to_string())
    }

    /// Whether the session this error occurred in must be torn down.
    ///
    /// Every kind desynchronises the stream or means the transport is
    /// already gone, except `DecoderMissing`, which the converter can
    /// recover from by passing bytes through undecoded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RfbError::DecoderMissing(_))
    }
}

pub type Result<T> = std::result::Result<T, RfbError>;
