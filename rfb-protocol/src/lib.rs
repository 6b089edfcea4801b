//! Buffered I/O and wire types for the RFB receive-side pipeline.
//!
//! This crate covers only the slice of the protocol this pipeline needs:
//! big-endian primitive reads and the `PixelFormat`/`RectangleHeader`
//! value types that frame a `FramebufferUpdate`. The handshake, security
//! types, and client-to-server messages live outside this crate's scope.

pub mod io;
pub mod types;

#[cfg(test)]
mod proptest_framing;

pub use io::RfbInStream;
pub use types::{
    EncodingType, PixelFormat, RectangleHeader, ENCODING_COPY_RECT, ENCODING_RAW, ENCODING_ZRLE,
};
