//! The receive-side framebuffer-update pipeline: reading a
//! `FramebufferUpdate` message off the wire and decoding its rectangles.
//!
//! Four cooperating pieces, in dependency order:
//!
//! - [`frame_reader`] reads the rectangle count and fans out to...
//! - [`payload_reader`], which pulls exactly the right number of bytes per
//!   rectangle based on its encoding.
//! - [`zrle`] holds the session's continuous zlib stream and decodes ZRLE
//!   tiles into client-layout pixels.
//! - [`converter`] adapts encoded rectangles into decoded ones, routing
//!   ZRLE through the decoder and passing everything else through.
//!
//! Everything upstream of `FrameReader` (transport, handshake, pixel
//! format negotiation) and downstream of `RectangleConverter` (update
//! dispatch, UI binding) lives outside this crate.

pub mod converter;
pub mod frame_reader;
pub mod payload_reader;
pub mod zrle;

pub use converter::{DecodedRectangle, RectangleConverter};
pub use frame_reader::{read_update_message, FramebufferUpdate};
pub use payload_reader::{read_rectangle, EncodedRectangle};
pub use zrle::ZrleDecoder;
