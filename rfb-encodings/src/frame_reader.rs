//! Reads one `FramebufferUpdate` message body: a rectangle count followed
//! by that many header+payload pairs.
//!
//! Presumes the caller has already consumed the 1-byte message-type
//! discriminator and the 1-byte padding that precedes the rectangle
//! count — that framing belongs to the message dispatch outside this
//! crate's scope. There is no tolerance for partial frames: a short read
//! or a malformed header anywhere in the message surfaces immediately and
//! the whole message is considered lost.

use crate::payload_reader::{read_rectangle, EncodedRectangle};
use rfb_common::Result;
use rfb_protocol::io::RfbInStream;
use rfb_protocol::types::PixelFormat;
use tokio::io::AsyncRead;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FramebufferUpdate {
    pub rectangles: Vec<EncodedRectangle>,
}

/// Reads the 2-byte rectangle count and that many rectangles in full.
pub async fn read_update_message<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    pixel_format: &PixelFormat,
) -> Result<FramebufferUpdate> {
    let num_rectangles = stream.read_u16().await?;
    let mut rectangles = Vec::with_capacity(num_rectangles as usize);
    for _ in 0..num_rectangles {
        rectangles.push(read_rectangle(stream, pixel_format).await?);
    }
    Ok(FramebufferUpdate { rectangles })
}
