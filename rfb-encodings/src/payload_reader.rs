//! Reads exactly the right number of transport bytes for one rectangle.
//!
//! The header tells us the encoding; the encoding tells us how many more
//! bytes belong to this rectangle. Getting that count wrong desynchronises
//! every rectangle after it, so each arm here is deliberately narrow.

use rfb_common::Result;
use rfb_protocol::io::RfbInStream;
use rfb_protocol::types::{EncodingType, PixelFormat, RectangleHeader};
use tokio::io::AsyncRead;

/// A rectangle as it arrives off the wire: header plus undecoded payload.
///
/// For ZRLE, `payload` includes the 4-byte compressed-length prefix so the
/// decoder can validate it independently of the reader. For Raw, `payload`
/// is exactly `width * height * bytesPerPixel` pixel bytes. For CopyRect
/// it is the 4-byte source offset. For an unsupported encoding, `payload`
/// is empty — there is no way to know its length, so nothing past the
/// header is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRectangle {
    pub header: RectangleHeader,
    pub payload: Vec<u8>,
}

pub async fn read_rectangle<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
    pixel_format: &PixelFormat,
) -> Result<EncodedRectangle> {
    let header = RectangleHeader::read_from(stream).await?;
    let payload = match header.encoding {
        EncodingType::Raw => {
            let len =
                header.width as usize * header.height as usize * pixel_format.bytes_per_pixel();
            stream.read_bytes(len).await?
        }
        EncodingType::CopyRect => stream.read_bytes(4).await?,
        EncodingType::Zrle => {
            let declared_len = stream.read_u32().await?;
            let mut payload = Vec::with_capacity(4 + declared_len as usize);
            payload.extend_from_slice(&declared_len.to_be_bytes());
            payload.extend(stream.read_bytes(declared_len as usize).await?);
            payload
        }
        EncodingType::Unsupported(_) => Vec::new(),
    };
    Ok(EncodedRectangle { header, payload })
}
