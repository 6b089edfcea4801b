//! Property tests for rectangle-header framing.
//!
//! Verifies header parsing is robust against fragmentation at arbitrary
//! byte boundaries, which matters once this runs over a real socket
//! instead of an in-memory buffer.

#[cfg(test)]
mod tests {
    use crate::io::RfbInStream;
    use crate::types::{EncodingType, RectangleHeader, ENCODING_COPY_RECT, ENCODING_RAW, ENCODING_ZRLE};
    use proptest::prelude::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    /// Hands back at most `boundary` bytes on the first poll, then the rest.
    struct FragmentingReader {
        data: Vec<u8>,
        pos: usize,
        boundary: usize,
    }

    impl FragmentingReader {
        fn new(data: Vec<u8>, boundary: usize) -> Self {
            let boundary = boundary.min(data.len());
            Self { data, pos: 0, boundary }
        }
    }

    impl AsyncRead for FragmentingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos >= self.data.len() {
                return Poll::Ready(Ok(()));
            }
            let available = if self.pos < self.boundary {
                (self.boundary - self.pos).min(buf.remaining())
            } else {
                (self.data.len() - self.pos).min(buf.remaining())
            };
            if available == 0 {
                return Poll::Ready(Ok(()));
            }
            let data = &self.data[self.pos..self.pos + available];
            buf.put_slice(data);
            self.pos += available;
            Poll::Ready(Ok(()))
        }
    }

    fn arbitrary_header() -> impl Strategy<Value = RectangleHeader> {
        (
            0u16..=1920,
            0u16..=1080,
            1u16..=640,
            1u16..=480,
            prop::sample::select(vec![ENCODING_RAW, ENCODING_COPY_RECT, ENCODING_ZRLE, -223, 9999]),
        )
            .prop_map(|(x, y, width, height, encoding)| RectangleHeader {
                x,
                y,
                width,
                height,
                encoding: EncodingType::from(encoding),
            })
    }

    fn serialize(header: &RectangleHeader) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&header.x.to_be_bytes());
        bytes.extend_from_slice(&header.y.to_be_bytes());
        bytes.extend_from_slice(&header.width.to_be_bytes());
        bytes.extend_from_slice(&header.height.to_be_bytes());
        bytes.extend_from_slice(&header.encoding.code().to_be_bytes());
        bytes
    }

    proptest! {
        #[test]
        fn header_round_trips_under_arbitrary_fragmentation(
            header in arbitrary_header(),
            boundary in 0usize..12,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let wire = serialize(&header);
                let reader = FragmentingReader::new(wire, boundary);
                let mut stream = RfbInStream::new(reader);
                let parsed = RectangleHeader::read_from(&mut stream).await.unwrap();
                prop_assert_eq!(header, parsed);
                Ok(())
            })?;
        }
    }
}
