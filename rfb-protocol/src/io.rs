//! Buffered big-endian reader over an async byte stream.
//!
//! RFB is defined entirely in network byte order. `RfbInStream` wraps any
//! `AsyncRead` and refills an internal buffer in chunks rather than issuing
//! a syscall per primitive read, which matters once a session is parsing
//! dozens of rectangle headers a frame.

use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const DEFAULT_CAPACITY: usize = 16 * 1024;
const FILL_CHUNK: usize = 4096;

pub struct RfbInStream<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> RfbInStream<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes already buffered, readable without touching the transport.
    pub fn available(&self) -> usize {
        self.buf.len()
    }

    async fn fill(&mut self, n: usize) -> io::Result<()> {
        let mut chunk = [0u8; FILL_CHUNK];
        while self.buf.len() < n {
            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport closed before enough bytes were available",
                ));
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    pub async fn read_u8(&mut self) -> io::Result<u8> {
        self.fill(1).await?;
        Ok(self.buf.get_u8())
    }

    pub async fn read_u16(&mut self) -> io::Result<u16> {
        self.fill(2).await?;
        Ok(self.buf.get_u16())
    }

    pub async fn read_u32(&mut self) -> io::Result<u32> {
        self.fill(4).await?;
        Ok(self.buf.get_u32())
    }

    pub async fn read_i32(&mut self) -> io::Result<i32> {
        self.fill(4).await?;
        Ok(self.buf.get_i32())
    }

    /// Reads exactly `n` bytes and returns them as an owned buffer.
    pub async fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.fill(n).await?;
        Ok(self.buf.split_to(n).to_vec())
    }

    /// Discards `n` bytes without copying them out. Used to skip the
    /// single padding byte that precedes a `FramebufferUpdate` body.
    pub async fn skip(&mut self, n: usize) -> io::Result<()> {
        self.fill(n).await?;
        self.buf.advance(n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    #[tokio::test]
    async fn reads_big_endian_primitives() {
        let data = vec![
            0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0xFF, 0xFF, 0xFF, 0xFE,
        ];
        let mut stream = RfbInStream::new(&data[..]);
        assert_eq!(stream.read_u16().await.unwrap(), 1);
        assert_eq!(stream.read_u16().await.unwrap(), 2);
        assert_eq!(stream.read_u32().await.unwrap(), 3);
        assert_eq!(stream.read_i32().await.unwrap(), -2);
    }

    #[tokio::test]
    async fn skip_discards_padding_byte() {
        let data = vec![0xAA, 0x00, 0x05];
        let mut stream = RfbInStream::new(&data[..]);
        stream.skip(1).await.unwrap();
        assert_eq!(stream.read_u16().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn read_bytes_returns_owned_slice() {
        let data = vec![1, 2, 3, 4, 5];
        let mut stream = RfbInStream::new(&data[..]);
        assert_eq!(stream.read_bytes(3).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(stream.available(), 2);
    }

    #[tokio::test]
    async fn short_read_is_unexpected_eof() {
        let data = vec![0x00];
        let mut stream = RfbInStream::new(&data[..]);
        let err = stream.read_u16().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    /// Simulates a transport that only ever hands back a single byte per
    /// poll, regardless of buffer fragmentation at the network layer.
    struct OneByteAtATime(Vec<u8>, usize);

    impl AsyncRead for OneByteAtATime {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.1 >= self.0.len() {
                return Poll::Ready(Ok(()));
            }
            buf.put_slice(&[self.0[self.1]]);
            self.1 += 1;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn survives_reads_fragmented_at_every_byte_boundary() {
        let reader = OneByteAtATime(vec![0x00, 0x00, 0x01, 0x2C], 0);
        let mut stream = RfbInStream::new(reader);
        assert_eq!(stream.read_u32().await.unwrap(), 300);
    }
}
