//! Negotiated pixel layout and rectangle framing.
//!
//! `PixelFormat` is produced by machinery outside this crate's scope (the
//! RFB handshake negotiates it; `ServerInit`/`SetPixelFormat` carry it
//! across the wire), but every decoder downstream depends on its derived
//! sizes, so it lives here alongside the rectangle header it governs.

use crate::io::RfbInStream;
use rfb_common::Result;
use tokio::io::AsyncRead;

/// Wire layout of a true-colour pixel, as negotiated at handshake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_color: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The client's fixed destination layout: BGRA8888, little-endian, depth 24.
    pub const BGRA8888: PixelFormat = PixelFormat {
        bits_per_pixel: 32,
        depth: 24,
        big_endian: false,
        true_color: true,
        red_max: 255,
        green_max: 255,
        blue_max: 255,
        red_shift: 16,
        green_shift: 8,
        blue_shift: 0,
    };

    /// `ceil(bits_per_pixel / 8)` — the width of one pixel on the wire.
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel as usize + 7) / 8
    }

    /// `ceil(depth / 8)` — the width of one CPIXEL within a ZRLE tile.
    pub fn cpixel_size(&self) -> usize {
        (self.depth as usize + 7) / 8
    }

    /// A negotiated format must never claim more significant bits than it has room for.
    pub fn is_valid(&self) -> bool {
        self.depth as usize <= self.bits_per_pixel as usize
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::BGRA8888
    }
}

/// The encodings this pipeline understands, plus a catch-all for the rest.
///
/// A tagged sum rather than a class hierarchy: dispatch downstream is a
/// match, not dynamic subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingType {
    Raw,
    CopyRect,
    Zrle,
    Unsupported(i32),
}

pub const ENCODING_RAW: i32 = 0;
pub const ENCODING_COPY_RECT: i32 = 1;
pub const ENCODING_ZRLE: i32 = 16;

impl From<i32> for EncodingType {
    fn from(code: i32) -> Self {
        match code {
            ENCODING_RAW => EncodingType::Raw,
            ENCODING_COPY_RECT => EncodingType::CopyRect,
            ENCODING_ZRLE => EncodingType::Zrle,
            other => EncodingType::Unsupported(other),
        }
    }
}

impl EncodingType {
    pub fn code(self) -> i32 {
        match self {
            EncodingType::Raw => ENCODING_RAW,
            EncodingType::CopyRect => ENCODING_COPY_RECT,
            EncodingType::Zrle => ENCODING_ZRLE,
            EncodingType::Unsupported(code) => code,
        }
    }
}

/// The 12-byte header that precedes every rectangle's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectangleHeader {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: EncodingType,
}

impl RectangleHeader {
    pub async fn read_from<R: AsyncRead + Unpin>(stream: &mut RfbInStream<R>) -> Result<Self> {
        let x = stream.read_u16().await?;
        let y = stream.read_u16().await?;
        let width = stream.read_u16().await?;
        let height = stream.read_u16().await?;
        let encoding = stream.read_i32().await?;
        Ok(RectangleHeader {
            x,
            y,
            width,
            height,
            encoding: EncodingType::from(encoding),
        })
    }
}
