//! Thin adapter from encoded to decoded rectangles.
//!
//! Raw, CopyRect, and Unsupported payloads pass straight through — nothing
//! downstream of this crate needs them touched. Only ZRLE is actually
//! decoded, and only when a decoder has been wired up for the session; a
//! missing decoder or a decode failure both fall back to passing the raw
//! bytes through rather than terminating the conversion outright, since a
//! single bad rectangle shouldn't crash an otherwise-working pipeline.
//! What it *does* mean, per the session-level contract this adapter
//! participates in: a `FormatError` here means the continuous zlib stream
//! is desynchronised, and whatever owns the session must tear it down.

use crate::payload_reader::EncodedRectangle;
use crate::zrle::ZrleDecoder;
use rfb_common::RfbError;
use rfb_protocol::types::EncodingType;
use std::sync::Arc;

/// A rectangle whose payload has been converted (and, for ZRLE, decoded)
/// to the client's pixel layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: EncodingType,
    pub pixels: Vec<u8>,
}

/// Maps `EncodedRectangle`s to `DecodedRectangle`s for one session.
///
/// Holds a handle to the session's ZRLE decoder, if one has been
/// configured for it. Wrap the same `ZrleDecoder` in an `Arc` and pass the
/// same `RectangleConverter` (or a clone of its `Arc`) across every
/// rectangle of a session — constructing a new decoder per rectangle
/// defeats the continuous zlib stream it depends on.
pub struct RectangleConverter {
    zrle_decoder: Option<Arc<ZrleDecoder>>,
}

impl RectangleConverter {
    pub fn new(zrle_decoder: Option<Arc<ZrleDecoder>>) -> Self {
        RectangleConverter { zrle_decoder }
    }

    pub fn without_zrle() -> Self {
        RectangleConverter { zrle_decoder: None }
    }

    /// Converts one rectangle. Returns the decoded (or passed-through)
    /// rectangle alongside a diagnostic error when the ZRLE path didn't
    /// fully succeed — `Some(RfbError::DecoderMissing(_))` is informational
    /// only, `Some(RfbError::Format(_))` means the caller should tear the
    /// session down even though a rectangle is still returned.
    pub fn convert(&self, rect: EncodedRectangle) -> (DecodedRectangle, Option<RfbError>) {
        let EncodedRectangle { header, payload } = rect;

        if header.encoding != EncodingType::Zrle {
            return (
                DecodedRectangle {
                    x: header.x,
                    y: header.y,
                    width: header.width,
                    height: header.height,
                    encoding: header.encoding,
                    pixels: payload,
                },
                None,
            );
        }

        let Some(decoder) = &self.zrle_decoder else {
            let err = RfbError::DecoderMissing(header.encoding.code());
            tracing::warn!(
                target: "rfb_encodings::converter",
                x = header.x,
                y = header.y,
                "zrle rectangle received but no decoder is configured; passing raw bytes through"
            );
            return (
                DecodedRectangle {
                    x: header.x,
                    y: header.y,
                    width: header.width,
                    height: header.height,
                    encoding: EncodingType::Zrle,
                    pixels: payload,
                },
                Some(err),
            );
        };

        match decoder.decode(&payload, header.width, header.height) {
            Ok(pixels) => (
                DecodedRectangle {
                    x: header.x,
                    y: header.y,
                    width: header.width,
                    height: header.height,
                    encoding: EncodingType::Raw,
                    pixels,
                },
                None,
            ),
            Err(err) => {
                tracing::warn!(
                    target: "rfb_encodings::converter",
                    x = header.x,
                    y = header.y,
                    error = %err,
                    "zrle decode failed; passing raw payload through, session should be torn down"
                );
                (
                    DecodedRectangle {
                        x: header.x,
                        y: header.y,
                        width: header.width,
                        height: header.height,
                        encoding: EncodingType::Zrle,
                        pixels: payload,
                    },
                    Some(err),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfb_protocol::types::{PixelFormat, RectangleHeader};

    fn header(encoding: EncodingType) -> RectangleHeader {
        RectangleHeader {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            encoding,
        }
    }

    #[test]
    fn raw_passes_through_unchanged() {
        let converter = RectangleConverter::without_zrle();
        let rect = EncodedRectangle {
            header: header(EncodingType::Raw),
            payload: vec![1, 2, 3, 4],
        };
        let (decoded, err) = converter.convert(rect);
        assert_eq!(decoded.encoding, EncodingType::Raw);
        assert_eq!(decoded.pixels, vec![1, 2, 3, 4]);
        assert!(err.is_none());
    }

    #[test]
    fn unsupported_passes_through_with_empty_payload() {
        let converter = RectangleConverter::without_zrle();
        let rect = EncodedRectangle {
            header: header(EncodingType::Unsupported(42)),
            payload: Vec::new(),
        };
        let (decoded, err) = converter.convert(rect);
        assert_eq!(decoded.encoding, EncodingType::Unsupported(42));
        assert!(decoded.pixels.is_empty());
        assert!(err.is_none());
    }

    #[test]
    fn zrle_without_decoder_passes_through_and_warns() {
        let converter = RectangleConverter::without_zrle();
        let rect = EncodedRectangle {
            header: header(EncodingType::Zrle),
            payload: vec![0, 0, 0, 0],
        };
        let (decoded, err) = converter.convert(rect);
        assert_eq!(decoded.encoding, EncodingType::Zrle);
        assert!(matches!(err, Some(RfbError::DecoderMissing(16))));
    }

    #[test]
    fn zrle_with_decoder_becomes_raw_on_success() {
        let decoder = Arc::new(ZrleDecoder::new(PixelFormat::BGRA8888));
        let converter = RectangleConverter::new(Some(decoder));
        let rect = EncodedRectangle {
            header: header(EncodingType::Zrle),
            payload: vec![0, 0, 0, 0], // declared_len 0 -> all-zero pixel buffer
        };
        let (decoded, err) = converter.convert(rect);
        assert_eq!(decoded.encoding, EncodingType::Raw);
        assert_eq!(decoded.pixels, vec![0u8; 4]);
        assert!(err.is_none());
    }

    #[test]
    fn zrle_decode_failure_passes_through_original_payload() {
        let decoder = Arc::new(ZrleDecoder::new(PixelFormat::BGRA8888));
        let converter = RectangleConverter::new(Some(decoder));
        let bad_payload = vec![0, 0]; // shorter than the 4-byte length prefix
        let rect = EncodedRectangle {
            header: header(EncodingType::Zrle),
            payload: bad_payload.clone(),
        };
        let (decoded, err) = converter.convert(rect);
        assert_eq!(decoded.encoding, EncodingType::Zrle);
        assert_eq!(decoded.pixels, bad_payload);
        assert!(matches!(err, Some(RfbError::Format(_))));
    }
}
