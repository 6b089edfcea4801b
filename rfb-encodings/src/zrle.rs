//! ZRLE: Zlib Run-Length Encoding.
//!
//! ZRLE compresses the whole framebuffer-update stream with one continuous
//! zlib stream — not one stream per rectangle, not one per tile — and then
//! carves the decompressed bytes into a row-major grid of up to 64x64
//! tiles, each holding its own sub-encoding. This module owns that
//! inflater for the lifetime of the session and never finalises it except
//! on an explicit `reset()`.
//!
//! Feeding the inflater per-rectangle instead of re-creating it per
//! rectangle is the single load-bearing design constraint here: a decoder
//! that looks correct against one rectangle and wrong against a second is
//! almost always resetting state it should be carrying forward.

use flate2::{Decompress, FlushDecompress, Status};
use rfb_common::{RfbError, Result};
use rfb_protocol::types::PixelFormat;
use std::sync::Mutex;

/// Stateful ZRLE decoder. Share one instance (typically via `Arc`) across
/// every ZRLE rectangle in a session; constructing a fresh decoder per
/// rectangle silently breaks the continuous zlib stream.
pub struct ZrleDecoder {
    pixel_format: PixelFormat,
    bytes_per_pixel: usize,
    cpixel_size: usize,
    inflater: Mutex<Decompress>,
}

impl ZrleDecoder {
    pub fn new(pixel_format: PixelFormat) -> Self {
        let bytes_per_pixel = pixel_format.bytes_per_pixel();
        let cpixel_size = pixel_format.cpixel_size();
        ZrleDecoder {
            pixel_format,
            bytes_per_pixel,
            cpixel_size,
            inflater: Mutex::new(Decompress::new(true)),
        }
    }

    /// Discards and re-creates the inflate stream. Call this when a new
    /// session begins, never mid-session: doing so desynchronises every
    /// rectangle decoded afterwards against what the server actually sent.
    pub fn reset(&self) {
        let mut inflater = self.inflater.lock().expect("zrle inflater mutex poisoned");
        *inflater = Decompress::new(true);
    }

    /// Decodes one ZRLE rectangle payload (length-prefixed compressed
    /// bytes) into `width * height * bytesPerPixel` pixel bytes in the
    /// client's layout.
    pub fn decode(&self, payload: &[u8], width: u16, height: u16) -> Result<Vec<u8>> {
        if payload.len() < 4 {
            return Err(RfbError::format(
                "zrle payload shorter than its 4-byte length prefix",
            ));
        }
        let declared_len =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        if payload.len() - 4 < declared_len {
            return Err(RfbError::format(format!(
                "zrle payload declares {declared_len} compressed bytes but only {} are present",
                payload.len() - 4
            )));
        }

        let width = width as usize;
        let height = height as usize;
        let mut output = vec![0u8; width * height * self.bytes_per_pixel];

        if declared_len == 0 {
            return Ok(output);
        }

        let compressed = &payload[4..4 + declared_len];
        let decompressed = self.decompress_zlib(compressed)?;
        self.decode_tiles(&decompressed, width, height, &mut output)?;
        Ok(output)
    }

    /// Feeds `compressed` into the session's inflate stream with a
    /// non-final (`Sync`) flush, draining everything the stream can emit
    /// from this input without ending it. The stream stays open across
    /// calls so the next rectangle picks up exactly where this one left off.
    fn decompress_zlib(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        let mut inflater = self.inflater.lock().expect("zrle inflater mutex poisoned");
        let mut output = Vec::with_capacity(compressed.len() * 4);
        let mut chunk = [0u8; 32 * 1024];
        let mut consumed = 0usize;

        loop {
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let status = inflater
                .decompress(&compressed[consumed..], &mut chunk, FlushDecompress::Sync)
                .map_err(|e| RfbError::format(format!("zrle zlib stream error: {e}")))?;

            consumed += (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            output.extend_from_slice(&chunk[..produced]);

            match status {
                Status::StreamEnd => break,
                _ if consumed >= compressed.len() && produced == 0 => break,
                _ => continue,
            }
        }

        Ok(output)
    }

    fn decode_tiles(
        &self,
        decompressed: &[u8],
        width: usize,
        height: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let mut cursor = Cursor::new(decompressed);
        let mut tile_y = 0;
        while tile_y < height {
            let tile_h = (height - tile_y).min(64);
            let mut tile_x = 0;
            while tile_x < width {
                let tile_w = (width - tile_x).min(64);
                self.decode_tile(&mut cursor, tile_x, tile_y, tile_w, tile_h, width, output)?;
                tile_x += 64;
            }
            tile_y += 64;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_tile(
        &self,
        cursor: &mut Cursor,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let subtype = cursor.read_u8()?;
        match subtype {
            0 => self.decode_raw_tile(cursor, tile_x, tile_y, tile_w, tile_h, width, output),
            1 => self.decode_solid_tile(cursor, tile_x, tile_y, tile_w, tile_h, width, output),
            2..=127 => self.decode_packed_palette_tile(
                cursor,
                subtype as usize,
                tile_x,
                tile_y,
                tile_w,
                tile_h,
                width,
                output,
            ),
            128 => {
                self.decode_plain_rle_tile(cursor, tile_x, tile_y, tile_w, tile_h, width, output)
            }
            129 => Err(RfbError::format("zrle tile subtype 129 is reserved")),
            130..=255 => self.decode_palette_rle_tile(
                cursor,
                subtype as usize - 128,
                tile_x,
                tile_y,
                tile_w,
                tile_h,
                width,
                output,
            ),
        }
    }

    fn write_pixel(&self, output: &mut [u8], width: usize, x: usize, y: usize, cpixel: &[u8]) {
        let offset = (y * width + x) * self.bytes_per_pixel;
        write_cpixel(
            &mut output[offset..offset + self.bytes_per_pixel],
            cpixel,
            self.pixel_format.big_endian,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_raw_tile(
        &self,
        cursor: &mut Cursor,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        for row in 0..tile_h {
            for col in 0..tile_w {
                let cpixel = cursor.read_bytes(self.cpixel_size)?;
                self.write_pixel(output, width, tile_x + col, tile_y + row, cpixel);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_solid_tile(
        &self,
        cursor: &mut Cursor,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let cpixel = cursor.read_bytes(self.cpixel_size)?.to_vec();
        for row in 0..tile_h {
            for col in 0..tile_w {
                self.write_pixel(output, width, tile_x + col, tile_y + row, &cpixel);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_packed_palette_tile(
        &self,
        cursor: &mut Cursor,
        palette_size: usize,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let bits_per_index = packed_bits_per_index(palette_size);
        let palette = read_palette(cursor, palette_size, self.cpixel_size)?;
        let row_bytes = (tile_w * bits_per_index + 7) / 8;

        for row in 0..tile_h {
            let row_bits = cursor.read_bytes(row_bytes)?;
            let mut bit_pos = 0usize;
            for col in 0..tile_w {
                let index = read_packed_index(row_bits, bit_pos, bits_per_index) as usize;
                bit_pos += bits_per_index;
                let cpixel = palette.get(index).ok_or_else(|| {
                    RfbError::format(format!(
                        "packed palette index {index} out of range (palette size {palette_size})"
                    ))
                })?;
                self.write_pixel(output, width, tile_x + col, tile_y + row, cpixel);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_plain_rle_tile(
        &self,
        cursor: &mut Cursor,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let total = tile_w * tile_h;
        let mut written = 0usize;
        while written < total {
            let cpixel = cursor.read_bytes(self.cpixel_size)?.to_vec();
            let run = read_rle_length(cursor)? as usize;
            if written + run > total {
                return Err(RfbError::format(
                    "plain RLE run overruns the tile's pixel count",
                ));
            }
            for _ in 0..run {
                let row = written / tile_w;
                let col = written % tile_w;
                self.write_pixel(output, width, tile_x + col, tile_y + row, &cpixel);
                written += 1;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_palette_rle_tile(
        &self,
        cursor: &mut Cursor,
        palette_size: usize,
        tile_x: usize,
        tile_y: usize,
        tile_w: usize,
        tile_h: usize,
        width: usize,
        output: &mut [u8],
    ) -> Result<()> {
        let palette = read_palette(cursor, palette_size, self.cpixel_size)?;
        let total = tile_w * tile_h;
        let mut written = 0usize;
        while written < total {
            let entry = cursor.read_u8()?;
            let index = (entry & 0x7F) as usize;
            let cpixel = palette.get(index).ok_or_else(|| {
                RfbError::format(format!(
                    "palette RLE index {index} out of range (palette size {palette_size})"
                ))
            })?;
            let run = if entry & 0x80 != 0 {
                read_rle_length(cursor)? as usize
            } else {
                1
            };
            if written + run > total {
                return Err(RfbError::format(
                    "palette RLE run overruns the tile's pixel count",
                ));
            }
            for _ in 0..run {
                let row = written / tile_w;
                let col = written % tile_w;
                self.write_pixel(output, width, tile_x + col, tile_y + row, cpixel);
                written += 1;
            }
        }
        Ok(())
    }
}

/// Packed-palette bit width by palette size, per the ZRLE subencoding table.
fn packed_bits_per_index(palette_size: usize) -> usize {
    match palette_size {
        0..=2 => 1,
        3..=4 => 2,
        5..=16 => 4,
        _ => 8,
    }
}

/// Reads one bit-packed index. Indices are packed MSB-first within a byte;
/// callers must re-align to a byte boundary at the start of each row
/// themselves (by reading a fresh `row_bytes`-sized slice per row) —
/// leftover bits never carry across rows.
fn read_packed_index(row: &[u8], bit_pos: usize, bits: usize) -> u8 {
    let byte_idx = bit_pos / 8;
    let bit_offset = bit_pos % 8;
    let shift = 8 - bit_offset - bits;
    let mask = ((1u16 << bits) - 1) as u8;
    (row[byte_idx] >> shift) & mask
}

/// Run-length decoding shared by plain RLE and palette RLE: read bytes
/// while they equal `0xFF` (each worth 255), then one final non-`0xFF`
/// byte, then add one. This is the RFC-correct form; an implementation
/// that stops accumulating one sentinel byte early when the run begins
/// with `0xFF` undercounts by 255 and desynchronises the rest of the tile.
fn read_rle_length(cursor: &mut Cursor) -> Result<u32> {
    let mut sum: u32 = 0;
    loop {
        let b = cursor.read_u8()?;
        sum += b as u32;
        if b != 0xFF {
            break;
        }
    }
    Ok(sum + 1)
}

fn read_palette<'a>(
    cursor: &mut Cursor<'a>,
    count: usize,
    cpixel_size: usize,
) -> Result<Vec<&'a [u8]>> {
    (0..count).map(|_| cursor.read_bytes(cpixel_size)).collect()
}

/// Writes one CPIXEL into a client-layout pixel slot. This is the only
/// place alpha is injected — the server never sends it, and the client
/// surface is always opaque.
fn write_cpixel(dst: &mut [u8], cpixel: &[u8], big_endian: bool) {
    let bpp = dst.len();
    let csize = cpixel.len();
    if big_endian {
        for b in dst.iter_mut().take(bpp - csize) {
            *b = 0xFF;
        }
        dst[bpp - csize..].copy_from_slice(cpixel);
    } else {
        dst[..csize].copy_from_slice(cpixel);
        for b in dst.iter_mut().skip(csize) {
            *b = 0xFF;
        }
    }
}

/// A cursor over the decompressed tile stream that turns running off the
/// end into a `FormatError` instead of a panic.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| RfbError::format("truncated tile: expected 1 more byte"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| RfbError::format("tile cursor position overflowed"))?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| {
            RfbError::format(format!("truncated tile: expected {n} more byte(s)"))
        })?;
        self.pos = end;
        Ok(slice)
    }
}
