// src/codec/chunk.rs

//! XTG / XTH page chunks.
//!
//! A packed page is a 22-byte header followed by the raw bit data. XTG
//! is 1-bit, row-major, MSB-first, `1` = white. XTH is 2-bit planar:
//! two bit planes scanned vertically with columns written right to
//! left, plane 0 carrying bit 0 and plane 1 carrying bit 1 of the
//! level index (0 = white .. 3 = black).

use crate::dither::BitDepth;
use crate::image::raster::GrayRaster;
use byteorder::{ByteOrder, LittleEndian};
use md5::{Digest, Md5};
use thiserror::Error;

/// Chunk magic for 1-bit pages.
pub const XTG_MAGIC: [u8; 4] = *b"XTG\0";
/// Chunk magic for 2-bit pages.
pub const XTH_MAGIC: [u8; 4] = *b"XTH\0";

/// Size of the fixed chunk header.
pub const CHUNK_HEADER_LEN: usize = 22;

/// Errors produced while parsing a chunk.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk shorter than its {CHUNK_HEADER_LEN}-byte header")]
    TruncatedHeader,
    #[error("unknown chunk magic {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("declared payload length {declared} does not match {actual} available bytes")]
    LengthMismatch { declared: u32, actual: usize },
    #[error("payload length {actual} does not match {expected} for {width}x{height}")]
    SizeMismatch {
        expected: u64,
        actual: usize,
        width: u16,
        height: u16,
    },
}

/// The parsed 22-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub magic: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub color_mode: u8,
    pub compression: u8,
    pub payload_len: u32,
    /// First 8 bytes of the MD5 digest of the payload. Used only for
    /// equality checks, never as a cryptographic guarantee.
    pub digest: [u8; 8],
}

impl ChunkHeader {
    pub fn is_two_bit(&self) -> bool {
        self.magic == XTH_MAGIC
    }
}

/// Number of bytes a packed page occupies, header included.
///
/// 1-bit: `22 + ceil(w/8) * h`. 2-bit: `22 + 2 * ceil(h/8) * w`.
pub fn page_size(width: u32, height: u32, depth: BitDepth) -> u64 {
    let payload = match depth {
        BitDepth::One => (width as u64 + 7) / 8 * height as u64,
        BitDepth::Two => 2 * ((height as u64 + 7) / 8) * width as u64,
    };
    CHUNK_HEADER_LEN as u64 + payload
}

/// Packs a quantized grayscale raster into a complete chunk
/// (header + payload).
pub fn pack_page(gray: &GrayRaster, depth: BitDepth) -> Vec<u8> {
    let (payload, magic) = match depth {
        BitDepth::One => (pack_xtg_payload(gray), XTG_MAGIC),
        BitDepth::Two => (pack_xth_payload(gray), XTH_MAGIC),
    };

    let digest = Md5::digest(&payload);

    let mut header = [0u8; CHUNK_HEADER_LEN];
    header[0..4].copy_from_slice(&magic);
    LittleEndian::write_u16(&mut header[4..6], gray.width() as u16);
    LittleEndian::write_u16(&mut header[6..8], gray.height() as u16);
    // header[8], header[9]: colorMode and compression, both zero.
    LittleEndian::write_u32(&mut header[10..14], payload.len() as u32);
    header[14..22].copy_from_slice(&digest[..8]);

    let mut chunk = Vec::with_capacity(CHUNK_HEADER_LEN + payload.len());
    chunk.extend_from_slice(&header);
    chunk.extend_from_slice(&payload);
    chunk
}

/// 1-bit payload: row stride `ceil(w/8)`, bit `7 - (x & 7)` of byte
/// `y * stride + x / 8`; a set bit means white (`gray >= 128`).
fn pack_xtg_payload(gray: &GrayRaster) -> Vec<u8> {
    let (w, h) = gray.dimensions();
    let row_bytes = ((w + 7) / 8) as usize;
    let mut payload = vec![0u8; row_bytes * h as usize];

    for y in 0..h {
        let row = gray.row(y);
        let base = y as usize * row_bytes;
        for (x, &value) in row.iter().enumerate() {
            if value >= 128 {
                payload[base + (x >> 3)] |= 1 << (7 - (x & 7));
            }
        }
    }
    payload
}

/// Maps a gray value to its 2-bit level index: 0 white, 1 light gray,
/// 2 dark gray, 3 black.
#[inline]
fn two_bit_level(value: u8) -> u8 {
    if value >= 212 {
        0
    } else if value >= 127 {
        1
    } else if value >= 42 {
        2
    } else {
        3
    }
}

/// 2-bit payload: plane 0 then plane 1, each `ceil(h/8) * w` bytes.
/// Columns are stored right to left; within a column the vertical bit
/// position is `7 - (y & 7)` at byte `col * col_bytes + y / 8`.
fn pack_xth_payload(gray: &GrayRaster) -> Vec<u8> {
    let (w, h) = gray.dimensions();
    let col_bytes = ((h + 7) / 8) as usize;
    let plane_len = col_bytes * w as usize;
    let mut payload = vec![0u8; 2 * plane_len];
    let (plane0, plane1) = payload.split_at_mut(plane_len);

    for x in 0..w {
        let col = (w - 1 - x) as usize;
        for y in 0..h {
            let level = two_bit_level(gray.get(x, y));
            if level == 0 {
                continue;
            }
            let byte_idx = col * col_bytes + (y >> 3) as usize;
            let bit = 1u8 << (7 - (y & 7));
            if level & 1 != 0 {
                plane0[byte_idx] |= bit;
            }
            if level & 2 != 0 {
                plane1[byte_idx] |= bit;
            }
        }
    }
    payload
}

/// Splits a chunk into its parsed header and payload slice.
pub fn parse_chunk(bytes: &[u8]) -> Result<(ChunkHeader, &[u8]), ChunkError> {
    if bytes.len() < CHUNK_HEADER_LEN {
        return Err(ChunkError::TruncatedHeader);
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if magic != XTG_MAGIC && magic != XTH_MAGIC {
        return Err(ChunkError::BadMagic(magic));
    }

    let width = LittleEndian::read_u16(&bytes[4..6]);
    let height = LittleEndian::read_u16(&bytes[6..8]);
    let color_mode = bytes[8];
    let compression = bytes[9];
    let payload_len = LittleEndian::read_u32(&bytes[10..14]);
    let mut digest = [0u8; 8];
    digest.copy_from_slice(&bytes[14..22]);

    let header = ChunkHeader {
        magic,
        width,
        height,
        color_mode,
        compression,
        payload_len,
        digest,
    };

    let available = bytes.len() - CHUNK_HEADER_LEN;
    if payload_len as usize != available {
        return Err(ChunkError::LengthMismatch {
            declared: payload_len,
            actual: available,
        });
    }

    let depth = if header.is_two_bit() {
        BitDepth::Two
    } else {
        BitDepth::One
    };
    let expected = page_size(width as u32, height as u32, depth) - CHUNK_HEADER_LEN as u64;
    if expected != payload_len as u64 {
        return Err(ChunkError::SizeMismatch {
            expected,
            actual: payload_len as usize,
            width,
            height,
        });
    }

    Ok((header, &bytes[CHUNK_HEADER_LEN..]))
}

/// Decodes a parsed chunk back into the quantized grayscale raster that
/// entered the packer.
pub fn unpack_page(header: &ChunkHeader, payload: &[u8]) -> GrayRaster {
    let (w, h) = (header.width as u32, header.height as u32);
    if header.is_two_bit() {
        const LEVELS: [u8; 4] = [255, 170, 85, 0];
        let col_bytes = ((h + 7) / 8) as usize;
        let plane_len = col_bytes * w as usize;
        let (plane0, plane1) = payload.split_at(plane_len);

        GrayRaster::from_fn(w, h, |x, y| {
            let col = (w - 1 - x) as usize;
            let byte_idx = col * col_bytes + (y >> 3) as usize;
            let bit = 7 - (y & 7);
            let b0 = (plane0[byte_idx] >> bit) & 1;
            let b1 = (plane1[byte_idx] >> bit) & 1;
            LEVELS[(b1 << 1 | b0) as usize]
        })
    } else {
        let row_bytes = ((w + 7) / 8) as usize;
        GrayRaster::from_fn(w, h, |x, y| {
            let byte = payload[y as usize * row_bytes + (x >> 3) as usize];
            if (byte >> (7 - (x & 7))) & 1 != 0 {
                255
            } else {
                0
            }
        })
    }
}
