// src/codec/container.rs

//! The XTC / XTCH container: header, optional metadata block, index
//! table and data region.
//!
//! Layout:
//!
//! ```text
//! [header 48|56] [metadata + TOC entries]? [index 16*pages] [chunks...]
//! ```
//!
//! The 56-byte header form (with the trailing TOC-entries offset) exists
//! only when metadata is present. All integers are little-endian.

use crate::codec::chunk::{self, ChunkError, ChunkHeader};
use crate::codec::metadata::{validate_toc, BookMetadata, METADATA_BLOCK_LEN};
use crate::dither::BitDepth;
use crate::image::raster::GrayRaster;
use crate::utils::error::{Result, XtcError};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;
use thiserror::Error;

/// File magic for 1-bit containers.
pub const XTC_MAGIC: [u8; 4] = *b"XTC\0";
/// File magic for 2-bit containers.
pub const XTCH_MAGIC: [u8; 4] = *b"XTCH";

/// Container format version.
pub const CONTAINER_VERSION: u16 = 1;

/// Header length without and with the metadata extension.
pub const HEADER_LEN: usize = 48;
pub const HEADER_LEN_WITH_METADATA: usize = 56;

/// Flag words written when a metadata block is present. The reader
/// preserves whatever it finds without interpreting unknown bits.
pub const FLAGS_LOW_METADATA: u32 = 0x0100_0100;
pub const FLAGS_HIGH_METADATA: u32 = 0x0000_0001;

/// Bit inside `flagsLow` marking a present metadata block.
const FLAG_HAS_METADATA: u32 = 0x0000_0100;

/// Size of one index table entry.
pub const INDEX_ENTRY_LEN: usize = 16;

/// One entry of the page index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndexEntry {
    /// Absolute byte offset of the chunk within the file.
    pub offset: u64,
    /// Full chunk length including its 22-byte header.
    pub size: u32,
    pub width: u16,
    pub height: u16,
}

/// Errors produced while parsing a container.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("not an XTC container: magic {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("container truncated: {0}")]
    Truncated(String),
    #[error("index entry {index}: offset {offset} + size {size} escapes file of {file_len} bytes")]
    IndexOutOfBounds {
        index: usize,
        offset: u64,
        size: u32,
        file_len: usize,
    },
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

impl From<ReadError> for XtcError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Chunk(inner) => XtcError::MalformedChunk(inner.to_string()),
            other => XtcError::MalformedContainer(other.to_string()),
        }
    }
}

/// Computed byte layout of a container before any data is written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub header_len: usize,
    pub metadata_offset: u64,
    pub toc_entries_offset: u64,
    pub index_offset: u64,
    pub data_offset: u64,
}

pub(crate) fn layout(metadata: Option<&BookMetadata>, page_count: usize) -> Layout {
    match metadata {
        Some(meta) => {
            let header_len = HEADER_LEN_WITH_METADATA;
            let metadata_offset = header_len as u64;
            let toc_entries_offset = metadata_offset + METADATA_BLOCK_LEN as u64;
            let index_offset = metadata_offset + meta.encoded_len() as u64;
            Layout {
                header_len,
                metadata_offset,
                toc_entries_offset,
                index_offset,
                data_offset: index_offset + (page_count * INDEX_ENTRY_LEN) as u64,
            }
        }
        None => Layout {
            header_len: HEADER_LEN,
            metadata_offset: 0,
            toc_entries_offset: 0,
            index_offset: HEADER_LEN as u64,
            data_offset: (HEADER_LEN + page_count * INDEX_ENTRY_LEN) as u64,
        },
    }
}

/// Encodes everything that precedes the data region: header, optional
/// metadata block, and the index table for pages of the given sizes.
///
/// Returns the serialized prelude together with the index entries it
/// describes. Both the buffered and the streaming writer go through
/// this, which is what makes their outputs byte-identical.
pub(crate) fn encode_prelude(
    depth: BitDepth,
    metadata: Option<&BookMetadata>,
    pages: &[(u16, u16)],
) -> Result<(Vec<u8>, Vec<PageIndexEntry>)> {
    if pages.len() > u16::MAX as usize {
        return Err(XtcError::InternalInvariant(format!(
            "{} pages exceed the container's u16 page count",
            pages.len()
        )));
    }
    if let Some(meta) = metadata {
        validate_toc(&meta.toc, pages.len() as u32).map_err(XtcError::InternalInvariant)?;
    }

    let layout = layout(metadata, pages.len());

    let mut index = Vec::with_capacity(pages.len());
    let mut offset = layout.data_offset;
    for &(w, h) in pages {
        let size = chunk::page_size(w as u32, h as u32, depth) as u32;
        index.push(PageIndexEntry {
            offset,
            size,
            width: w,
            height: h,
        });
        offset += size as u64;
    }

    let mut prelude = Vec::with_capacity(layout.data_offset as usize);

    // Header
    let magic = match depth {
        BitDepth::One => XTC_MAGIC,
        BitDepth::Two => XTCH_MAGIC,
    };
    let mut header = vec![0u8; layout.header_len];
    header[0..4].copy_from_slice(&magic);
    LittleEndian::write_u16(&mut header[4..6], CONTAINER_VERSION);
    LittleEndian::write_u16(&mut header[6..8], pages.len() as u16);
    if metadata.is_some() {
        LittleEndian::write_u32(&mut header[8..12], FLAGS_LOW_METADATA);
        LittleEndian::write_u32(&mut header[12..16], FLAGS_HIGH_METADATA);
    }
    LittleEndian::write_u64(&mut header[16..24], layout.metadata_offset);
    LittleEndian::write_u64(&mut header[24..32], layout.index_offset);
    LittleEndian::write_u64(&mut header[32..40], layout.data_offset);
    // header[40..48] reserved, zero.
    if metadata.is_some() {
        LittleEndian::write_u64(&mut header[48..56], layout.toc_entries_offset);
    }
    prelude.extend_from_slice(&header);

    if let Some(meta) = metadata {
        meta.encode_into(&mut prelude);
    }

    for entry in &index {
        let mut cell = [0u8; INDEX_ENTRY_LEN];
        LittleEndian::write_u64(&mut cell[0..8], entry.offset);
        LittleEndian::write_u32(&mut cell[8..12], entry.size);
        LittleEndian::write_u16(&mut cell[12..14], entry.width);
        LittleEndian::write_u16(&mut cell[14..16], entry.height);
        prelude.extend_from_slice(&cell);
    }

    debug_assert_eq!(prelude.len() as u64, layout.data_offset);
    Ok((prelude, index))
}

// ============================================================================
// Buffered writer
// ============================================================================

struct PackedPage {
    chunk: Vec<u8>,
    width: u16,
    height: u16,
}

/// Assembles a container fully in memory: collect packed chunks, then
/// emit the whole file at once.
pub struct ContainerBuilder {
    depth: BitDepth,
    metadata: Option<BookMetadata>,
    pages: Vec<PackedPage>,
}

impl ContainerBuilder {
    pub fn new(depth: BitDepth) -> Self {
        ContainerBuilder {
            depth,
            metadata: None,
            pages: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BookMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn set_metadata(&mut self, metadata: Option<BookMetadata>) {
        self.metadata = metadata;
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Appends one packed page. The chunk must carry a header matching
    /// the container's bit depth.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        let (header, _) = chunk::parse_chunk(&chunk)
            .map_err(|e| XtcError::InternalInvariant(format!("unpackable page chunk: {}", e)))?;
        let expected_two_bit = matches!(self.depth, BitDepth::Two);
        if header.is_two_bit() != expected_two_bit {
            return Err(XtcError::InternalInvariant(format!(
                "chunk magic {:?} does not match container depth",
                header.magic
            )));
        }
        self.pages.push(PackedPage {
            chunk,
            width: header.width,
            height: header.height,
        });
        Ok(())
    }

    /// Writes the complete container to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let dims: Vec<(u16, u16)> = self.pages.iter().map(|p| (p.width, p.height)).collect();

        let (prelude, index) = encode_prelude(self.depth, self.metadata.as_ref(), &dims)?;
        for (entry, page) in index.iter().zip(&self.pages) {
            if entry.size as usize != page.chunk.len() {
                return Err(XtcError::InternalInvariant(format!(
                    "chunk length {} disagrees with indexed size {}",
                    page.chunk.len(),
                    entry.size
                )));
            }
        }

        writer.write_all(&prelude)?;
        for page in &self.pages {
            writer.write_all(&page.chunk)?;
        }
        Ok(())
    }

    /// Convenience: assembles the container into a byte vector.
    pub fn finalize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Parsed header fields and index of an existing container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub two_bit: bool,
    pub version: u16,
    pub page_count: u16,
    /// Raw flag words, preserved verbatim; unknown bits are not
    /// interpreted.
    pub flags_low: u32,
    pub flags_high: u32,
    pub metadata_offset: u64,
    pub index_offset: u64,
    pub data_offset: u64,
    pub toc_entries_offset: Option<u64>,
    pub metadata: Option<BookMetadata>,
    pub index: Vec<PageIndexEntry>,
}

/// A parsed container borrowing the underlying file bytes.
pub struct ParsedContainer<'a> {
    pub info: ContainerInfo,
    bytes: &'a [u8],
}

/// Parses and validates a container file.
pub fn parse_container(bytes: &[u8]) -> std::result::Result<ParsedContainer<'_>, ReadError> {
    if bytes.len() < HEADER_LEN {
        return Err(ReadError::Truncated(format!(
            "{} bytes is shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if magic[0..3] != *b"XTC" || (magic[3] != 0x00 && magic[3] != 0x48) {
        return Err(ReadError::BadMagic(magic));
    }
    let two_bit = magic[3] == 0x48;

    let version = LittleEndian::read_u16(&bytes[4..6]);
    let page_count = LittleEndian::read_u16(&bytes[6..8]);
    let flags_low = LittleEndian::read_u32(&bytes[8..12]);
    let flags_high = LittleEndian::read_u32(&bytes[12..16]);
    let metadata_offset = LittleEndian::read_u64(&bytes[16..24]);
    let index_offset = LittleEndian::read_u64(&bytes[24..32]);
    let data_offset = LittleEndian::read_u64(&bytes[32..40]);

    let has_metadata = flags_low & FLAG_HAS_METADATA != 0;

    let toc_entries_offset = if has_metadata {
        if bytes.len() < HEADER_LEN_WITH_METADATA {
            return Err(ReadError::Truncated(
                "metadata flagged but the extended header is missing".into(),
            ));
        }
        Some(LittleEndian::read_u64(&bytes[48..56]))
    } else {
        None
    };

    let metadata = if has_metadata {
        let at = metadata_offset as usize;
        if at >= bytes.len() {
            return Err(ReadError::Truncated("metadata offset beyond file".into()));
        }
        let (meta, _) = BookMetadata::decode(&bytes[at..])
            .ok_or_else(|| ReadError::Truncated("metadata block cut short".into()))?;
        Some(meta)
    } else {
        None
    };

    let index_end = index_offset as usize + page_count as usize * INDEX_ENTRY_LEN;
    if index_end > bytes.len() {
        return Err(ReadError::Truncated(format!(
            "index table of {} pages ends at {} in a {}-byte file",
            page_count,
            index_end,
            bytes.len()
        )));
    }

    let mut index = Vec::with_capacity(page_count as usize);
    for i in 0..page_count as usize {
        let at = index_offset as usize + i * INDEX_ENTRY_LEN;
        let cell = &bytes[at..at + INDEX_ENTRY_LEN];
        let entry = PageIndexEntry {
            offset: LittleEndian::read_u64(&cell[0..8]),
            size: LittleEndian::read_u32(&cell[8..12]),
            width: LittleEndian::read_u16(&cell[12..14]),
            height: LittleEndian::read_u16(&cell[14..16]),
        };
        let end = entry.offset.checked_add(entry.size as u64);
        if entry.offset < data_offset || end.map_or(true, |e| e > bytes.len() as u64) {
            return Err(ReadError::IndexOutOfBounds {
                index: i,
                offset: entry.offset,
                size: entry.size,
                file_len: bytes.len(),
            });
        }
        index.push(entry);
    }

    Ok(ParsedContainer {
        info: ContainerInfo {
            two_bit,
            version,
            page_count,
            flags_low,
            flags_high,
            metadata_offset,
            index_offset,
            data_offset,
            toc_entries_offset,
            metadata,
            index,
        },
        bytes,
    })
}

impl<'a> ParsedContainer<'a> {
    /// Raw bytes of page `i`, header included.
    pub fn chunk_bytes(&self, i: usize) -> &'a [u8] {
        let entry = &self.info.index[i];
        &self.bytes[entry.offset as usize..(entry.offset + entry.size as u64) as usize]
    }

    /// Parses the chunk header of page `i`.
    pub fn chunk_header(&self, i: usize) -> std::result::Result<ChunkHeader, ReadError> {
        let (header, _) = chunk::parse_chunk(self.chunk_bytes(i))?;
        Ok(header)
    }

    /// Decodes page `i` back into its quantized grayscale raster.
    pub fn decode_page(&self, i: usize) -> std::result::Result<GrayRaster, ReadError> {
        let (header, payload) = chunk::parse_chunk(self.chunk_bytes(i))?;
        Ok(chunk::unpack_page(&header, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::chunk::pack_page;
    use crate::codec::metadata::TocEntry;

    fn page(value: u8, depth: BitDepth) -> Vec<u8> {
        pack_page(&GrayRaster::new(480, 800, value), depth)
    }

    #[test]
    fn headerless_layout_starts_index_at_48() {
        let l = layout(None, 3);
        assert_eq!(l.header_len, 48);
        assert_eq!(l.index_offset, 48);
        assert_eq!(l.data_offset, 48 + 3 * 16);
    }

    #[test]
    fn metadata_layout_accounts_for_toc() {
        let meta = BookMetadata {
            toc: vec![TocEntry { title: "A".into(), start_page: 1, end_page: 2 }],
            ..BookMetadata::with_title("t")
        };
        let l = layout(Some(&meta), 2);
        assert_eq!(l.header_len, 56);
        assert_eq!(l.metadata_offset, 56);
        assert_eq!(l.toc_entries_offset, 56 + 256);
        assert_eq!(l.index_offset, 56 + 256 + 96);
        assert_eq!(l.data_offset, 56 + 256 + 96 + 2 * 16);
    }

    #[test]
    fn single_white_page_container_matches_expected_bytes() {
        let mut builder = ContainerBuilder::new(BitDepth::One);
        builder.push_chunk(page(255, BitDepth::One)).unwrap();
        let bytes = builder.finalize().unwrap();

        assert_eq!(&bytes[0..4], b"XTC\0");
        assert_eq!(LittleEndian::read_u16(&bytes[4..6]), 1);
        assert_eq!(LittleEndian::read_u16(&bytes[6..8]), 1);
        assert_eq!(LittleEndian::read_u32(&bytes[8..12]), 0);
        assert_eq!(bytes.len(), 48 + 16 + 48_022);

        let parsed = parse_container(&bytes).unwrap();
        assert!(!parsed.info.two_bit);
        assert_eq!(parsed.info.index[0].offset, 64);
        assert_eq!(parsed.info.index[0].size, 48_022);
        let payload = &parsed.chunk_bytes(0)[22..];
        assert!(payload.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn index_entries_are_contiguous() {
        let mut builder = ContainerBuilder::new(BitDepth::One);
        for v in [0, 128, 255] {
            builder.push_chunk(page(v, BitDepth::One)).unwrap();
        }
        let bytes = builder.finalize().unwrap();
        let parsed = parse_container(&bytes).unwrap();

        let index = &parsed.info.index;
        for pair in index.windows(2) {
            assert_eq!(pair[0].offset + pair[0].size as u64, pair[1].offset);
        }
        let last = index.last().unwrap();
        assert_eq!(last.offset + last.size as u64, bytes.len() as u64);
    }

    #[test]
    fn metadata_and_toc_round_trip_through_file() {
        let meta = BookMetadata {
            title: "Volume 1".into(),
            author: "Author".into(),
            create_time: 0,
            toc: vec![
                TocEntry { title: "A".into(), start_page: 1, end_page: 1 },
                TocEntry { title: "B".into(), start_page: 2, end_page: 2 },
            ],
            ..Default::default()
        };

        let mut builder = ContainerBuilder::new(BitDepth::Two).with_metadata(meta.clone());
        builder.push_chunk(page(0, BitDepth::Two)).unwrap();
        builder.push_chunk(page(255, BitDepth::Two)).unwrap();
        let bytes = builder.finalize().unwrap();

        assert_eq!(&bytes[0..4], b"XTCH");
        assert_eq!(LittleEndian::read_u32(&bytes[8..12]), FLAGS_LOW_METADATA);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), FLAGS_HIGH_METADATA);

        let parsed = parse_container(&bytes).unwrap();
        assert!(parsed.info.two_bit);
        assert_eq!(parsed.info.metadata.as_ref(), Some(&meta));
        assert_eq!(parsed.info.toc_entries_offset, Some(56 + 256));
    }

    #[test]
    fn builder_rejects_mismatched_depth_and_bad_toc() {
        let mut builder = ContainerBuilder::new(BitDepth::One);
        assert!(matches!(
            builder.push_chunk(page(0, BitDepth::Two)),
            Err(XtcError::InternalInvariant(_))
        ));

        let meta = BookMetadata {
            toc: vec![TocEntry { title: "A".into(), start_page: 1, end_page: 9 }],
            ..Default::default()
        };
        let mut builder = ContainerBuilder::new(BitDepth::One).with_metadata(meta);
        builder.push_chunk(page(0, BitDepth::One)).unwrap();
        assert!(matches!(
            builder.finalize(),
            Err(XtcError::InternalInvariant(_))
        ));
    }

    #[test]
    fn reader_rejects_structural_damage() {
        let mut builder = ContainerBuilder::new(BitDepth::One);
        builder.push_chunk(page(255, BitDepth::One)).unwrap();
        let bytes = builder.finalize().unwrap();

        // Bad magic
        let mut bad = bytes.clone();
        bad[0] = b'A';
        assert!(matches!(parse_container(&bad), Err(ReadError::BadMagic(_))));

        // Truncated before the index
        assert!(matches!(
            parse_container(&bytes[..50]),
            Err(ReadError::Truncated(_))
        ));

        // Index entry escaping the file
        let mut escaped = bytes.clone();
        LittleEndian::write_u32(&mut escaped[48 + 8..48 + 12], u32::MAX);
        assert!(matches!(
            parse_container(&escaped),
            Err(ReadError::IndexOutOfBounds { .. })
        ));

        // Chunk magic damaged: container parses, chunk decode fails.
        let mut chunk_bad = bytes.clone();
        chunk_bad[64] = b'Q';
        let parsed = parse_container(&chunk_bad).unwrap();
        assert!(parsed.decode_page(0).is_err());
    }

    #[test]
    fn container_round_trips_chunks_exactly() {
        let chunks: Vec<Vec<u8>> = [10u8, 90, 200]
            .iter()
            .map(|&v| page(v, BitDepth::One))
            .collect();

        let mut builder = ContainerBuilder::new(BitDepth::One);
        for c in &chunks {
            builder.push_chunk(c.clone()).unwrap();
        }
        let bytes = builder.finalize().unwrap();
        let parsed = parse_container(&bytes).unwrap();

        for (i, original) in chunks.iter().enumerate() {
            assert_eq!(parsed.chunk_bytes(i), &original[..]);
        }
    }
}
