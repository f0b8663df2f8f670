// src/codec/metadata.rs

//! Book metadata, the table of contents, and the page mapping that
//! rewrites TOC ranges after the pipeline's 1-to-N page fan-out.
//!
//! The metadata block is laid out in fixed-size NUL-terminated UTF-8
//! cells: title 128, author 64, publisher 32, language 16, followed by
//! a 16-byte TOC header and 96-byte TOC entries.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

/// Total size of the fixed metadata cells plus the TOC header.
pub const METADATA_BLOCK_LEN: usize = 256;
/// Size of one serialized TOC entry.
pub const TOC_ENTRY_LEN: usize = 96;

/// Sentinel for "no cover page".
pub const NO_COVER_PAGE: u16 = 0xFFFF;

/// One chapter in the table of contents. Pages are 1-indexed and refer
/// to emitted pages once the mapping has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub start_page: u16,
    pub end_page: u16,
}

/// Optional book-level metadata stored in the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub language: String,
    /// Caller-provided creation timestamp (seconds). Zero keeps output
    /// deterministic.
    pub create_time: u32,
    pub cover_page: Option<u16>,
    pub toc: Vec<TocEntry>,
}

impl BookMetadata {
    pub fn with_title(title: impl Into<String>) -> Self {
        BookMetadata {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Serialized length of this block, TOC entries included.
    pub fn encoded_len(&self) -> usize {
        METADATA_BLOCK_LEN + self.toc.len() * TOC_ENTRY_LEN
    }

    /// Serializes the block into `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        write_cell(out, &self.title, 128);
        write_cell(out, &self.author, 64);
        write_cell(out, &self.publisher, 32);
        write_cell(out, &self.language, 16);

        let mut toc_header = [0u8; 16];
        LittleEndian::write_u32(&mut toc_header[0..4], self.create_time);
        LittleEndian::write_u16(
            &mut toc_header[4..6],
            self.cover_page.unwrap_or(NO_COVER_PAGE),
        );
        LittleEndian::write_u16(&mut toc_header[6..8], self.toc.len() as u16);
        out.extend_from_slice(&toc_header);

        for entry in &self.toc {
            write_cell(out, &entry.title, 80);
            let mut tail = [0u8; 16];
            LittleEndian::write_u16(&mut tail[0..2], entry.start_page);
            LittleEndian::write_u16(&mut tail[2..4], entry.end_page);
            out.extend_from_slice(&tail);
        }
    }

    /// Parses a metadata block starting at the beginning of `bytes`.
    /// Returns the metadata and the number of bytes consumed, or `None`
    /// when the slice is too short.
    pub fn decode(bytes: &[u8]) -> Option<(BookMetadata, usize)> {
        if bytes.len() < METADATA_BLOCK_LEN {
            return None;
        }
        let title = read_cell(&bytes[0..128]);
        let author = read_cell(&bytes[128..192]);
        let publisher = read_cell(&bytes[192..224]);
        let language = read_cell(&bytes[224..240]);

        let create_time = LittleEndian::read_u32(&bytes[240..244]);
        let cover_raw = LittleEndian::read_u16(&bytes[244..246]);
        let chapter_count = LittleEndian::read_u16(&bytes[246..248]) as usize;

        let toc_len = chapter_count * TOC_ENTRY_LEN;
        if bytes.len() < METADATA_BLOCK_LEN + toc_len {
            return None;
        }

        let mut toc = Vec::with_capacity(chapter_count);
        for i in 0..chapter_count {
            let at = METADATA_BLOCK_LEN + i * TOC_ENTRY_LEN;
            let entry = &bytes[at..at + TOC_ENTRY_LEN];
            toc.push(TocEntry {
                title: read_cell(&entry[0..80]),
                start_page: LittleEndian::read_u16(&entry[80..82]),
                end_page: LittleEndian::read_u16(&entry[82..84]),
            });
        }

        Some((
            BookMetadata {
                title,
                author,
                publisher,
                language,
                create_time,
                cover_page: (cover_raw != NO_COVER_PAGE).then_some(cover_raw),
                toc,
            },
            METADATA_BLOCK_LEN + toc_len,
        ))
    }
}

/// Writes a NUL-terminated UTF-8 cell of exactly `cell` bytes, keeping
/// at most `cell - 1` bytes of the string and never splitting a
/// character.
fn write_cell(out: &mut Vec<u8>, value: &str, cell: usize) {
    let truncated = truncate_utf8(value, cell - 1);
    out.extend_from_slice(truncated.as_bytes());
    out.extend(std::iter::repeat(0u8).take(cell - truncated.len()));
}

fn read_cell(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Truncates to at most `max` bytes on a character boundary.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Where one source page landed in the emitted page stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange {
    /// First emitted page of this source page, 1-indexed.
    pub start_page: u32,
    /// How many emitted pages the source page fanned out to. Zero when
    /// the page was filtered out or fully absorbed by a stitch buffer.
    pub page_count: u32,
}

/// Records the 1-to-N expansion of source pages into emitted pages.
///
/// Write-only while pages are emitted, read-only afterwards when TOC
/// ranges are rewritten.
#[derive(Debug, Clone, Default)]
pub struct PageMapping {
    ranges: BTreeMap<u32, MappedRange>,
    total_emitted: u32,
}

impl PageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `original_page` (1-indexed) produced the next
    /// `page_count` emitted pages.
    pub fn record(&mut self, original_page: u32, page_count: u32) {
        let start_page = self.total_emitted + 1;
        self.ranges.insert(
            original_page,
            MappedRange {
                start_page,
                page_count,
            },
        );
        self.total_emitted += page_count;
    }

    pub fn total_emitted(&self) -> u32 {
        self.total_emitted
    }

    pub fn lookup(&self, original_page: u32) -> Option<MappedRange> {
        self.ranges.get(&original_page).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Rewrites TOC ranges expressed in source pages into emitted pages.
    ///
    /// An entry's start becomes the first emitted page of the first
    /// producing source page at or after its start; its end becomes the
    /// last emitted page of the last producing source page at or before
    /// its end. Entries covering no producing pages are dropped.
    pub fn remap_toc(&self, toc: &[TocEntry]) -> Vec<TocEntry> {
        toc.iter()
            .filter_map(|entry| {
                let first = self
                    .ranges
                    .range(entry.start_page as u32..)
                    .find(|(_, r)| r.page_count > 0)
                    .map(|(_, r)| r)?;
                let last = self
                    .ranges
                    .range(..=entry.end_page as u32)
                    .rev()
                    .find(|(_, r)| r.page_count > 0)
                    .map(|(_, r)| r)?;

                let start = first.start_page;
                let end = last.start_page + last.page_count - 1;
                if end < start {
                    return None;
                }
                Some(TocEntry {
                    title: entry.title.clone(),
                    start_page: start as u16,
                    end_page: end as u16,
                })
            })
            .collect()
    }

    /// Synthesizes a "Page N" chapter per producing source page, the
    /// default when no explicit TOC is supplied.
    pub fn default_toc(&self) -> Vec<TocEntry> {
        self.ranges
            .iter()
            .filter(|(_, r)| r.page_count > 0)
            .map(|(&original, r)| TocEntry {
                title: format!("Page {}", original),
                start_page: r.start_page as u16,
                end_page: (r.start_page + r.page_count - 1) as u16,
            })
            .collect()
    }
}

/// Checks the TOC invariants the container enforces before writing its
/// index: ordered, non-overlapping ranges with `start <= end`, and the
/// final range ending at the total emitted page count.
pub fn validate_toc(toc: &[TocEntry], total_pages: u32) -> Result<(), String> {
    let mut previous_end = 0u32;
    for (i, entry) in toc.iter().enumerate() {
        if entry.start_page == 0 {
            return Err(format!("TOC entry {} starts at page 0", i));
        }
        if entry.start_page > entry.end_page {
            return Err(format!(
                "TOC entry {} has start {} beyond end {}",
                i, entry.start_page, entry.end_page
            ));
        }
        if (entry.start_page as u32) <= previous_end {
            return Err(format!("TOC entry {} overlaps its predecessor", i));
        }
        previous_end = entry.end_page as u32;
    }
    if let Some(last) = toc.last() {
        if last.end_page as u32 != total_pages {
            return Err(format!(
                "last TOC entry ends at {} but {} pages were emitted",
                last.end_page, total_pages
            ));
        }
    }
    Ok(())
}
