// src/codec/stream.rs

//! The streaming container writer.
//!
//! A linear state machine: the header, metadata block and index table
//! are emitted up front from precomputed page dimensions (every pipeline
//! page is device-sized, so chunk sizes are known before packing), then
//! chunks are appended one by one in page order, and `finish` seals the
//! stream. Because the prelude encoder is shared with the buffered
//! writer, both modes produce byte-identical files.

use crate::codec::container::{encode_prelude, PageIndexEntry};
use crate::codec::metadata::BookMetadata;
use crate::dither::BitDepth;
use crate::utils::error::{Result, XtcError};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Closed,
}

/// Writes a container front to back without buffering page data.
pub struct StreamingWriter<W: Write> {
    writer: W,
    state: State,
    index: Vec<PageIndexEntry>,
    next_page: usize,
    bytes_written: u64,
}

impl<W: Write> StreamingWriter<W> {
    /// Emits header, metadata and index immediately; the writer is then
    /// ready to accept `page_dims.len()` chunks in order.
    pub fn new(
        mut writer: W,
        depth: BitDepth,
        metadata: Option<&BookMetadata>,
        page_dims: &[(u16, u16)],
    ) -> Result<Self> {
        let (prelude, index) = encode_prelude(depth, metadata, page_dims)?;
        writer.write_all(&prelude)?;
        Ok(StreamingWriter {
            writer,
            state: State::Data,
            bytes_written: prelude.len() as u64,
            index,
            next_page: 0,
        })
    }

    pub fn pages_expected(&self) -> usize {
        self.index.len()
    }

    pub fn pages_written(&self) -> usize {
        self.next_page
    }

    /// Bytes emitted so far. On failure the caller uses this to discard
    /// the partial output.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Appends the next page chunk. The chunk length must match the size
    /// the index already promised for this page.
    pub fn append_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.state != State::Data {
            return Err(XtcError::InternalInvariant(
                "append after the stream was finished".into(),
            ));
        }
        let entry = self.index.get(self.next_page).ok_or_else(|| {
            XtcError::InternalInvariant(format!(
                "page {} appended to a {}-page stream",
                self.next_page + 1,
                self.index.len()
            ))
        })?;
        if chunk.len() as u64 != entry.size as u64 {
            return Err(XtcError::InternalInvariant(format!(
                "page {} chunk is {} bytes, index promised {}",
                self.next_page + 1,
                chunk.len(),
                entry.size
            )));
        }

        self.writer.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        self.next_page += 1;
        Ok(())
    }

    /// Seals the stream, verifying that every indexed page arrived.
    pub fn finish(mut self) -> Result<W> {
        if self.next_page != self.index.len() {
            return Err(XtcError::InternalInvariant(format!(
                "stream finished after {} of {} pages",
                self.next_page,
                self.index.len()
            )));
        }
        self.state = State::Closed;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::chunk::pack_page;
    use crate::codec::container::{parse_container, ContainerBuilder};
    use crate::image::raster::GrayRaster;

    fn chunk(value: u8) -> Vec<u8> {
        pack_page(&GrayRaster::new(480, 800, value), BitDepth::One)
    }

    #[test]
    fn streamed_bytes_equal_buffered_bytes() {
        let chunks = [chunk(0), chunk(128), chunk(255)];

        let mut builder = ContainerBuilder::new(BitDepth::One);
        for c in &chunks {
            builder.push_chunk(c.clone()).unwrap();
        }
        let buffered = builder.finalize().unwrap();

        let dims = vec![(480u16, 800u16); 3];
        let mut stream =
            StreamingWriter::new(Vec::new(), BitDepth::One, None, &dims).unwrap();
        for c in &chunks {
            stream.append_chunk(c).unwrap();
        }
        let streamed = stream.finish().unwrap();

        assert_eq!(buffered, streamed);
    }

    #[test]
    fn prelude_is_written_before_any_page() {
        let dims = vec![(480u16, 800u16); 2];
        let stream = StreamingWriter::new(Vec::new(), BitDepth::One, None, &dims).unwrap();
        assert_eq!(stream.bytes_written(), 48 + 2 * 16);
        assert_eq!(stream.pages_written(), 0);
    }

    #[test]
    fn wrong_size_and_missing_pages_are_invariant_violations() {
        let dims = vec![(480u16, 800u16); 2];
        let mut stream =
            StreamingWriter::new(Vec::new(), BitDepth::One, None, &dims).unwrap();

        let tiny = pack_page(&GrayRaster::new(8, 8, 0), BitDepth::One);
        assert!(matches!(
            stream.append_chunk(&tiny),
            Err(XtcError::InternalInvariant(_))
        ));

        stream.append_chunk(&chunk(0)).unwrap();
        assert!(matches!(
            stream.finish(),
            Err(XtcError::InternalInvariant(_))
        ));
    }

    #[test]
    fn streamed_container_parses_back() {
        let dims = vec![(480u16, 800u16); 1];
        let mut stream =
            StreamingWriter::new(Vec::new(), BitDepth::One, None, &dims).unwrap();
        stream.append_chunk(&chunk(255)).unwrap();
        let bytes = stream.finish().unwrap();

        let parsed = parse_container(&bytes).unwrap();
        assert_eq!(parsed.info.page_count, 1);
        assert_eq!(parsed.info.index[0].size, 48_022);
    }
}
