//! The XTC / XTCH container codec: page chunks, metadata and TOC,
//! buffered and streaming writers, and the reader.

pub mod chunk;
pub mod container;
pub mod metadata;
pub mod stream;

pub use chunk::{pack_page, page_size, ChunkError, ChunkHeader, CHUNK_HEADER_LEN};
pub use container::{
    parse_container, ContainerBuilder, ContainerInfo, PageIndexEntry, ParsedContainer, ReadError,
    XTCH_MAGIC, XTC_MAGIC,
};
pub use metadata::{BookMetadata, PageMapping, TocEntry};
pub use stream::StreamingWriter;
