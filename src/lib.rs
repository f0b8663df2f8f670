//! A Rust library for converting paginated visual content into XTC and
//! XTCH containers for XTEink e-ink readers.
//!
//! The crate takes decoded RGBA frames (from comic archives, PDF
//! rasterizers, single images or video samplers; the decoding itself
//! stays with those collaborators), runs them through a deterministic
//! transformation pipeline (crop, rotate, split, stitch, resize,
//! filter, dither, pack), and assembles the packed pages into a
//! container with an index, optional book metadata and a table of
//! contents that tracks the pipeline's page fan-out.
//!
//! # Quick Start
//!
//! ```ignore
//! use xtc_encoder::{ConversionOptions, Orchestrator, RasterFrame};
//!
//! let opts = ConversionOptions::default();
//! let orchestrator = Orchestrator::new(opts)?;
//!
//! let frames: Vec<RasterFrame> = decode_source_frames()?;
//! let bytes = orchestrator.convert(&frames, None)?;
//! std::fs::write("output.xtc", bytes)?;
//! ```
//!
//! # Formats
//!
//! - **XTC** (`"XTC\0"`): 1-bit container of XTG page chunks.
//! - **XTCH** (`"XTCH"`): 2-bit container of XTH page chunks.

// Core modules
pub mod codec;
pub mod dither;
pub mod image;
pub mod pipeline;
pub mod utils;

// Public pipeline API
pub use pipeline::{
    ConversionOptions, Device, ImageMode, Orchestrator, Orientation, PageFilter, ProcessedPage,
    SourceType, SplitMode,
};

// Codec types
pub use codec::{BookMetadata, ContainerBuilder, PageMapping, StreamingWriter, TocEntry};

// Image and dithering types
pub use dither::{BitDepth, DitherAlgorithm};
pub use image::{GrayRaster, Margins, RasterFrame, Rgba};

// Error types
pub use utils::{CancelToken, Result, XtcError};

// Constants
pub const XTC_VERSION: &str = "0.1.0";
