//! The conversion pipeline: options, per-frame fan-out, manhwa
//! stitching, and the supporting buffer and ordering machinery.

pub mod buffer_pool;
pub mod frame_slots;
pub mod manhwa;
pub mod options;
pub mod orchestrator;

pub use manhwa::ManhwaStitcher;
pub use options::{
    ConversionOptions, Device, ImageMode, Orientation, PageFilter, SourceType, SplitMode,
};
pub use orchestrator::{Orchestrator, ProcessedPage};
