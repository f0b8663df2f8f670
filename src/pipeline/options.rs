// src/pipeline/options.rs

//! Conversion options: the immutable value object a whole conversion
//! runs under, plus the enumerations behind the CLI flags.

use crate::dither::{BitDepth, DitherAlgorithm};
use crate::image::filters::{FilterSettings, CONTRAST_LEVELS, GAMMA_MAX, GAMMA_MIN};
use crate::image::geom::Margins;
use crate::utils::error::{Result, XtcError};

/// Target e-ink device, identified by its fixed portrait geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Device {
    /// 480 x 800
    #[default]
    #[value(name = "X4", alias = "x4")]
    X4,
    /// 528 x 792
    #[value(name = "X3", alias = "x3")]
    X3,
}

impl Device {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Device::X4 => (480, 800),
            Device::X3 => (528, 792),
        }
    }
}

/// What kind of source produced the decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SourceType {
    #[default]
    Cbz,
    Pdf,
    Image,
    Video,
}

impl SourceType {
    /// Comics read sideways by default; single images and video frames
    /// read upright.
    pub fn default_orientation(self) -> Orientation {
        match self {
            SourceType::Cbz | SourceType::Pdf => Orientation::Landscape,
            SourceType::Image | SourceType::Video => Orientation::Portrait,
        }
    }
}

/// Reading orientation of the emitted pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// How landscape reading splits a page across screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SplitMode {
    /// Overlapping screen-filling segments.
    #[default]
    Overlap,
    /// Two non-overlapping halves.
    Split,
    /// A single sideways page.
    Nosplit,
}

/// Scaling mode for single-image sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ImageMode {
    /// Scale to fill the screen and crop the overflow.
    #[default]
    Cover,
    /// Scale to fit and pad the remainder.
    Letterbox,
    /// Stretch to the exact screen size.
    Fill,
    /// Center without scaling.
    Crop,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Device::X4 => "X4",
            Device::X3 => "X3",
        })
    }
}

impl std::fmt::Display for SplitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SplitMode::Overlap => "overlap",
            SplitMode::Split => "split",
            SplitMode::Nosplit => "nosplit",
        })
    }
}

impl std::fmt::Display for ImageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ImageMode::Cover => "cover",
            ImageMode::Letterbox => "letterbox",
            ImageMode::Fill => "fill",
            ImageMode::Crop => "crop",
        })
    }
}

/// Allowed manhwa overlap percentages.
pub const MANHWA_OVERLAP_CHOICES: [u32; 3] = [30, 50, 75];

/// Source-page selection: 1-indexed start/stop bounds and explicit
/// skips. Pages outside the selection emit nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilter {
    pub start: Option<u32>,
    pub stop: Option<u32>,
    pub skip: Vec<u32>,
}

impl PageFilter {
    pub fn allows(&self, page: u32) -> bool {
        if let Some(start) = self.start {
            if page < start {
                return false;
            }
        }
        if let Some(stop) = self.stop {
            if page > stop {
                return false;
            }
        }
        !self.skip.contains(&page)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.skip.is_empty()
    }
}

/// Every knob of one conversion. Immutable once validated.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub device: Device,
    pub source_type: SourceType,
    pub two_bit: bool,
    pub dither: DitherAlgorithm,
    pub contrast: u8,
    pub gamma: f32,
    pub invert: bool,
    pub pad_black: bool,
    pub orientation: Orientation,
    pub split_mode: SplitMode,
    pub include_overviews: bool,
    pub sideways_overviews: bool,
    pub manhwa: bool,
    pub manhwa_overlap_percent: u32,
    pub image_mode: ImageMode,
    pub video_fps: f32,
    pub margins: Margins,
    pub streamed: bool,
    /// Keep the first dithered page of each source frame for telemetry.
    pub emit_previews: bool,
    /// Synthesize a per-source-page TOC when metadata carries none.
    pub toc_pages: bool,
    pub page_filter: PageFilter,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            device: Device::X4,
            source_type: SourceType::Cbz,
            two_bit: false,
            dither: DitherAlgorithm::default(),
            contrast: 0,
            gamma: 1.0,
            invert: false,
            pad_black: false,
            orientation: Orientation::Landscape,
            split_mode: SplitMode::default(),
            include_overviews: false,
            sideways_overviews: false,
            manhwa: false,
            manhwa_overlap_percent: 50,
            image_mode: ImageMode::default(),
            video_fps: 1.0,
            margins: Margins::none(),
            streamed: false,
            emit_previews: false,
            toc_pages: false,
            page_filter: PageFilter::default(),
        }
    }
}

impl ConversionOptions {
    /// Checks enumerated ranges and clamps the continuous ones.
    pub fn validate(&mut self) -> Result<()> {
        if !CONTRAST_LEVELS.contains(&self.contrast) {
            return Err(XtcError::InvalidOption(format!(
                "contrast {} is not one of {:?}",
                self.contrast, CONTRAST_LEVELS
            )));
        }
        if !MANHWA_OVERLAP_CHOICES.contains(&self.manhwa_overlap_percent) {
            return Err(XtcError::InvalidOption(format!(
                "manhwa overlap {}% is not one of {:?}",
                self.manhwa_overlap_percent, MANHWA_OVERLAP_CHOICES
            )));
        }
        if self.streamed && self.manhwa {
            return Err(XtcError::InvalidOption(
                "streamed output needs page counts up front, which manhwa slicing cannot provide"
                    .into(),
            ));
        }
        if !self.video_fps.is_finite() || self.video_fps <= 0.0 {
            return Err(XtcError::InvalidOption(format!(
                "video fps {} must be positive",
                self.video_fps
            )));
        }
        self.gamma = self.gamma.clamp(GAMMA_MIN, GAMMA_MAX);
        Ok(())
    }

    pub fn depth(&self) -> BitDepth {
        if self.two_bit {
            BitDepth::Two
        } else {
            BitDepth::One
        }
    }

    pub fn pad_color(&self) -> u8 {
        if self.pad_black {
            0
        } else {
            255
        }
    }

    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            contrast: self.contrast,
            gamma: self.gamma,
            invert: self.invert,
        }
    }
}
