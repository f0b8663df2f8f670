// src/pipeline/orchestrator.rs

//! The page-processing orchestrator.
//!
//! For each decoded source frame: crop, fused filter, fan-out into one
//! or more device-sized pages (overviews, splits, manhwa slices), dither
//! and pack each page, and record the 1-to-N expansion in the page
//! mapping. The orchestrator also assembles the final container, either
//! buffered or streamed.

use crate::codec::chunk::pack_page;
use crate::codec::container::ContainerBuilder;
use crate::codec::metadata::{BookMetadata, PageMapping};
use crate::codec::stream::StreamingWriter;
use crate::dither::dither;
use crate::image::filters::fused_filter;
use crate::image::geom::{self, overlap_segments, split_halves, Segment};
use crate::image::ops::{
    choose_filter, resample, resize_cover, resize_crop, resize_letterbox_into, rotate, Rotation,
};
use crate::image::raster::{GrayRaster, RasterFrame};
use crate::pipeline::buffer_pool::BufferPool;
use crate::pipeline::frame_slots::FrameSlots;
use crate::pipeline::manhwa::ManhwaStitcher;
use crate::pipeline::options::{ConversionOptions, ImageMode, Orientation, SourceType, SplitMode};
use crate::utils::cancel::CancelToken;
use crate::utils::error::{Result, XtcError};
use rayon::prelude::*;
use std::io::Write;
use tracing::{debug, info};

/// One packed page ready for the container, with an optional preview of
/// the dithered raster for telemetry.
pub struct ProcessedPage {
    pub width: u16,
    pub height: u16,
    pub chunk: Vec<u8>,
    pub preview: Option<GrayRaster>,
}

/// Drives a whole conversion under one immutable set of options.
pub struct Orchestrator {
    opts: ConversionOptions,
    dev_w: u32,
    dev_h: u32,
    cancel: CancelToken,
    pool: BufferPool,
}

impl Orchestrator {
    pub fn new(opts: ConversionOptions) -> Result<Self> {
        Self::with_cancel(opts, CancelToken::new())
    }

    pub fn with_cancel(mut opts: ConversionOptions, cancel: CancelToken) -> Result<Self> {
        opts.validate()?;
        let (dev_w, dev_h) = opts.device.dimensions();
        Ok(Orchestrator {
            pool: BufferPool::new((dev_w * dev_h) as usize),
            opts,
            dev_w,
            dev_h,
            cancel,
        })
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.opts
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ------------------------------------------------------------------
    // Whole-document conversion
    // ------------------------------------------------------------------

    /// Converts a batch of frames into a complete container in memory.
    pub fn convert(
        &self,
        frames: &[RasterFrame],
        metadata: Option<&BookMetadata>,
    ) -> Result<Vec<u8>> {
        let (bytes, _mapping) = self.convert_with_mapping(frames, metadata)?;
        Ok(bytes)
    }

    /// Buffered conversion that also exposes the final page mapping.
    pub fn convert_with_mapping(
        &self,
        frames: &[RasterFrame],
        metadata: Option<&BookMetadata>,
    ) -> Result<(Vec<u8>, PageMapping)> {
        let (per_frame, mapping) = self.process_all(frames)?;

        let mut builder = ContainerBuilder::new(self.opts.depth());
        builder.set_metadata(self.finalize_metadata(metadata, &mapping));
        for pages in per_frame {
            for page in pages {
                builder.push_chunk(page.chunk)?;
            }
        }

        info!(
            pages = mapping.total_emitted(),
            frames = frames.len(),
            "container assembled"
        );
        Ok((builder.finalize()?, mapping))
    }

    /// One-pass streamed conversion: header, metadata and index are
    /// written before any page data.
    pub fn convert_streamed<W: Write>(
        &self,
        frames: &[RasterFrame],
        metadata: Option<&BookMetadata>,
        writer: W,
    ) -> Result<W> {
        if self.opts.manhwa {
            return Err(XtcError::InvalidOption(
                "manhwa page counts are content-dependent; streaming is unavailable".into(),
            ));
        }

        // Pass 1: per-frame fan-out counts from geometry alone.
        let mut mapping = PageMapping::new();
        let mut counts = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            let page = i as u32 + 1;
            let count = if self.opts.page_filter.allows(page) {
                let crop = geom::resolve_crop(frame, self.opts.margins, false);
                self.planned_page_count(crop.width, crop.height)
            } else {
                0
            };
            mapping.record(page, count);
            counts.push(count);
        }

        let total = mapping.total_emitted() as usize;
        let dims = vec![(self.dev_w as u16, self.dev_h as u16); total];
        let final_metadata = self.finalize_metadata(metadata, &mapping);

        let mut stream =
            StreamingWriter::new(writer, self.opts.depth(), final_metadata.as_ref(), &dims)?;

        for (i, frame) in frames.iter().enumerate() {
            self.cancel.check()?;
            if counts[i] == 0 {
                continue;
            }
            let pages = self.process_frame(frame)?;
            if pages.len() != counts[i] as usize {
                return Err(XtcError::InternalInvariant(format!(
                    "frame {} emitted {} pages, {} were planned",
                    i + 1,
                    pages.len(),
                    counts[i]
                )));
            }
            for page in pages {
                stream.append_chunk(&page.chunk)?;
            }
        }
        stream.finish()
    }

    /// Applies the TOC rewrite once the mapping is final.
    fn finalize_metadata(
        &self,
        metadata: Option<&BookMetadata>,
        mapping: &PageMapping,
    ) -> Option<BookMetadata> {
        let meta = metadata?;
        let toc = if !meta.toc.is_empty() {
            mapping.remap_toc(&meta.toc)
        } else if self.opts.toc_pages {
            mapping.default_toc()
        } else {
            Vec::new()
        };
        Some(BookMetadata {
            toc,
            ..meta.clone()
        })
    }

    // ------------------------------------------------------------------
    // Frame processing
    // ------------------------------------------------------------------

    /// Processes every frame, in parallel where the mode allows it, and
    /// returns per-frame fan-out results in source order plus the page
    /// mapping.
    fn process_all(&self, frames: &[RasterFrame]) -> Result<(Vec<Vec<ProcessedPage>>, PageMapping)> {
        let per_frame = if self.opts.manhwa {
            self.process_all_manhwa(frames)?
        } else {
            let slots = FrameSlots::new(frames.len());
            frames
                .par_iter()
                .enumerate()
                .try_for_each(|(i, frame)| -> Result<()> {
                    if !self.opts.page_filter.allows(i as u32 + 1) {
                        return slots.insert(i, Vec::new());
                    }
                    let pages = self.process_frame(frame)?;
                    debug!(frame = i + 1, pages = pages.len(), "frame processed");
                    slots.insert(i, pages)
                })?;
            slots.into_ordered()?
        };

        let mut mapping = PageMapping::new();
        for (i, pages) in per_frame.iter().enumerate() {
            mapping.record(i as u32 + 1, pages.len() as u32);
        }
        Ok((per_frame, mapping))
    }

    /// Sequential manhwa path: frames feed one stitcher; each source
    /// frame owns the slices whose emission it triggered, and the
    /// residual page belongs to the last contributing frame.
    fn process_all_manhwa(&self, frames: &[RasterFrame]) -> Result<Vec<Vec<ProcessedPage>>> {
        let mut stitcher = ManhwaStitcher::new(
            self.dev_w,
            self.dev_h,
            self.opts.manhwa_overlap_percent,
            self.opts.pad_color(),
        );

        let mut per_frame: Vec<Vec<ProcessedPage>> = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            self.cancel.check()?;
            if !self.opts.page_filter.allows(i as u32 + 1) {
                per_frame.push(Vec::new());
                continue;
            }

            let crop = geom::resolve_crop(frame, self.opts.margins, true);
            let cropped = frame.extract(crop.x, crop.y, crop.width, crop.height);
            let gray = fused_filter(&cropped, &self.opts.filter_settings());

            let scaled_h = ((gray.height() as u64 * self.dev_w as u64)
                / gray.width() as u64)
                .max(1) as u32;
            let filter = choose_filter(
                gray.width(),
                gray.height(),
                self.dev_w,
                scaled_h,
                self.opts.two_bit,
            );
            let slices = stitcher.append(&gray, filter)?;

            let mut pages = Vec::with_capacity(slices.len());
            for slice in slices {
                self.cancel.check()?;
                pages.push(self.finish_page(slice, pages.is_empty())?);
            }
            per_frame.push(pages);
        }

        if let Some(residual) = stitcher.finish() {
            let tail = self.finish_page(residual, false)?;
            match per_frame.iter_mut().rev().find(|p| !p.is_empty()) {
                Some(pages) => pages.push(tail),
                None => {
                    if let Some(last) = per_frame.last_mut() {
                        last.push(tail);
                    }
                }
            }
        }
        Ok(per_frame)
    }

    /// Runs the fixed fan-out for one frame (non-manhwa).
    pub fn process_frame(&self, frame: &RasterFrame) -> Result<Vec<ProcessedPage>> {
        self.cancel.check()?;

        let crop = geom::resolve_crop(frame, self.opts.margins, false);
        let cropped = frame.extract(crop.x, crop.y, crop.width, crop.height);
        let gray = fused_filter(&cropped, &self.opts.filter_settings());

        let mut pages = Vec::new();

        if self.opts.sideways_overviews {
            let sideways = rotate(&gray, Rotation::Cw90);
            self.emit_letterboxed(&sideways, &mut pages)?;
        }
        if self.opts.include_overviews {
            self.emit_letterboxed(&gray, &mut pages)?;
        }

        let single_image =
            self.opts.source_type == SourceType::Image && self.opts.split_mode == SplitMode::Nosplit;

        if single_image {
            self.emit_single_image(&gray, &mut pages)?;
        } else if self.opts.orientation == Orientation::Portrait {
            self.emit_letterboxed(&gray, &mut pages)?;
        } else {
            self.emit_landscape(&gray, &mut pages)?;
        }

        Ok(pages)
    }

    /// The number of pages `process_frame` will emit for a crop of the
    /// given size. Exact by construction; streaming mode builds its
    /// index from this.
    pub fn planned_page_count(&self, crop_w: u32, crop_h: u32) -> u32 {
        let mut count = 0u32;
        if self.opts.sideways_overviews {
            count += 1;
        }
        if self.opts.include_overviews {
            count += 1;
        }

        let single_image =
            self.opts.source_type == SourceType::Image && self.opts.split_mode == SplitMode::Nosplit;

        count
            + if single_image || self.opts.orientation == Orientation::Portrait {
                1
            } else {
                match self.opts.split_mode {
                    SplitMode::Nosplit => 1,
                    SplitMode::Split => 2,
                    SplitMode::Overlap => {
                        let (w, h) = tall_dims(crop_w, crop_h);
                        overlap_segments(w, h, self.dev_w, self.dev_h).len() as u32
                    }
                }
            }
    }

    fn emit_single_image(&self, gray: &GrayRaster, pages: &mut Vec<ProcessedPage>) -> Result<()> {
        let upright = match self.opts.orientation {
            Orientation::Landscape => rotate(gray, Rotation::Cw90),
            Orientation::Portrait => gray.clone(),
        };
        let (w, h) = upright.dimensions();
        let filter = choose_filter(w, h, self.dev_w, self.dev_h, self.opts.two_bit);
        let pad = self.opts.pad_color();

        match self.opts.image_mode {
            ImageMode::Cover => {
                let canvas = resize_cover(&upright, self.dev_w, self.dev_h, filter);
                self.push_page(canvas, pages)
            }
            ImageMode::Letterbox => self.emit_letterboxed(&upright, pages),
            ImageMode::Fill => {
                let canvas = resample(&upright, self.dev_w, self.dev_h, filter);
                self.push_page(canvas, pages)
            }
            ImageMode::Crop => {
                let canvas = resize_crop(&upright, self.dev_w, self.dev_h, pad);
                self.push_page(canvas, pages)
            }
        }
    }

    /// Landscape reading: split a tall form into sideways screen-filling
    /// pieces, or show the whole page sideways when splitting is off.
    /// Spreads (wider than tall) turn into the tall form first.
    fn emit_landscape(&self, gray: &GrayRaster, pages: &mut Vec<ProcessedPage>) -> Result<()> {
        if self.opts.split_mode == SplitMode::Nosplit {
            let sideways = rotate(gray, Rotation::Cw90);
            return self.emit_letterboxed(&sideways, pages);
        }

        let (w, h) = gray.dimensions();
        let prerotated = w >= h;
        let tall = if prerotated {
            rotate(gray, Rotation::Cw90)
        } else {
            gray.clone()
        };
        // Undo the spread rotation inside each segment so content stays
        // upright; natural portrait pages turn clockwise into the
        // sideways reading view.
        let segment_rotation = if prerotated {
            Rotation::Ccw90
        } else {
            Rotation::Cw90
        };

        let segments: Vec<Segment> = match self.opts.split_mode {
            SplitMode::Overlap => overlap_segments(tall.width(), tall.height(), self.dev_w, self.dev_h),
            SplitMode::Split => split_halves(tall.height()).to_vec(),
            SplitMode::Nosplit => unreachable!("handled above"),
        };

        for segment in segments {
            self.cancel.check()?;
            let part = tall.extract(0, segment.y, tall.width(), segment.height);
            let turned = rotate(&part, segment_rotation);
            self.emit_letterboxed(&turned, pages)?;
        }
        Ok(())
    }

    /// Letterboxes onto a pooled device canvas and finishes the page.
    fn emit_letterboxed(&self, src: &GrayRaster, pages: &mut Vec<ProcessedPage>) -> Result<()> {
        self.cancel.check()?;
        let filter = choose_filter(
            src.width(),
            src.height(),
            self.dev_w,
            self.dev_h,
            self.opts.two_bit,
        );
        let mut canvas = GrayRaster::from_vec(self.dev_w, self.dev_h, self.pool.lease()?);
        resize_letterbox_into(src, &mut canvas, self.opts.pad_color(), filter);
        self.push_page(canvas, pages)
    }

    fn push_page(&self, canvas: GrayRaster, pages: &mut Vec<ProcessedPage>) -> Result<()> {
        let page = self.finish_page(canvas, pages.is_empty())?;
        pages.push(page);
        Ok(())
    }

    /// Dithers and packs a device-sized canvas, keeping a preview of the
    /// first page of a frame when requested.
    fn finish_page(&self, mut canvas: GrayRaster, first_of_frame: bool) -> Result<ProcessedPage> {
        debug_assert_eq!(canvas.dimensions(), (self.dev_w, self.dev_h));
        dither(&mut canvas, self.opts.dither, self.opts.depth());

        let chunk = pack_page(&canvas, self.opts.depth());
        let preview = (self.opts.emit_previews && first_of_frame).then(|| canvas.clone());

        self.pool.give_back(canvas.into_vec());
        Ok(ProcessedPage {
            width: self.dev_w as u16,
            height: self.dev_h as u16,
            chunk,
            preview,
        })
    }
}

/// The tall (portrait-proportioned) form a landscape split operates on.
fn tall_dims(w: u32, h: u32) -> (u32, u32) {
    if w >= h {
        (h, w)
    } else {
        (w, h)
    }
}
