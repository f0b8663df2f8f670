// src/pipeline/manhwa.rs

//! The manhwa stitcher: reassembles vertically-scrolled strips into an
//! infinite column and slices it into device-height pages.
//!
//! Incoming frames are scaled to the device width and appended to a
//! growing row buffer. Whenever the buffer holds at least one full
//! screen, the top `dev_h` rows are emitted and the buffer advances by
//! a step that leaves the configured overlap behind. Blank filler
//! regions advance a full screen so the reader is not dragged through
//! them slowly.

use crate::image::ops::{resample, ResampleFilter};
use crate::image::raster::GrayRaster;
use crate::utils::error::{Result, XtcError};

pub struct ManhwaStitcher {
    dev_w: u32,
    dev_h: u32,
    overlap_percent: u32,
    pad: u8,
    /// Row-major buffer, always `dev_w` pixels wide.
    rows: Vec<u8>,
}

impl ManhwaStitcher {
    pub fn new(dev_w: u32, dev_h: u32, overlap_percent: u32, pad: u8) -> Self {
        ManhwaStitcher {
            dev_w,
            dev_h,
            overlap_percent,
            pad,
            rows: Vec::new(),
        }
    }

    /// Rows currently buffered and not yet emitted.
    pub fn buffered_rows(&self) -> u32 {
        (self.rows.len() as u32) / self.dev_w
    }

    /// Appends one source frame and returns every full slice that
    /// became available.
    pub fn append(&mut self, frame: &GrayRaster, filter: ResampleFilter) -> Result<Vec<GrayRaster>> {
        let (src_w, src_h) = frame.dimensions();
        let scaled_h = ((src_h as u64 * self.dev_w as u64) / src_w as u64).max(1) as u32;
        let scaled = resample(frame, self.dev_w, scaled_h, filter);

        self.rows
            .try_reserve(scaled.as_slice().len())
            .map_err(|_| {
                XtcError::ResourceExhausted(format!(
                    "manhwa strip buffer could not grow by {} rows",
                    scaled_h
                ))
            })?;
        self.rows.extend_from_slice(scaled.as_slice());

        let mut slices = Vec::new();
        let screen = (self.dev_w * self.dev_h) as usize;
        while self.rows.len() >= screen {
            let slice = GrayRaster::from_vec(self.dev_w, self.dev_h, self.rows[..screen].to_vec());

            // No overlap across solid filler; full overlap step otherwise.
            let step = if slice.is_blank() {
                self.dev_h
            } else {
                self.dev_h - self.dev_h * self.overlap_percent / 100
            };
            self.rows.drain(..(step * self.dev_w) as usize);
            slices.push(slice);
        }
        Ok(slices)
    }

    /// Flushes the residual strip, top-aligned on a padded canvas.
    /// Returns `None` when nothing is buffered.
    pub fn finish(&mut self) -> Option<GrayRaster> {
        let residual_h = self.buffered_rows();
        if residual_h == 0 {
            return None;
        }
        let residual = GrayRaster::from_vec(
            self.dev_w,
            residual_h,
            std::mem::take(&mut self.rows),
        );
        if residual_h == self.dev_h {
            return Some(residual);
        }
        let mut canvas = GrayRaster::new(self.dev_w, self.dev_h, self.pad);
        canvas.paste(&residual, 0, 0);
        Some(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stitcher() -> ManhwaStitcher {
        ManhwaStitcher::new(480, 800, 50, 255)
    }

    /// A frame with one gray row per 16 source rows so slices never read
    /// as blank.
    fn textured(w: u32, h: u32) -> GrayRaster {
        GrayRaster::from_fn(w, h, |_, y| if y % 16 == 0 { 0 } else { 255 })
    }

    #[test]
    fn short_strip_emits_nothing_until_finish() {
        let mut s = stitcher();
        let slices = s.append(&textured(480, 500), ResampleFilter::Bilinear).unwrap();
        assert!(slices.is_empty());
        assert_eq!(s.buffered_rows(), 500);

        let tail = s.finish().unwrap();
        assert_eq!(tail.dimensions(), (480, 800));
        // Padding below the strip.
        assert_eq!(tail.get(0, 700), 255);
        assert!(s.finish().is_none());
    }

    #[test]
    fn consecutive_slices_overlap_by_half_a_screen() {
        let mut s = stitcher();
        let slices = s.append(&textured(480, 1200), ResampleFilter::Bilinear).unwrap();
        assert_eq!(slices.len(), 1);
        // Step was 800 - 400 = 400 rows, so 800 remain of 1200.
        assert_eq!(s.buffered_rows(), 800);

        let more = s.append(&textured(480, 0 + 16), ResampleFilter::Bilinear).unwrap();
        assert_eq!(more.len(), 1);
        // The second slice starts at strip row 400: its top 400 rows are
        // the previous slice's bottom 400 rows.
        let first = &slices[0];
        let second = &more[0];
        for y in 0..400 {
            assert_eq!(second.row(y), first.row(y + 400), "row {}", y);
        }
    }

    #[test]
    fn blank_slices_advance_a_full_screen() {
        let mut s = stitcher();
        let slices = s.append(&GrayRaster::new(480, 1600, 255), ResampleFilter::Bilinear).unwrap();
        assert_eq!(slices.len(), 2);
        assert!(slices[0].is_blank());
        assert_eq!(s.buffered_rows(), 0);
        assert!(s.finish().is_none());
    }

    #[test]
    fn narrow_frames_scale_to_device_width() {
        let mut s = stitcher();
        s.append(&textured(240, 100), ResampleFilter::Bilinear).unwrap();
        // 100 source rows at 2x scale = 200 buffered rows.
        assert_eq!(s.buffered_rows(), 200);
    }

    #[test]
    fn exact_screen_of_content_leaves_overlap_residue() {
        let mut s = stitcher();
        let slices = s.append(&textured(480, 800), ResampleFilter::Bilinear).unwrap();
        assert_eq!(slices.len(), 1);
        // Non-blank slice advances 400 rows, leaving the overlap tail
        // for the final padded page.
        assert_eq!(s.buffered_rows(), 400);
        assert!(s.finish().is_some());
    }
}
