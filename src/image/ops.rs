// src/image/ops.rs

//! Raster transformations: exact rotations, scaling in its four
//! placement modes, and the area-averaging downsampler used for crisp
//! 1-bit text.

use crate::image::raster::GrayRaster;

/// Quarter-turn rotations. `Cw90` turns the image clockwise (the top row
/// becomes the rightmost column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Ccw90,
    Half,
}

/// Rotates a raster by a multiple of 90 degrees. Dimensions swap for
/// quarter turns; every pixel is repositioned exactly.
pub fn rotate(src: &GrayRaster, rotation: Rotation) -> GrayRaster {
    let (w, h) = src.dimensions();
    match rotation {
        Rotation::None => src.clone(),
        Rotation::Cw90 => GrayRaster::from_fn(h, w, |x, y| src.get(y, h - 1 - x)),
        Rotation::Ccw90 => GrayRaster::from_fn(h, w, |x, y| src.get(w - 1 - y, x)),
        Rotation::Half => GrayRaster::from_fn(w, h, |x, y| src.get(w - 1 - x, h - 1 - y)),
    }
}

/// Resampling filter used when scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    /// Bilinear interpolation; the default for upscales and 2-bit output.
    Bilinear,
    /// Area averaging; sharper for text when shrinking to a 1-bit target.
    Box,
}

/// Picks the filter for a scale operation: area averaging when the
/// target is strictly smaller than the source and the output will be
/// packed at 1 bit, bilinear otherwise.
pub fn choose_filter(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, two_bit: bool) -> ResampleFilter {
    if !two_bit && dst_w < src_w && dst_h < src_h {
        ResampleFilter::Box
    } else {
        ResampleFilter::Bilinear
    }
}

/// Scales a raster to exactly `dst_w x dst_h` with the given filter.
pub fn resample(src: &GrayRaster, dst_w: u32, dst_h: u32, filter: ResampleFilter) -> GrayRaster {
    if src.dimensions() == (dst_w, dst_h) {
        return src.clone();
    }
    match filter {
        ResampleFilter::Bilinear => bilinear(src, dst_w, dst_h),
        ResampleFilter::Box => box_downsample(src, dst_w, dst_h),
    }
}

fn bilinear(src: &GrayRaster, dst_w: u32, dst_h: u32) -> GrayRaster {
    let (sw, sh) = src.dimensions();
    let x_ratio = sw as f32 / dst_w as f32;
    let y_ratio = sh as f32 / dst_h as f32;

    GrayRaster::from_fn(dst_w, dst_h, |dx, dy| {
        // Sample at the center of the destination pixel.
        let sx = ((dx as f32 + 0.5) * x_ratio - 0.5).max(0.0);
        let sy = ((dy as f32 + 0.5) * y_ratio - 0.5).max(0.0);

        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let x1 = (x0 + 1).min(sw - 1);
        let y1 = (y0 + 1).min(sh - 1);
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let top = src.get(x0, y0) as f32 * (1.0 - fx) + src.get(x1, y0) as f32 * fx;
        let bottom = src.get(x0, y1) as f32 * (1.0 - fx) + src.get(x1, y1) as f32 * fx;
        (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
    })
}

/// Area-averaging downsampler. Each destination pixel averages the
/// source rectangle it covers, with fractional rows and columns weighted
/// by their coverage.
pub fn box_downsample(src: &GrayRaster, dst_w: u32, dst_h: u32) -> GrayRaster {
    let (sw, sh) = src.dimensions();
    let x_ratio = sw as f64 / dst_w as f64;
    let y_ratio = sh as f64 / dst_h as f64;

    GrayRaster::from_fn(dst_w, dst_h, |dx, dy| {
        let x_start = dx as f64 * x_ratio;
        let x_end = (dx as f64 + 1.0) * x_ratio;
        let y_start = dy as f64 * y_ratio;
        let y_end = (dy as f64 + 1.0) * y_ratio;

        let mut sum = 0.0f64;
        let mut area = 0.0f64;

        let mut y = y_start;
        while y < y_end {
            let row = (y.floor() as u32).min(sh - 1);
            let y_next = (y.floor() + 1.0).min(y_end);
            let y_weight = y_next - y;

            let mut x = x_start;
            while x < x_end {
                let col = (x.floor() as u32).min(sw - 1);
                let x_next = (x.floor() + 1.0).min(x_end);
                let x_weight = x_next - x;

                sum += src.get(col, row) as f64 * x_weight * y_weight;
                area += x_weight * y_weight;
                x = x_next;
            }
            y = y_next;
        }

        (sum / area).round().clamp(0.0, 255.0) as u8
    })
}

/// Scales to fit inside `dev_w x dev_h`, centers, and pads the remainder
/// with `pad`. The result is always exactly device-sized.
pub fn resize_letterbox(
    src: &GrayRaster,
    dev_w: u32,
    dev_h: u32,
    pad: u8,
    filter: ResampleFilter,
) -> GrayRaster {
    let mut canvas = GrayRaster::new(dev_w, dev_h, pad);
    resize_letterbox_into(src, &mut canvas, pad, filter);
    canvas
}

/// Letterboxes into an existing device-sized canvas (typically a pooled
/// buffer), overwriting its previous contents.
pub fn resize_letterbox_into(src: &GrayRaster, canvas: &mut GrayRaster, pad: u8, filter: ResampleFilter) {
    let (dev_w, dev_h) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    let scale = (dev_w as f64 / sw as f64).min(dev_h as f64 / sh as f64);
    let new_w = ((sw as f64 * scale) as u32).clamp(1, dev_w);
    let new_h = ((sh as f64 * scale) as u32).clamp(1, dev_h);

    let scaled = resample(src, new_w, new_h, filter);
    canvas.fill(pad);
    canvas.paste(&scaled, (dev_w - new_w) / 2, (dev_h - new_h) / 2);
}

/// Stretches to exactly `dev_w x dev_h`, ignoring aspect ratio.
pub fn resize_fill(src: &GrayRaster, dev_w: u32, dev_h: u32, filter: ResampleFilter) -> GrayRaster {
    resample(src, dev_w, dev_h, filter)
}

/// Scales to cover `dev_w x dev_h`, centers, and crops the overflow.
pub fn resize_cover(src: &GrayRaster, dev_w: u32, dev_h: u32, filter: ResampleFilter) -> GrayRaster {
    let (sw, sh) = src.dimensions();
    let scale = (dev_w as f64 / sw as f64).max(dev_h as f64 / sh as f64);
    let new_w = ((sw as f64 * scale) as u32).max(dev_w);
    let new_h = ((sh as f64 * scale) as u32).max(dev_h);

    let scaled = resample(src, new_w, new_h, filter);
    scaled.extract((new_w - dev_w) / 2, (new_h - dev_h) / 2, dev_w, dev_h)
}

/// Centers the source into the device rectangle without scaling,
/// cropping what overflows and padding what falls short.
pub fn resize_crop(src: &GrayRaster, dev_w: u32, dev_h: u32, pad: u8) -> GrayRaster {
    let (sw, sh) = src.dimensions();

    let take_w = sw.min(dev_w);
    let take_h = sh.min(dev_h);
    let window = src.extract((sw - take_w) / 2, (sh - take_h) / 2, take_w, take_h);

    if (take_w, take_h) == (dev_w, dev_h) {
        return window;
    }
    let mut canvas = GrayRaster::new(dev_w, dev_h, pad);
    canvas.paste(&window, (dev_w - take_w) / 2, (dev_h - take_h) / 2);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(w: u32, h: u32) -> GrayRaster {
        GrayRaster::from_fn(w, h, |x, y| (y * w + x) as u8)
    }

    #[test]
    fn cw90_moves_top_row_to_right_column() {
        // 2x3 source:
        //   0 1
        //   2 3
        //   4 5
        let src = numbered(2, 3);
        let rot = rotate(&src, Rotation::Cw90);
        assert_eq!(rot.dimensions(), (3, 2));
        // Expect:
        //   4 2 0
        //   5 3 1
        assert_eq!(rot.row(0), &[4, 2, 0]);
        assert_eq!(rot.row(1), &[5, 3, 1]);
    }

    #[test]
    fn ccw90_is_inverse_of_cw90() {
        let src = numbered(5, 7);
        let round = rotate(&rotate(&src, Rotation::Cw90), Rotation::Ccw90);
        assert_eq!(round, src);
    }

    #[test]
    fn half_turn_twice_is_identity() {
        let src = numbered(4, 3);
        assert_eq!(rotate(&rotate(&src, Rotation::Half), Rotation::Half), src);
    }

    #[test]
    fn box_downsample_averages_blocks() {
        // 4x4 with a solid 2x2 black quadrant on white.
        let src = GrayRaster::from_fn(4, 4, |x, y| if x < 2 && y < 2 { 0 } else { 255 });
        let down = box_downsample(&src, 2, 2);
        assert_eq!(down.get(0, 0), 0);
        assert_eq!(down.get(1, 0), 255);
        assert_eq!(down.get(0, 1), 255);
        assert_eq!(down.get(1, 1), 255);
    }

    #[test]
    fn box_downsample_handles_fractional_coverage() {
        let src = GrayRaster::from_fn(3, 1, |x, _| if x == 0 { 0 } else { 255 });
        let down = box_downsample(&src, 2, 1);
        // Left output covers [0, 1.5): one black pixel and half a white one.
        assert_eq!(down.get(0, 0), ((255.0 * 0.5) / 1.5f64).round() as u8);
        assert_eq!(down.get(1, 0), 255);
    }

    #[test]
    fn letterbox_pads_and_centers() {
        let src = GrayRaster::new(100, 100, 0);
        let out = resize_letterbox(&src, 480, 800, 255, ResampleFilter::Bilinear);
        assert_eq!(out.dimensions(), (480, 800));
        // Scaled to 480x480, centered vertically at row 160.
        assert_eq!(out.get(240, 159), 255);
        assert_eq!(out.get(240, 160), 0);
        assert_eq!(out.get(240, 639), 0);
        assert_eq!(out.get(240, 640), 255);
    }

    #[test]
    fn cover_crops_overflow() {
        let src = GrayRaster::new(1000, 500, 37);
        let out = resize_cover(&src, 480, 800, ResampleFilter::Bilinear);
        assert_eq!(out.dimensions(), (480, 800));
        assert!(out.as_slice().iter().all(|&v| v == 37));
    }

    #[test]
    fn fill_stretches_exactly() {
        let src = GrayRaster::new(3, 5, 9);
        let out = resize_fill(&src, 480, 800, ResampleFilter::Bilinear);
        assert_eq!(out.dimensions(), (480, 800));
        assert!(out.as_slice().iter().all(|&v| v == 9));
    }

    #[test]
    fn crop_mode_pads_small_sources() {
        let src = GrayRaster::new(100, 900, 0);
        let out = resize_crop(&src, 480, 800, 255);
        assert_eq!(out.dimensions(), (480, 800));
        // Width padded, height cropped.
        assert_eq!(out.get(0, 400), 255);
        assert_eq!(out.get(240, 400), 0);
    }

    #[test]
    fn filter_choice_prefers_box_for_one_bit_downscale() {
        assert_eq!(choose_filter(1000, 1000, 480, 800, false), ResampleFilter::Box);
        assert_eq!(choose_filter(1000, 1000, 480, 800, true), ResampleFilter::Bilinear);
        assert_eq!(choose_filter(200, 200, 480, 800, false), ResampleFilter::Bilinear);
    }
}
