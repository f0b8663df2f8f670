// src/dither/ordered.rs

//! Ordered (Bayer) dithering with the classic 4x4 matrix.

use crate::image::raster::GrayRaster;

/// The 4x4 Bayer index matrix.
const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Thresholds each pixel against the tiled Bayer matrix scaled by 16.
/// The output is binary regardless of the container depth; the 2-bit
/// packer simply maps 0 and 255 to its darkest and lightest levels.
pub fn dither_ordered(gray: &mut GrayRaster) {
    let (w, h) = gray.dimensions();
    for y in 0..h {
        for x in 0..w {
            let threshold = BAYER_4X4[(y % 4) as usize][(x % 4) as usize] as u16 * 16;
            let value = gray.get(x, y) as u16;
            gray.set(x, y, if value > threshold { 255 } else { 0 });
        }
    }
}
