// src/dither/diffusion.rs

//! The error diffusion engine.
//!
//! Pixels are visited left-to-right, top-to-bottom. Residual error is
//! accumulated in a float buffer the size of the frame; integer
//! truncation at divisors like 42 or 103 loses fractional error and
//! produces visible banding, so the float accumulator is load-bearing,
//! not an optimization.

use crate::dither::kernel::Kernel;
use crate::dither::quantize::BitDepth;
use crate::image::raster::GrayRaster;

/// Applies one diffusion kernel over the raster in place.
pub fn diffuse(gray: &mut GrayRaster, kernel: &Kernel, depth: BitDepth) {
    let (w, h) = gray.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let mut errors = vec![0.0f32; (w * h) as usize];
    let divisor = kernel.divisor as f32;

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let value = gray.get(x, y) as f32 + errors[idx];
            let quantized = depth.quantize(value);
            gray.set(x, y, quantized);

            let err = value - quantized as f32;
            if err == 0.0 {
                continue;
            }
            for &(dx, dy, weight) in kernel.entries {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || nx >= wi || ny >= hi {
                    continue;
                }
                errors[(ny * wi + nx) as usize] += err * weight as f32 / divisor;
            }
        }
    }
}

/// Ostromoukhov's variable-coefficient diffusion.
///
/// Three coefficients (right, down-left, down) are interpolated per
/// input level: from `[0.7, 0.2, 0.1]` at 0 toward `[0.3, 0.4, 0.3]` at
/// 128, and back again toward `[0.7, 0.2, 0.1]` at 255. The sample is
/// clamped to `[0, 255]` before interpolation.
pub fn diffuse_ostromoukhov(gray: &mut GrayRaster, depth: BitDepth) {
    const LOW: [f32; 3] = [0.7, 0.2, 0.1];
    const MID: [f32; 3] = [0.3, 0.4, 0.3];

    let (w, h) = gray.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let mut errors = vec![0.0f32; (w * h) as usize];

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let value = gray.get(x, y) as f32 + errors[idx];
            let quantized = depth.quantize(value);
            gray.set(x, y, quantized);

            let err = value - quantized as f32;
            if err == 0.0 {
                continue;
            }

            let v = value.clamp(0.0, 255.0);
            let coeffs = if v <= 128.0 {
                let t = v / 128.0;
                [
                    LOW[0] * (1.0 - t) + MID[0] * t,
                    LOW[1] * (1.0 - t) + MID[1] * t,
                    LOW[2] * (1.0 - t) + MID[2] * t,
                ]
            } else {
                let t = (v - 128.0) / 127.0;
                [
                    MID[0] * (1.0 - t) + LOW[0] * t,
                    MID[1] * (1.0 - t) + LOW[1] * t,
                    MID[2] * (1.0 - t) + LOW[2] * t,
                ]
            };

            let targets = [(1i32, 0i32, coeffs[0]), (-1, 1, coeffs[1]), (0, 1, coeffs[2])];
            for (dx, dy, c) in targets {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || nx >= wi || ny >= hi {
                    continue;
                }
                errors[(ny * wi + nx) as usize] += err * c;
            }
        }
    }
}
