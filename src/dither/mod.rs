//! Dithering: quantization to 1-bit or 2-bit output with a choice of
//! error diffusion, ordered, and space-filling-curve algorithms.

pub mod diffusion;
pub mod hilbert;
pub mod kernel;
pub mod ordered;
pub mod quantize;

pub use quantize::BitDepth;

use crate::image::raster::GrayRaster;

/// The dithering algorithm applied before packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DitherAlgorithm {
    #[value(name = "floyd")]
    FloydSteinberg,
    Atkinson,
    #[default]
    Stucki,
    #[value(name = "zhoufang")]
    ZhouFang,
    Ostromoukhov,
    #[value(name = "sierra-lite")]
    SierraLite,
    Ordered,
    /// Hilbert-curve serpentine diffusion.
    Stochastic,
    /// Plain thresholding, no diffusion.
    None,
}

impl std::fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DitherAlgorithm::FloydSteinberg => "floyd",
            DitherAlgorithm::Atkinson => "atkinson",
            DitherAlgorithm::Stucki => "stucki",
            DitherAlgorithm::ZhouFang => "zhoufang",
            DitherAlgorithm::Ostromoukhov => "ostromoukhov",
            DitherAlgorithm::SierraLite => "sierra-lite",
            DitherAlgorithm::Ordered => "ordered",
            DitherAlgorithm::Stochastic => "stochastic",
            DitherAlgorithm::None => "none",
        })
    }
}

/// Quantizes a grayscale raster in place with the selected algorithm.
///
/// Error state is local to the call, so every page or slice starts with
/// a clean diffusion buffer.
pub fn dither(gray: &mut GrayRaster, algorithm: DitherAlgorithm, depth: BitDepth) {
    match algorithm {
        DitherAlgorithm::FloydSteinberg => diffusion::diffuse(gray, &kernel::FLOYD_STEINBERG, depth),
        DitherAlgorithm::Atkinson => diffusion::diffuse(gray, &kernel::ATKINSON, depth),
        DitherAlgorithm::Stucki => diffusion::diffuse(gray, &kernel::STUCKI, depth),
        DitherAlgorithm::ZhouFang => diffusion::diffuse(gray, &kernel::ZHOU_FANG, depth),
        DitherAlgorithm::Ostromoukhov => diffusion::diffuse_ostromoukhov(gray, depth),
        DitherAlgorithm::SierraLite => diffusion::diffuse(gray, &kernel::SIERRA_LITE, depth),
        DitherAlgorithm::Ordered => ordered::dither_ordered(gray),
        DitherAlgorithm::Stochastic => hilbert::dither_hilbert(gray, depth),
        DitherAlgorithm::None => threshold(gray, depth),
    }
}

/// Direct quantization without any error diffusion.
fn threshold(gray: &mut GrayRaster, depth: BitDepth) {
    for v in gray.as_mut_slice() {
        *v = depth.quantize(*v as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_algorithm_emits_only_output_levels() {
        let algorithms = [
            DitherAlgorithm::FloydSteinberg,
            DitherAlgorithm::Atkinson,
            DitherAlgorithm::Stucki,
            DitherAlgorithm::ZhouFang,
            DitherAlgorithm::Ostromoukhov,
            DitherAlgorithm::SierraLite,
            DitherAlgorithm::Ordered,
            DitherAlgorithm::Stochastic,
            DitherAlgorithm::None,
        ];
        for algorithm in algorithms {
            let mut gray = GrayRaster::from_fn(16, 16, |x, y| ((x * 31 + y * 17) % 256) as u8);
            dither(&mut gray, algorithm, BitDepth::One);
            for &v in gray.as_slice() {
                assert!(v == 0 || v == 255, "{:?} produced {}", algorithm, v);
            }
        }
    }

    #[test]
    fn threshold_none_is_deterministic_per_pixel() {
        let mut gray = GrayRaster::from_fn(4, 1, |x, _| [10, 100, 180, 250][x as usize]);
        dither(&mut gray, DitherAlgorithm::None, BitDepth::Two);
        assert_eq!(gray.as_slice(), &[0, 85, 170, 255]);
    }

    #[test]
    fn default_algorithm_is_stucki() {
        assert_eq!(DitherAlgorithm::default(), DitherAlgorithm::Stucki);
    }
}
