// src/dither/quantize.rs

//! Output quantizers shared by every dithering algorithm.

/// Output bit depth of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    /// Two levels: black and white.
    One,
    /// Four levels: {0, 85, 170, 255}.
    Two,
}

impl BitDepth {
    /// Quantizes a (possibly error-adjusted) sample to the nearest
    /// output level. Comparisons are strict-less-than on the thresholds
    /// `{42, 127, 212}` for 2-bit and `128` for 1-bit.
    #[inline]
    pub fn quantize(self, v: f32) -> u8 {
        match self {
            BitDepth::One => {
                if v < 128.0 {
                    0
                } else {
                    255
                }
            }
            BitDepth::Two => {
                if v < 42.0 {
                    0
                } else if v < 127.0 {
                    85
                } else if v < 212.0 {
                    170
                } else {
                    255
                }
            }
        }
    }

    pub fn levels(self) -> &'static [u8] {
        match self {
            BitDepth::One => &[0, 255],
            BitDepth::Two => &[0, 85, 170, 255],
        }
    }
}
