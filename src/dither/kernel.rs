// src/dither/kernel.rs

//! Error diffusion kernel definitions.
//!
//! Each kernel specifies how quantization error is distributed to
//! neighboring pixels that have not been visited yet. Entries are
//! `(dx, dy, weight)` with the divisor kept separate, so a neighbor
//! receives `error * weight / divisor`.

/// An error diffusion kernel.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    /// (dx, dy, weight) entries; `dy` is always non-negative and entries
    /// on the current row are always to the right of the pixel.
    pub entries: &'static [(i32, i32, u8)],
    /// Total divisor for normalizing weights.
    pub divisor: u8,
}

/// Floyd-Steinberg: four neighbors, 100% propagation.
///
/// ```text
///        X   7
///    3   5   1
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    entries: &[(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)],
    divisor: 16,
};

/// Atkinson: six neighbors, only 6/8 of the error propagated. The lost
/// quarter keeps highlights and shadows punchy on e-ink.
///
/// ```text
///        X   1   1
///    1   1   1
///        1
/// ```
pub const ATKINSON: Kernel = Kernel {
    entries: &[(1, 0, 1), (2, 0, 1), (-1, 1, 1), (0, 1, 1), (1, 1, 1), (0, 2, 1)],
    divisor: 8,
};

/// Stucki: twelve neighbors over three rows, 100% propagation.
///
/// ```text
///            X   8   4
///    2   4   8   4   2
///    1   2   4   2   1
/// ```
pub const STUCKI: Kernel = Kernel {
    entries: &[
        (1, 0, 8),
        (2, 0, 4),
        (-2, 1, 2),
        (-1, 1, 4),
        (0, 1, 8),
        (1, 1, 4),
        (2, 1, 2),
        (-2, 2, 1),
        (-1, 2, 2),
        (0, 2, 4),
        (1, 2, 2),
        (2, 2, 1),
    ],
    divisor: 42,
};

/// Zhou-Fang: the Stucki footprint with redistributed weights and a
/// divisor of 103, reducing worm artifacts in midtones.
///
/// ```text
///            X  16   9
///    5  11  16  11   5
///    3   5   9   5   3
/// ```
pub const ZHOU_FANG: Kernel = Kernel {
    entries: &[
        (1, 0, 16),
        (2, 0, 9),
        (-2, 1, 5),
        (-1, 1, 11),
        (0, 1, 16),
        (1, 1, 11),
        (2, 1, 5),
        (-2, 2, 3),
        (-1, 2, 5),
        (0, 2, 9),
        (1, 2, 5),
        (2, 2, 3),
    ],
    divisor: 103,
};

/// Sierra Lite: three neighbors, the fastest diffusion variant.
///
/// ```text
///    X   2
///  1   1
/// ```
pub const SIERRA_LITE: Kernel = Kernel {
    entries: &[(1, 0, 2), (-1, 1, 1), (0, 1, 1)],
    divisor: 4,
};
