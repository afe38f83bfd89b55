//! Cumulative-count to sample mapping.
//!
//! Two formulas are in use for equalization. Both compute in `f32` and round
//! half up, the same arithmetic the WGSL remap kernel performs.
//!
//! | Mode | Output |
//! |------|--------|
//! | [`Normalization::MinNonZero`] | `round((cdf[v] - cdf_min) / (total - cdf_min) * 255)` |
//! | [`Normalization::Linear`] | `round(cdf[v] / total * 255)` |
//!
//! With `MinNonZero`, a channel whose pixels all share one value has
//! `total == cdf_min`; that value maps to 255.

use serde::{Deserialize, Serialize};

/// Normalization applied by the remap stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Subtract the smallest non-zero cumulative count before scaling.
    #[default]
    MinNonZero,
    /// Scale the cumulative count by `255 / total`.
    Linear,
}

impl Normalization {
    /// Kernel mode id passed to device kernels.
    pub fn mode_id(self) -> u32 {
        match self {
            Self::MinNonZero => 0,
            Self::Linear => 1,
        }
    }

    /// Maps one cumulative count to an output sample.
    ///
    /// `total` must be non-zero; the pipeline never remaps an empty image.
    ///
    /// ```rust
    /// use histeq_core::Normalization;
    ///
    /// // Two-level image: 50 pixels at 0, 50 at 255.
    /// assert_eq!(Normalization::MinNonZero.apply(50, 50, 100), 0);
    /// assert_eq!(Normalization::MinNonZero.apply(100, 50, 100), 255);
    /// assert_eq!(Normalization::Linear.apply(50, 50, 100), 128);
    /// ```
    #[inline]
    pub fn apply(self, cdf: u32, cdf_min: u32, total: u32) -> u8 {
        match self {
            Self::MinNonZero => {
                let denom = total.saturating_sub(cdf_min);
                if denom == 0 {
                    return u8::MAX;
                }
                let num = cdf.saturating_sub(cdf_min);
                round_to_u8(num as f32 / denom as f32 * 255.0)
            }
            Self::Linear => {
                if total == 0 {
                    return 0;
                }
                round_to_u8(cdf as f32 / total as f32 * 255.0)
            }
        }
    }

    /// Name used in config files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::MinNonZero => "min-non-zero",
            Self::Linear => "linear",
        }
    }
}

impl std::str::FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min-non-zero" | "min-nonzero" | "min" => Ok(Self::MinNonZero),
            "linear" | "simple" => Ok(Self::Linear),
            other => Err(format!("unknown normalization '{other}' (expected min-non-zero or linear)")),
        }
    }
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn round_to_u8(v: f32) -> u8 {
    (v + 0.5).floor().clamp(0.0, 255.0) as u8
}
