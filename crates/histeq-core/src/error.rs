//! Error types for histeq-core operations.
//!
//! Every failure here is a shape problem: a sample buffer that does not match
//! its declared dimensions, a channel count outside the supported range, or a
//! histogram whose length is not a whole number of 256-bin blocks.
//!
//! # Usage
//!
//! ```rust
//! use histeq_core::{Error, Image};
//!
//! let err = Image::from_raw(vec![0u8; 5], 2, 1, 3).unwrap_err();
//! assert!(matches!(err, Error::BufferSizeMismatch { expected: 6, actual: 5 }));
//! ```
//!
//! # Used By
//!
//! - [`crate::image::Image`] - Construction from raw samples
//! - [`crate::histogram`] - Construction from raw counts
//! - `histeq-compute` - Wrapped in `ComputeError::Core`

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or validating core values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Sample buffer length does not equal `width * height * channels`.
    #[error("buffer size mismatch: expected {expected} samples, got {actual}")]
    BufferSizeMismatch {
        /// Expected number of samples
        expected: usize,
        /// Actual number of samples
        actual: usize,
    },

    /// Channel count is zero or above [`crate::MAX_CHANNELS`].
    #[error("unsupported channel count {0} (expected 1..=4)")]
    InvalidChannels(u32),

    /// Histogram length is not `256 * channels`.
    #[error("histogram has {len} entries, expected {expected} for {channels} channel(s)")]
    HistogramShape {
        /// Actual number of entries
        len: usize,
        /// Expected number of entries
        expected: usize,
        /// Channel count the histogram was declared with
        channels: u32,
    },

    /// A channel block of raw counts sums past what a `u32` running sum holds.
    #[error("histogram channel {channel} totals {total} counts, above the 32-bit limit")]
    HistogramOverflow {
        /// Channel whose block overflows
        channel: u32,
        /// Sum of the block's counts
        total: u64,
    },

    /// Image is too large to be indexed by 32-bit device counters.
    ///
    /// Histogram bins and kernel indices are `u32`, so the total sample count
    /// must fit in a `u32`.
    #[error("image {width}x{height}x{channels} exceeds the 32-bit sample limit")]
    DimensionOverflow {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Channel count
        channels: u32,
    },

    /// Two values that must share a channel count do not.
    #[error("channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch {
        /// Expected channel count
        expected: u32,
        /// Actual channel count
        got: u32,
    },
}
