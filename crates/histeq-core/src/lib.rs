//! # histeq-core
//!
//! Core types for histogram equalization of 8-bit images.
//!
//! - [`Image`] - Interleaved 8-bit image buffer (1 to 4 channels)
//! - [`Histogram`] - Per-channel 256-bin intensity counts
//! - [`CumulativeHistogram`] - Per-channel inclusive running sums
//! - [`Normalization`] - Mapping from cumulative counts to output samples
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies. The compute crate builds the
//! device pipeline on top of these types:
//!
//! ```text
//! histeq-core (this crate)
//!    ^
//!    |
//!    +-- histeq-compute (CPU / wgpu pipeline)
//!           ^
//!           +-- histeq-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod histogram;
pub mod image;
pub mod normalize;

pub use error::{Error, Result};
pub use histogram::{BIN_COUNT, CumulativeHistogram, Histogram};
pub use image::{Image, MAX_CHANNELS};
pub use normalize::Normalization;
