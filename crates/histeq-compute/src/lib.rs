//! Histogram equalization on compute devices.
//!
//! Runs the three-stage equalization pipeline (histogram, cumulative
//! histogram, remap) on a CPU (rayon) or GPU (wgpu) backend. Each stage copies
//! its inputs to device buffers, dispatches one kernel and copies the result
//! back before the next stage starts.
//!
//! # Architecture
//!
//! ```text
//! Equalizer<D: ComputeDevice> (pipeline driver)
//!     ├── stages::build_histogram ──> exec_histogram  (atomic scatter-add)
//!     ├── stages::cumulate        ──> exec_cumulate   (per-channel scan)
//!     └── stages::remap           ──> exec_remap      (per-sample lookup)
//!             └── ComputeDevice trait
//!                     ├── CpuDevice  (rayon)
//!                     └── WgpuDevice (WGSL compute shaders)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use histeq_compute::{EqualizerBuilder, Backend};
//! use histeq_core::Image;
//!
//! let eq = EqualizerBuilder::new().backend(Backend::Auto).build()?;
//! let out = eq.equalize(&image)?;
//! ```

pub mod backend;
pub mod config;
pub mod equalizer;
pub mod stages;
mod shaders;

pub use backend::{
    AdapterSummary, AnyEqualizer, Backend, ComputeDevice, CpuDevice, DeviceBuffer, DeviceLimits,
    create_equalizer, describe_backends, detect_backends, list_devices, select_best_backend,
};
#[cfg(feature = "wgpu")]
pub use backend::{WgpuBuffer, WgpuDevice};
pub use config::{DeviceSelector, EqualizeConfig, PowerMode, ScanStrategy};
pub use equalizer::{EqualizeReport, Equalizer, EqualizerBuilder};
pub use stages::{PipelineStage, StageTimings};

pub use histeq_core::{CumulativeHistogram, Histogram, Image, Normalization};

use thiserror::Error;

/// Compute pipeline errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Adapter index {index} out of range ({count} adapter(s) found)")]
    AdapterIndex { index: usize, count: usize },

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to build kernel '{kernel}':\n{log}")]
    KernelBuild { kernel: &'static str, log: String },

    #[error("Failed to allocate {requested} bytes for '{label}': {reason}")]
    DeviceMemory {
        label: &'static str,
        requested: u64,
        reason: String,
    },

    #[error("Kernel '{kernel}' dispatch failed: {reason}")]
    Dispatch { kernel: &'static str, reason: String },

    #[error("Device transfer failed: {0}")]
    Transfer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] histeq_core::Error),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
