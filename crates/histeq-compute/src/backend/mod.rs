//! Compute backends for histogram equalization.
//!
//! Provides CPU (rayon) and wgpu backends with automatic selection.
//!
//! # Architecture
//!
//! ```text
//! Equalizer<D: ComputeDevice>
//!     +-- CpuDevice  (rayon parallelization)
//!     +-- WgpuDevice (Vulkan/Metal/DX12)
//! ```
//!
//! Both backends run the same stage code; only buffer storage and kernel
//! execution differ.

mod cpu_backend;
mod detect;
mod device;
mod limits;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use cpu_backend::{CpuBuffer, CpuDevice};
pub use detect::{AdapterSummary, BackendInfo, describe_backends, detect_backends, list_devices, select_best_backend};
pub use device::{ComputeDevice, DeviceBuffer, KernelDims, RemapParams, kernel};
pub use limits::{DeviceLimits, WORKGROUP_SIZE};

#[cfg(feature = "wgpu")]
pub use wgpu_backend::{WgpuBuffer, WgpuDevice};

use serde::{Deserialize, Serialize};

use histeq_core::{CumulativeHistogram, Histogram, Image};

use crate::config::EqualizeConfig;
use crate::equalizer::{EqualizeReport, Equalizer};
use crate::ComputeResult;
#[cfg(not(feature = "wgpu"))]
use crate::ComputeError;

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// wgpu backend (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuDevice::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            other => Err(format!("unknown backend '{other}' (expected auto, cpu or wgpu)")),
        }
    }
}

/// Equalizer type enum for dynamic dispatch.
pub enum AnyEqualizer {
    Cpu(Equalizer<CpuDevice>),
    #[cfg(feature = "wgpu")]
    Wgpu(Equalizer<WgpuDevice>),
}

impl AnyEqualizer {
    /// Get backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu(e) => e.name(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.name(),
        }
    }

    /// Human-readable device name.
    pub fn device_name(&self) -> String {
        match self {
            Self::Cpu(e) => e.device_name(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.device_name(),
        }
    }

    /// Device limits.
    pub fn limits(&self) -> &DeviceLimits {
        match self {
            Self::Cpu(e) => e.device().limits(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.device().limits(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EqualizeConfig {
        match self {
            Self::Cpu(e) => e.config(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.config(),
        }
    }

    /// Run the histogram stage only.
    pub fn build_histogram(&self, image: &Image) -> ComputeResult<Histogram> {
        match self {
            Self::Cpu(e) => e.build_histogram(image),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.build_histogram(image),
        }
    }

    /// Run the cumulate stage only.
    pub fn cumulate(&self, histogram: &Histogram) -> ComputeResult<CumulativeHistogram> {
        match self {
            Self::Cpu(e) => e.cumulate(histogram),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.cumulate(histogram),
        }
    }

    /// Run the remap stage only.
    pub fn remap(&self, image: &Image, cumulative: &CumulativeHistogram) -> ComputeResult<Image> {
        match self {
            Self::Cpu(e) => e.remap(image, cumulative),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.remap(image, cumulative),
        }
    }

    /// Equalize an image.
    pub fn equalize(&self, image: &Image) -> ComputeResult<Image> {
        match self {
            Self::Cpu(e) => e.equalize(image),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.equalize(image),
        }
    }

    /// Equalize an image, returning intermediates and stage timings.
    pub fn equalize_with_report(&self, image: &Image) -> ComputeResult<(Image, EqualizeReport)> {
        match self {
            Self::Cpu(e) => e.equalize_with_report(image),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.equalize_with_report(image),
        }
    }
}

impl std::fmt::Debug for AnyEqualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyEqualizer")
            .field("backend", &self.name())
            .field("device", &self.device_name())
            .finish()
    }
}

/// Open the device named by `config.backend` and wrap it in an equalizer.
///
/// `Backend::Auto` picks the highest-priority available backend.
pub fn create_equalizer(config: EqualizeConfig) -> ComputeResult<AnyEqualizer> {
    config.validate()?;
    match config.backend {
        Backend::Auto => {
            let best = select_best_backend();
            tracing::debug!(backend = best.name(), "auto-selected backend");
            create_equalizer(EqualizeConfig { backend: best, ..config })
        }
        Backend::Cpu => Ok(AnyEqualizer::Cpu(Equalizer::with_config(CpuDevice::new(), config))),
        Backend::Wgpu => {
            #[cfg(feature = "wgpu")]
            {
                let device = WgpuDevice::with_selector(config.device)?;
                Ok(AnyEqualizer::Wgpu(Equalizer::with_config(device, config)))
            }
            #[cfg(not(feature = "wgpu"))]
            {
                Err(ComputeError::BackendNotAvailable(
                    "wgpu feature not enabled".to_string()
                ))
            }
        }
    }
}
