//! Device abstraction shared by every backend.
//!
//! A [`ComputeDevice`] is the capability object the pipeline is built on: it
//! owns the device, queue and compiled kernels, and exposes buffer transfers
//! plus the three equalization kernels. Buffers are stage-scoped: the stage
//! that allocates one drops it before returning, on every path.

use bytemuck::{Pod, Zeroable};

use histeq_core::Normalization;

use super::DeviceLimits;
use crate::config::ScanStrategy;
use crate::ComputeResult;

/// Handle to a region of device memory.
pub trait DeviceBuffer: Send + Sync {
    /// Debug label given at allocation.
    fn label(&self) -> &'static str;

    /// Allocated size in bytes.
    fn size_bytes(&self) -> u64;
}

/// Shape of one kernel launch over an image.
///
/// Laid out as a WGSL `vec4<u32>` uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct KernelDims {
    /// Samples in the image (`pixels * channels`).
    pub samples: u32,
    /// Pixels in the image.
    pub pixels: u32,
    /// Interleaved channels.
    pub channels: u32,
    /// Kernel-specific extra value.
    pub extra: u32,
}

impl KernelDims {
    pub fn new(pixels: u32, channels: u32) -> Self {
        Self {
            samples: pixels * channels,
            pixels,
            channels,
            extra: 0,
        }
    }
}

/// Uniform block of the remap kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct RemapParams {
    /// `extra` carries the [`Normalization::mode_id`].
    pub dims: KernelDims,
    /// Smallest non-zero cumulative count per channel.
    pub cdf_min: [u32; 4],
}

impl RemapParams {
    pub fn new(dims: KernelDims, normalization: Normalization, cdf_min: [u32; 4]) -> Self {
        Self {
            dims: KernelDims {
                extra: normalization.mode_id(),
                ..dims
            },
            cdf_min,
        }
    }

    pub fn normalization(&self) -> Normalization {
        if self.dims.extra == Normalization::Linear.mode_id() {
            Normalization::Linear
        } else {
            Normalization::MinNonZero
        }
    }
}

/// Kernel names, used in errors and logs.
pub mod kernel {
    pub const BUILD_HISTOGRAM: &str = "build_histogram";
    pub const CUMULATE_DIRECT: &str = "cumulate_histogram";
    pub const CUMULATE_BLELLOCH: &str = "cumulate_histogram_blelloch";
    pub const REMAP: &str = "remap_pixels";
}

/// Ready-to-dispatch compute context.
///
/// Implementations are read-only after construction and may be shared across
/// any number of pipeline runs.
pub trait ComputeDevice: Send + Sync {
    /// Backend-specific buffer type.
    type Buffer: DeviceBuffer;

    /// Copy 8-bit samples to a new device buffer.
    fn upload_samples(&self, samples: &[u8], label: &'static str) -> ComputeResult<Self::Buffer>;

    /// Copy 32-bit counts to a new device buffer.
    fn upload_counts(&self, counts: &[u32], label: &'static str) -> ComputeResult<Self::Buffer>;

    /// Allocate a zero-filled buffer for `len` samples.
    fn allocate_samples(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer>;

    /// Allocate a zero-filled buffer for `len` counts.
    fn allocate_counts(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer>;

    /// Copy the first `len` samples back to the host.
    fn download_samples(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u8>>;

    /// Copy the first `len` counts back to the host.
    fn download_counts(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u32>>;

    /// Atomically add one count per sample into `hist` (256 bins per channel).
    fn exec_histogram(&self, samples: &Self::Buffer, hist: &mut Self::Buffer, dims: KernelDims) -> ComputeResult<()>;

    /// Inclusive prefix sum of every 256-entry channel block of `hist`.
    fn exec_cumulate(&self, hist: &Self::Buffer, cdf: &mut Self::Buffer,
                     channels: u32, scan: ScanStrategy) -> ComputeResult<()>;

    /// Map every sample through its channel's cumulative histogram.
    fn exec_remap(&self, samples: &Self::Buffer, cdf: &Self::Buffer,
                  dst: &mut Self::Buffer, params: RemapParams) -> ComputeResult<()>;

    /// Device limits.
    fn limits(&self) -> &DeviceLimits;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Human-readable device name.
    fn device_name(&self) -> String;
}
