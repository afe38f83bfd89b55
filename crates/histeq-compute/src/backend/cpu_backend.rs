//! CPU backend using rayon for parallelization.
//!
//! Emulates the device execution model: buffers are host vectors, kernels are
//! rayon parallel loops, and the histogram kernel scatters into `AtomicU32`
//! bins exactly like the GPU kernel does with `atomicAdd`.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use histeq_core::BIN_COUNT;

use super::device::{ComputeDevice, DeviceBuffer, KernelDims, RemapParams, kernel};
use super::DeviceLimits;
use crate::config::ScanStrategy;
use crate::{ComputeError, ComputeResult};

enum CpuStorage {
    Samples(Vec<u8>),
    Counts(Vec<u32>),
}

/// CPU buffer - data stored in RAM.
pub struct CpuBuffer {
    storage: CpuStorage,
    label: &'static str,
}

impl CpuBuffer {
    fn samples(&self) -> ComputeResult<&[u8]> {
        match &self.storage {
            CpuStorage::Samples(v) => Ok(v),
            CpuStorage::Counts(_) => Err(self.kind_error("samples")),
        }
    }

    fn samples_mut(&mut self) -> ComputeResult<&mut [u8]> {
        match &mut self.storage {
            CpuStorage::Samples(v) => Ok(v),
            CpuStorage::Counts(_) => Err(ComputeError::Transfer(format!(
                "buffer '{}' holds counts, expected samples", self.label
            ))),
        }
    }

    fn counts(&self) -> ComputeResult<&[u32]> {
        match &self.storage {
            CpuStorage::Counts(v) => Ok(v),
            CpuStorage::Samples(_) => Err(self.kind_error("counts")),
        }
    }

    fn counts_mut(&mut self) -> ComputeResult<&mut [u32]> {
        match &mut self.storage {
            CpuStorage::Counts(v) => Ok(v),
            CpuStorage::Samples(_) => Err(ComputeError::Transfer(format!(
                "buffer '{}' holds samples, expected counts", self.label
            ))),
        }
    }

    fn kind_error(&self, expected: &str) -> ComputeError {
        ComputeError::Transfer(format!("buffer '{}' does not hold {expected}", self.label))
    }
}

impl DeviceBuffer for CpuBuffer {
    fn label(&self) -> &'static str {
        self.label
    }

    fn size_bytes(&self) -> u64 {
        match &self.storage {
            CpuStorage::Samples(v) => v.len() as u64,
            CpuStorage::Counts(v) => (v.len() * 4) as u64,
        }
    }
}

/// CPU compute device.
pub struct CpuDevice {
    limits: DeviceLimits,
}

impl CpuDevice {
    pub fn new() -> Self {
        // Get system RAM (fallback to 4GB if detection fails)
        let available = sys_info::mem_info()
            .map(|m| m.avail * 1024)
            .unwrap_or(4 * 1024 * 1024 * 1024);

        Self {
            limits: DeviceLimits {
                max_buffer_bytes: u64::MAX,
                max_storage_binding_bytes: u64::MAX,
                max_workgroups_per_dim: u32::MAX,
                available_memory: available,
            },
        }
    }

    /// CPU device with explicit limits (used to exercise allocation failures).
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self { limits }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn short_buffer(kernel: &'static str, label: &str, need: usize, have: usize) -> ComputeError {
    ComputeError::Dispatch {
        kernel,
        reason: format!("buffer '{label}' holds {have} elements, kernel needs {need}"),
    }
}

/// Work-efficient inclusive scan of a power-of-two block.
///
/// Up-sweep builds partial sums in place, down-sweep turns them into an
/// exclusive scan, and adding the input back makes it inclusive. Mirrors the
/// shared-memory steps of the WGSL kernel.
pub(crate) fn blelloch_inclusive(input: &[u32], out: &mut [u32]) {
    let n = input.len();
    debug_assert!(n.is_power_of_two() && out.len() == n);
    out.copy_from_slice(input);

    let mut offset = 1;
    while offset < n {
        let stride = offset * 2;
        for bi in (stride - 1..n).step_by(stride) {
            out[bi] += out[bi - offset];
        }
        offset = stride;
    }

    out[n - 1] = 0;
    offset = n / 2;
    while offset >= 1 {
        let stride = offset * 2;
        for bi in (stride - 1..n).step_by(stride) {
            let ai = bi - offset;
            let t = out[ai];
            out[ai] = out[bi];
            out[bi] += t;
        }
        offset /= 2;
    }

    for (o, &v) in out.iter_mut().zip(input) {
        *o += v;
    }
}

impl ComputeDevice for CpuDevice {
    type Buffer = CpuBuffer;

    fn upload_samples(&self, samples: &[u8], label: &'static str) -> ComputeResult<Self::Buffer> {
        self.limits.check_alloc(label, samples.len() as u64)?;
        Ok(CpuBuffer { storage: CpuStorage::Samples(samples.to_vec()), label })
    }

    fn upload_counts(&self, counts: &[u32], label: &'static str) -> ComputeResult<Self::Buffer> {
        self.limits.check_alloc(label, (counts.len() * 4) as u64)?;
        Ok(CpuBuffer { storage: CpuStorage::Counts(counts.to_vec()), label })
    }

    fn allocate_samples(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer> {
        self.limits.check_alloc(label, len as u64)?;
        Ok(CpuBuffer { storage: CpuStorage::Samples(vec![0; len]), label })
    }

    fn allocate_counts(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer> {
        self.limits.check_alloc(label, (len * 4) as u64)?;
        Ok(CpuBuffer { storage: CpuStorage::Counts(vec![0; len]), label })
    }

    fn download_samples(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u8>> {
        let data = buffer.samples()?;
        data.get(..len).map(<[u8]>::to_vec).ok_or_else(|| {
            ComputeError::Transfer(format!("read of {len} samples from '{}' ({} held)", buffer.label, data.len()))
        })
    }

    fn download_counts(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u32>> {
        let data = buffer.counts()?;
        data.get(..len).map(<[u32]>::to_vec).ok_or_else(|| {
            ComputeError::Transfer(format!("read of {len} counts from '{}' ({} held)", buffer.label, data.len()))
        })
    }

    fn exec_histogram(&self, samples: &Self::Buffer, hist: &mut Self::Buffer, dims: KernelDims) -> ComputeResult<()> {
        let c = dims.channels as usize;
        let n = dims.samples as usize;
        let src = samples.samples()?;
        if src.len() < n {
            return Err(short_buffer(kernel::BUILD_HISTOGRAM, samples.label, n, src.len()));
        }
        let hist_label = hist.label;
        let counts = hist.counts_mut()?;
        if counts.len() < c * BIN_COUNT {
            return Err(short_buffer(kernel::BUILD_HISTOGRAM, hist_label, c * BIN_COUNT, counts.len()));
        }

        let bins: Vec<AtomicU32> = counts.iter().map(|&v| AtomicU32::new(v)).collect();
        src[..n].par_chunks(c).for_each(|px| {
            for (ch, &v) in px.iter().enumerate() {
                bins[ch * BIN_COUNT + v as usize].fetch_add(1, Ordering::Relaxed);
            }
        });

        for (out, bin) in counts.iter_mut().zip(bins) {
            *out = bin.into_inner();
        }
        Ok(())
    }

    fn exec_cumulate(&self, hist: &Self::Buffer, cdf: &mut Self::Buffer,
                     channels: u32, scan: ScanStrategy) -> ComputeResult<()> {
        let name = match scan {
            ScanStrategy::Direct => kernel::CUMULATE_DIRECT,
            ScanStrategy::Blelloch => kernel::CUMULATE_BLELLOCH,
        };
        let n = channels as usize * BIN_COUNT;
        let src = hist.counts()?;
        if src.len() < n {
            return Err(short_buffer(name, hist.label, n, src.len()));
        }
        let cdf_label = cdf.label;
        let dst = cdf.counts_mut()?;
        if dst.len() < n {
            return Err(short_buffer(name, cdf_label, n, dst.len()));
        }
        let (src, dst) = (&src[..n], &mut dst[..n]);

        match scan {
            ScanStrategy::Direct => {
                dst.par_iter_mut().enumerate().for_each(|(j, out)| {
                    let base = j / BIN_COUNT * BIN_COUNT;
                    *out = src[base..=j].iter().sum();
                });
            }
            ScanStrategy::Blelloch => {
                dst.par_chunks_mut(BIN_COUNT)
                    .zip(src.par_chunks(BIN_COUNT))
                    .for_each(|(out, inp)| blelloch_inclusive(inp, out));
            }
        }
        Ok(())
    }

    fn exec_remap(&self, samples: &Self::Buffer, cdf: &Self::Buffer,
                  dst: &mut Self::Buffer, params: RemapParams) -> ComputeResult<()> {
        let c = params.dims.channels as usize;
        let n = params.dims.samples as usize;
        let total = params.dims.pixels;
        let norm = params.normalization();

        let src = samples.samples()?;
        if src.len() < n {
            return Err(short_buffer(kernel::REMAP, samples.label, n, src.len()));
        }
        let table = cdf.counts()?;
        if table.len() < c * BIN_COUNT {
            return Err(short_buffer(kernel::REMAP, cdf.label, c * BIN_COUNT, table.len()));
        }
        let dst_label = dst.label;
        let out = dst.samples_mut()?;
        if out.len() < n {
            return Err(short_buffer(kernel::REMAP, dst_label, n, out.len()));
        }

        out[..n].par_chunks_mut(c)
            .zip(src[..n].par_chunks(c))
            .for_each(|(out, inp)| {
                for ch in 0..c {
                    let v = inp[ch] as usize;
                    out[ch] = norm.apply(table[ch * BIN_COUNT + v], params.cdf_min[ch], total);
                }
            });
        Ok(())
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn device_name(&self) -> String {
        format!("CPU ({} threads)", rayon::current_num_threads())
    }
}
