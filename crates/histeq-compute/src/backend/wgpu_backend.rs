//! wgpu backend implementation.
//!
//! Runs the equalization kernels as WGSL compute shaders. Pipelines are
//! compiled once when the device is opened; every kernel launch then binds
//! stage-scoped buffers, dispatches and waits for the queue to drain.

use std::sync::Arc;

use bytemuck::Pod;
use histeq_core::BIN_COUNT;
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use super::device::{ComputeDevice, DeviceBuffer, KernelDims, RemapParams, kernel};
use super::detect::AdapterSummary;
use super::DeviceLimits;
use crate::config::{DeviceSelector, PowerMode, ScanStrategy};
use crate::shaders;
use crate::{ComputeError, ComputeResult};

// =============================================================================
// WgpuBuffer Handle
// =============================================================================

/// Storage buffer in device memory.
///
/// The underlying allocation is destroyed when the handle drops.
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    size_bytes: u64,
}

impl DeviceBuffer for WgpuBuffer {
    fn label(&self) -> &'static str {
        self.label
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl WgpuBuffer {
    /// Fails with a dispatch error unless the buffer spans `need` bytes.
    fn require(&self, kernel: &'static str, need: u64) -> ComputeResult<()> {
        check_bytes(kernel, self.label, need, self.size_bytes)
    }
}

fn check_bytes(kernel: &'static str, label: &str, need: u64, have: u64) -> ComputeResult<()> {
    if have < need {
        return Err(ComputeError::Dispatch {
            kernel,
            reason: format!("buffer '{label}' holds {have} bytes, kernel needs {need}"),
        });
    }
    Ok(())
}

/// Bytes of `channels` blocks of 256 `u32` counts.
fn counts_bytes(channels: u32) -> u64 {
    channels as u64 * BIN_COUNT as u64 * 4
}

impl Drop for WgpuBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        trace!(label = self.label, bytes = self.size_bytes, "released device buffer");
    }
}

// =============================================================================
// Pipelines
// =============================================================================

struct Pipelines {
    histogram: wgpu::ComputePipeline,
    cumulate_direct: wgpu::ComputePipeline,
    cumulate_blelloch: wgpu::ComputePipeline,
    remap: wgpu::ComputePipeline,
}

// =============================================================================
// WgpuDevice
// =============================================================================

/// wgpu compute device.
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipelines: Pipelines,
    limits: DeviceLimits,
    adapter_info: wgpu::AdapterInfo,
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

fn power_preference(power: PowerMode) -> wgpu::PowerPreference {
    match power {
        PowerMode::HighPerformance => wgpu::PowerPreference::HighPerformance,
        PowerMode::LowPower => wgpu::PowerPreference::LowPower,
    }
}

impl WgpuDevice {
    /// Check if wgpu is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            instance()
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// List adapters in enumeration order; indices match [`DeviceSelector::adapter`].
    pub fn enumerate_adapters() -> Vec<AdapterSummary> {
        instance()
            .enumerate_adapters(wgpu::Backends::all())
            .iter()
            .enumerate()
            .map(|(index, adapter)| {
                let info = adapter.get_info();
                AdapterSummary {
                    index,
                    name: info.name,
                    backend: format!("{:?}", info.backend),
                    device_type: format!("{:?}", info.device_type),
                    driver: info.driver,
                }
            })
            .collect()
    }

    /// Open the default high-performance adapter.
    pub fn new() -> ComputeResult<Self> {
        Self::with_selector(DeviceSelector::default())
    }

    /// Open the adapter chosen by `selector`.
    pub fn with_selector(selector: DeviceSelector) -> ComputeResult<Self> {
        pollster::block_on(Self::new_async(selector))
    }

    /// Open the adapter chosen by `selector` asynchronously.
    pub async fn new_async(selector: DeviceSelector) -> ComputeResult<Self> {
        let instance = instance();

        let adapter = match selector.adapter {
            Some(index) => {
                let adapters = instance.enumerate_adapters(wgpu::Backends::all());
                let count = adapters.len();
                adapters
                    .into_iter()
                    .nth(index)
                    .ok_or(ComputeError::AdapterIndex { index, count })?
            }
            None => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: power_preference(selector.power),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok_or(ComputeError::NoAdapter)?,
        };

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("histeq_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
            }, None)
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        let adapter_info = adapter.get_info();
        let available_memory = estimate_vram(&adapter_info, adapter_limits.max_buffer_size);

        let limits = DeviceLimits {
            max_buffer_bytes: adapter_limits.max_buffer_size,
            max_storage_binding_bytes: adapter_limits.max_storage_buffer_binding_size as u64,
            max_workgroups_per_dim: adapter_limits.max_compute_workgroups_per_dimension,
            available_memory,
        };

        let pipelines = Self::create_pipelines(&device).await?;
        debug!(adapter = %adapter_info.name, backend = ?adapter_info.backend, "wgpu device ready");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pipelines,
            limits,
            adapter_info,
        })
    }

    async fn create_pipeline(device: &wgpu::Device, source: &str, kernel: &'static str) -> ComputeResult<wgpu::ComputePipeline> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kernel),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let info = module.get_compilation_info().await;

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel),
            layout: None, // Auto layout
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = device.pop_error_scope().await {
            let mut log: Vec<String> = info
                .messages
                .iter()
                .map(|m| match &m.location {
                    Some(loc) => format!("{}:{}: {:?}: {}", loc.line_number, loc.line_position, m.message_type, m.message),
                    None => format!("{:?}: {}", m.message_type, m.message),
                })
                .collect();
            log.push(err.to_string());
            return Err(ComputeError::KernelBuild { kernel, log: log.join("\n") });
        }
        Ok(pipeline)
    }

    async fn create_pipelines(device: &wgpu::Device) -> ComputeResult<Pipelines> {
        Ok(Pipelines {
            histogram: Self::create_pipeline(device, shaders::BUILD_HISTOGRAM, kernel::BUILD_HISTOGRAM).await?,
            cumulate_direct: Self::create_pipeline(device, shaders::CUMULATE_DIRECT, kernel::CUMULATE_DIRECT).await?,
            cumulate_blelloch: Self::create_pipeline(device, shaders::CUMULATE_BLELLOCH, kernel::CUMULATE_BLELLOCH).await?,
            remap: Self::create_pipeline(device, shaders::REMAP, kernel::REMAP).await?,
        })
    }

    /// Get adapter info (GPU name, vendor, etc.)
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Create a storage buffer, optionally initialised from `contents`.
    fn create_storage(&self, label: &'static str, size: u64, contents: Option<&[u8]>) -> ComputeResult<WgpuBuffer> {
        // Zero-sized bindings are invalid; keep at least one word.
        let size = size.max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        self.limits.check_alloc(label, size)?;

        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = match contents {
            Some(bytes) => {
                let mut padded = bytes.to_vec();
                padded.resize(size as usize, 0);
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: &padded,
                    usage,
                })
            }
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            }),
        };
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::DeviceMemory { label, requested: size, reason: err.to_string() });
        }

        trace!(label, bytes = size, "allocated device buffer");
        Ok(WgpuBuffer { buffer, label, size_bytes: size })
    }

    /// Create dims uniform buffer.
    fn create_uniform<T: Pod>(&self, label: &'static str, value: &T) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Bind `resources` to consecutive bindings, dispatch and wait.
    fn run_kernel(&self, kernel: &'static str, pipeline: &wgpu::ComputePipeline,
                  resources: &[&wgpu::Buffer], workgroups: (u32, u32, u32)) -> ComputeResult<()> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = resources
            .iter()
            .enumerate()
            .map(|(i, buf)| wgpu::BindGroupEntry { binding: i as u32, resource: buf.as_entire_binding() })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel),
            layout: &layout,
            entries: &entries,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compute_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let err = pollster::block_on(self.device.pop_error_scope());
        self.device.poll(wgpu::Maintain::Wait);
        if let Some(err) = err {
            return Err(ComputeError::Dispatch { kernel, reason: err.to_string() });
        }
        trace!(kernel, ?workgroups, "kernel complete");
        Ok(())
    }

    /// Copy `len` elements of `T` back through a staging buffer.
    fn read_back<T: Pod>(&self, handle: &WgpuBuffer, len: usize) -> ComputeResult<Vec<T>> {
        let bytes = (len * std::mem::size_of::<T>()) as u64;
        if bytes > handle.size_bytes {
            return Err(ComputeError::Transfer(format!(
                "read of {bytes} bytes from '{}' ({} allocated)", handle.label, handle.size_bytes
            )));
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        let size = bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        // Create staging buffer
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        // Copy to staging
        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&handle.buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        // Map and read
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| { let _ = tx.send(r); });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| ComputeError::Transfer("Map channel closed".into()))?
            .map_err(|e| ComputeError::Transfer(format!("Map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let items: &[T] = bytemuck::cast_slice(&data);
        let result = items[..len].to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }
}

impl ComputeDevice for WgpuDevice {
    type Buffer = WgpuBuffer;

    fn upload_samples(&self, samples: &[u8], label: &'static str) -> ComputeResult<Self::Buffer> {
        self.create_storage(label, samples.len() as u64, Some(samples))
    }

    fn upload_counts(&self, counts: &[u32], label: &'static str) -> ComputeResult<Self::Buffer> {
        self.create_storage(label, (counts.len() * 4) as u64, Some(bytemuck::cast_slice(counts)))
    }

    fn allocate_samples(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer> {
        self.create_storage(label, len as u64, None)
    }

    fn allocate_counts(&self, len: usize, label: &'static str) -> ComputeResult<Self::Buffer> {
        self.create_storage(label, (len * 4) as u64, None)
    }

    fn download_samples(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u8>> {
        self.read_back::<u8>(buffer, len)
    }

    fn download_counts(&self, buffer: &Self::Buffer, len: usize) -> ComputeResult<Vec<u32>> {
        self.read_back::<u32>(buffer, len)
    }

    fn exec_histogram(&self, samples: &Self::Buffer, hist: &mut Self::Buffer, dims: KernelDims) -> ComputeResult<()> {
        samples.require(kernel::BUILD_HISTOGRAM, dims.samples as u64)?;
        hist.require(kernel::BUILD_HISTOGRAM, counts_bytes(dims.channels))?;
        let workgroups = self.limits.dispatch_grid(kernel::BUILD_HISTOGRAM, dims.samples)?;
        let dims_buf = self.create_uniform("dims_uniform", &dims);
        self.run_kernel(
            kernel::BUILD_HISTOGRAM,
            &self.pipelines.histogram,
            &[&samples.buffer, &hist.buffer, &dims_buf],
            workgroups,
        )
    }

    fn exec_cumulate(&self, hist: &Self::Buffer, cdf: &mut Self::Buffer,
                     channels: u32, scan: ScanStrategy) -> ComputeResult<()> {
        // One workgroup per channel block in both variants.
        let (name, pipeline) = match scan {
            ScanStrategy::Direct => (kernel::CUMULATE_DIRECT, &self.pipelines.cumulate_direct),
            ScanStrategy::Blelloch => (kernel::CUMULATE_BLELLOCH, &self.pipelines.cumulate_blelloch),
        };
        hist.require(name, counts_bytes(channels))?;
        cdf.require(name, counts_bytes(channels))?;
        let dims = KernelDims { samples: 0, pixels: 0, channels, extra: 0 };
        let dims_buf = self.create_uniform("dims_uniform", &dims);
        self.run_kernel(name, pipeline, &[&hist.buffer, &cdf.buffer, &dims_buf], (channels, 1, 1))
    }

    fn exec_remap(&self, samples: &Self::Buffer, cdf: &Self::Buffer,
                  dst: &mut Self::Buffer, params: RemapParams) -> ComputeResult<()> {
        let n = params.dims.samples as u64;
        samples.require(kernel::REMAP, n)?;
        cdf.require(kernel::REMAP, counts_bytes(params.dims.channels))?;
        dst.require(kernel::REMAP, n)?;
        let words = params.dims.samples.div_ceil(4);
        let workgroups = self.limits.dispatch_grid(kernel::REMAP, words)?;
        let params_buf = self.create_uniform("remap_uniform", &params);
        self.run_kernel(
            kernel::REMAP,
            &self.pipelines.remap,
            &[&samples.buffer, &cdf.buffer, &dst.buffer, &params_buf],
            workgroups,
        )
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn device_name(&self) -> String {
        format!("{} ({:?})", self.adapter_info.name, self.adapter_info.backend)
    }
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("device", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

// =============================================================================
// VRAM Detection
// =============================================================================

/// Usable device memory, used only to gate allocations in `check_alloc`.
///
/// wgpu exposes no memory query, so the figure derives from the largest
/// buffer the adapter accepts. Histogram and cdf buffers never exceed 4 KiB,
/// which leaves the sample upload and remap output as the buffers these bands
/// actually bound.
fn estimate_vram(info: &wgpu::AdapterInfo, max_buffer_bytes: u64) -> u64 {
    if let Ok(value) = std::env::var("HISTEQ_GPU_MEMORY_MB") {
        match value.trim().parse::<u64>() {
            Ok(mb) => return mb.saturating_mul(1024 * 1024),
            Err(_) => warn!(value = %value, "ignoring unparsable HISTEQ_GPU_MEMORY_MB"),
        }
    }

    let from_buffer = max_buffer_bytes.saturating_mul(2);

    let estimated = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => from_buffer.clamp(2u64 << 30, 24u64 << 30),
        wgpu::DeviceType::IntegratedGpu => from_buffer.clamp(512u64 << 20, 4u64 << 30),
        wgpu::DeviceType::VirtualGpu => from_buffer.clamp(1u64 << 30, 8u64 << 30),
        _ => from_buffer.clamp(256u64 << 20, 2u64 << 30),
    };

    // 80% safe margin
    estimated.saturating_mul(80) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu() -> Option<WgpuDevice> {
        if !WgpuDevice::is_available() {
            eprintln!("no wgpu adapter, skipping");
            return None;
        }
        WgpuDevice::new().ok()
    }

    #[test]
    fn test_check_bytes() {
        assert!(check_bytes(kernel::REMAP, "dst", 16, 16).is_ok());
        match check_bytes(kernel::REMAP, "dst", 17, 16) {
            Err(ComputeError::Dispatch { kernel: name, reason }) => {
                assert_eq!(name, kernel::REMAP);
                assert!(reason.contains("'dst'"), "{reason}");
            }
            other => panic!("expected dispatch error, got {other:?}"),
        }
        assert_eq!(counts_bytes(3), 3 * 1024);
    }

    #[test]
    fn test_malformed_shader_reports_log() {
        let Some(dev) = gpu() else { return };
        let source = "@compute @workgroup_size(64)\nfn main() { let x: u32 = missing_symbol; }\n";
        let result = pollster::block_on(WgpuDevice::create_pipeline(&dev.device, source, "broken_kernel"));
        match result {
            Err(ComputeError::KernelBuild { kernel, log }) => {
                assert_eq!(kernel, "broken_kernel");
                assert!(!log.trim().is_empty());
            }
            Err(other) => panic!("expected kernel build error, got {other:?}"),
            Ok(_) => panic!("malformed shader compiled"),
        }
    }

    #[test]
    fn test_short_buffers_rejected() {
        let Some(dev) = gpu() else { return };

        let hist = dev.upload_counts(&[0u32; BIN_COUNT], "hist").unwrap();
        let mut cdf = dev.allocate_counts(2 * BIN_COUNT, "cdf").unwrap();
        match dev.exec_cumulate(&hist, &mut cdf, 2, ScanStrategy::Direct) {
            Err(ComputeError::Dispatch { kernel: name, reason }) => {
                assert_eq!(name, kernel::CUMULATE_DIRECT);
                assert!(reason.contains("'hist'"), "{reason}");
            }
            other => panic!("expected dispatch error, got {other:?}"),
        }

        let samples = dev.upload_samples(&[1u8; 8], "samples").unwrap();
        let table = dev.allocate_counts(BIN_COUNT, "cdf").unwrap();
        let mut dst = dev.allocate_samples(4, "dst").unwrap();
        let params = RemapParams {
            dims: KernelDims { samples: 8, pixels: 8, channels: 1, extra: 0 },
            cdf_min: [0; 4],
        };
        let err = dev.exec_remap(&samples, &table, &mut dst, params).unwrap_err();
        assert!(matches!(err, ComputeError::Dispatch { kernel: kernel::REMAP, .. }));
    }
}
