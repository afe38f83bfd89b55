//! Device resource limits and dispatch sizing.

use crate::{ComputeError, ComputeResult};

/// Threads per workgroup of the per-sample kernels.
pub const WORKGROUP_SIZE: u32 = 256;

/// Device resource limits.
#[derive(Debug, Clone)]
pub struct DeviceLimits {
    /// Maximum size of a single buffer in bytes.
    pub max_buffer_bytes: u64,
    /// Maximum size of a storage buffer binding in bytes.
    pub max_storage_binding_bytes: u64,
    /// Maximum workgroups along one dispatch dimension.
    pub max_workgroups_per_dim: u32,
    /// Available device memory in bytes.
    pub available_memory: u64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 256 * 1024 * 1024, // 256 MB
            max_storage_binding_bytes: 128 * 1024 * 1024,
            max_workgroups_per_dim: 65535,
            available_memory: 2 * 1024 * 1024 * 1024, // 2 GB
        }
    }
}

impl DeviceLimits {
    /// Check a buffer request against the device limits.
    pub fn check_alloc(&self, label: &'static str, bytes: u64) -> ComputeResult<()> {
        let cap = self.max_buffer_bytes.min(self.max_storage_binding_bytes);
        if bytes > cap {
            return Err(ComputeError::DeviceMemory {
                label,
                requested: bytes,
                reason: format!("exceeds device buffer limit of {cap} bytes"),
            });
        }
        if bytes > self.available_memory {
            return Err(ComputeError::DeviceMemory {
                label,
                requested: bytes,
                reason: format!("only {} bytes of device memory available", self.available_memory),
            });
        }
        Ok(())
    }

    /// Workgroup grid covering `invocations` threads of `WORKGROUP_SIZE`.
    ///
    /// Counts above the per-dimension limit fold into a 2-D grid; kernels
    /// rebuild the linear index as `x + y * grid_x * WORKGROUP_SIZE`.
    pub fn dispatch_grid(&self, kernel: &'static str, invocations: u32) -> ComputeResult<(u32, u32, u32)> {
        let groups = invocations.div_ceil(WORKGROUP_SIZE);
        let max = self.max_workgroups_per_dim;
        if max == 0 {
            return Err(ComputeError::Dispatch {
                kernel,
                reason: "device reports zero workgroups per dimension".into(),
            });
        }
        if groups <= max {
            return Ok((groups.max(1), 1, 1));
        }
        let y = groups.div_ceil(max);
        if y > max {
            return Err(ComputeError::Dispatch {
                kernel,
                reason: format!("{invocations} invocations exceed the {max}x{max} workgroup grid"),
            });
        }
        Ok((max, y, 1))
    }
}
