//! Pipeline configuration.
//!
//! [`EqualizeConfig`] gathers every knob of the pipeline: which backend runs
//! the kernels, which adapter to pick, how the cumulative histogram is scanned
//! and how remapped values are normalized.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. [`EqualizeConfig::default`]
//! 2. YAML file ([`EqualizeConfig::from_yaml_file`])
//! 3. Environment (`HISTEQ_BACKEND`, `HISTEQ_ADAPTER`)
//! 4. Explicit builder / command line values
//!
//! ```yaml
//! backend: wgpu
//! device:
//!   adapter: 1
//!   power: low-power
//! normalization: linear
//! scan: direct
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use histeq_core::{MAX_CHANNELS, Normalization};

use crate::backend::Backend;
use crate::{ComputeError, ComputeResult};

/// Environment variable selecting the backend (`auto`, `cpu`, `wgpu`).
pub const ENV_BACKEND: &str = "HISTEQ_BACKEND";
/// Environment variable selecting the adapter index.
pub const ENV_ADAPTER: &str = "HISTEQ_ADAPTER";

/// Prefix-sum algorithm used by the cumulate kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Work-efficient up-sweep/down-sweep scan, one workgroup per channel.
    #[default]
    Blelloch,
    /// One worker per bin summing all lower bins of its channel.
    Direct,
}

impl ScanStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Blelloch => "blelloch",
            Self::Direct => "direct",
        }
    }
}

impl std::str::FromStr for ScanStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blelloch" | "bl" => Ok(Self::Blelloch),
            "direct" | "naive" => Ok(Self::Direct),
            other => Err(format!("unknown scan strategy '{other}' (expected blelloch or direct)")),
        }
    }
}

/// Adapter power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerMode {
    #[default]
    HighPerformance,
    LowPower,
}

/// Which GPU adapter to open.
///
/// An explicit `adapter` index (as printed by `histeq devices`) wins over the
/// power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelector {
    pub adapter: Option<usize>,
    pub power: PowerMode,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizeConfig {
    pub backend: Backend,
    pub device: DeviceSelector,
    /// Required channel count; `None` accepts any image.
    pub channels: Option<u32>,
    pub normalization: Normalization,
    pub scan: ScanStrategy,
}

impl EqualizeConfig {
    /// Parse from YAML text.
    pub fn from_yaml_str(text: &str) -> ComputeResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| ComputeError::InvalidConfig(format!("bad YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ComputeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML text.
    pub fn to_yaml(&self) -> ComputeResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ComputeError::InvalidConfig(format!("cannot serialize: {e}")))
    }

    /// Apply `HISTEQ_BACKEND` / `HISTEQ_ADAPTER` from the process environment.
    pub fn with_env_overrides(self) -> ComputeResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ComputeResult<Self> {
        if let Some(value) = lookup(ENV_BACKEND) {
            self.backend = value
                .parse()
                .map_err(|e: String| ComputeError::InvalidConfig(format!("{ENV_BACKEND}: {e}")))?;
            tracing::debug!(backend = self.backend.name(), "backend from environment");
        }
        if let Some(value) = lookup(ENV_ADAPTER) {
            let index = value.trim().parse::<usize>().map_err(|e| {
                ComputeError::InvalidConfig(format!("{ENV_ADAPTER}='{value}': {e}"))
            })?;
            self.device.adapter = Some(index);
            tracing::debug!(adapter = index, "adapter from environment");
        }
        Ok(self)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ComputeResult<()> {
        if let Some(c) = self.channels {
            if c == 0 || c > MAX_CHANNELS {
                return Err(ComputeError::InvalidConfig(format!(
                    "channels must be 1..={MAX_CHANNELS}, got {c}"
                )));
            }
        }
        Ok(())
    }
}
