//! Pipeline driver.
//!
//! # Configuration
//!
//! Use [`EqualizerBuilder`] to pick the backend and pipeline options:
//!
//! ```ignore
//! use histeq_compute::{EqualizerBuilder, Backend, ScanStrategy};
//!
//! let eq = EqualizerBuilder::new()
//!     .backend(Backend::Wgpu)
//!     .adapter(1)
//!     .scan(ScanStrategy::Direct)
//!     .build()?;
//! let out = eq.equalize(&image)?;
//! ```
//!
//! The driver runs histogram, cumulate and remap strictly in that order.
//! Intermediates are host values handed from one stage to the next; nothing
//! is cached between calls, so equalizing the same image twice gives
//! bit-identical results.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use histeq_core::{CumulativeHistogram, Histogram, Image, Normalization};

use crate::backend::{AnyEqualizer, Backend, ComputeDevice, create_equalizer};
use crate::config::{EqualizeConfig, PowerMode, ScanStrategy};
use crate::stages::{self, PipelineStage, StageTimings};
use crate::{ComputeError, ComputeResult};

// ============================================================================
// Report
// ============================================================================

/// Intermediates and timings of one [`Equalizer::equalize_with_report`] run.
#[derive(Debug, Clone)]
pub struct EqualizeReport {
    /// Device that ran the kernels.
    pub device: String,
    pub histogram: Histogram,
    pub cumulative: CumulativeHistogram,
    /// Per-stage timings in execution order.
    pub stages: Vec<(PipelineStage, StageTimings)>,
    /// Wall time of the whole pipeline, including host-side bookkeeping.
    pub total: Duration,
}

impl EqualizeReport {
    /// Timings of one stage.
    pub fn stage(&self, stage: PipelineStage) -> Option<&StageTimings> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, t)| t)
    }
}

impl fmt::Display for EqualizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "device: {}", self.device)?;
        for (stage, timings) in &self.stages {
            writeln!(f, "  {:<10} {}", stage.name(), timings)?;
        }
        write!(f, "  {:<10} {:.3} ms", "pipeline", self.total.as_secs_f64() * 1000.0)
    }
}

// ============================================================================
// Equalizer
// ============================================================================

/// Histogram equalization pipeline over one compute device.
///
/// The device is opened once and reused across calls.
pub struct Equalizer<D: ComputeDevice> {
    device: D,
    config: EqualizeConfig,
}

impl<D: ComputeDevice> Equalizer<D> {
    /// Create with default pipeline options.
    pub fn new(device: D) -> Self {
        Self::with_config(device, EqualizeConfig::default())
    }

    /// Create with explicit options.
    pub fn with_config(device: D, config: EqualizeConfig) -> Self {
        Self { device, config }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &EqualizeConfig {
        &self.config
    }

    /// Release the device for reuse with other options.
    pub fn into_device(self) -> D {
        self.device
    }

    /// Backend name.
    pub fn name(&self) -> &'static str {
        self.device.name()
    }

    pub fn device_name(&self) -> String {
        self.device.device_name()
    }

    fn check_channels(&self, image: &Image) -> ComputeResult<()> {
        match self.config.channels {
            Some(expected) if expected != image.channels() => Err(ComputeError::InvalidConfig(format!(
                "pipeline configured for {expected} channel(s), image has {}",
                image.channels()
            ))),
            _ => Ok(()),
        }
    }

    /// Per-channel 256-bin histogram of `image`.
    pub fn build_histogram(&self, image: &Image) -> ComputeResult<Histogram> {
        self.check_channels(image)?;
        stages::build_histogram(&self.device, image).map(|(h, _)| h)
    }

    /// Inclusive running sum of each channel block.
    pub fn cumulate(&self, histogram: &Histogram) -> ComputeResult<CumulativeHistogram> {
        stages::cumulate(&self.device, histogram, self.config.scan).map(|(c, _)| c)
    }

    /// Map `image` through `cumulative` with the configured normalization.
    pub fn remap(&self, image: &Image, cumulative: &CumulativeHistogram) -> ComputeResult<Image> {
        self.check_channels(image)?;
        stages::remap(&self.device, image, cumulative, self.config.normalization).map(|(i, _)| i)
    }

    /// Equalize `image`, returning a new image of the same shape.
    pub fn equalize(&self, image: &Image) -> ComputeResult<Image> {
        self.equalize_with_report(image).map(|(out, _)| out)
    }

    /// Equalize `image` and report intermediates and stage timings.
    pub fn equalize_with_report(&self, image: &Image) -> ComputeResult<(Image, EqualizeReport)> {
        let (width, height, channels) = image.dimensions();
        trace!(width, height, channels, backend = self.name(), "equalize");
        self.check_channels(image)?;

        let start = Instant::now();
        let (histogram, t_hist) = stages::build_histogram(&self.device, image)?;
        let (cumulative, t_cdf) = stages::cumulate(&self.device, &histogram, self.config.scan)?;
        let (output, t_remap) = stages::remap(&self.device, image, &cumulative, self.config.normalization)?;
        let total = start.elapsed();

        debug!(backend = self.name(), total_ms = total.as_secs_f64() * 1000.0, "equalize complete");

        let report = EqualizeReport {
            device: self.device_name(),
            histogram,
            cumulative,
            stages: vec![
                (PipelineStage::Histogram, t_hist),
                (PipelineStage::Cumulate, t_cdf),
                (PipelineStage::Remap, t_remap),
            ],
            total,
        };
        Ok((output, report))
    }
}

impl<D: ComputeDevice> fmt::Debug for Equalizer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equalizer")
            .field("device", &self.device.device_name())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for an [`AnyEqualizer`].
///
/// Starts from [`EqualizeConfig::default`]; each setter overrides one field.
#[derive(Debug, Clone, Default)]
pub struct EqualizerBuilder {
    config: EqualizeConfig,
}

impl EqualizerBuilder {
    /// Create new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: EqualizeConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a YAML configuration file.
    pub fn config_file(self, path: impl AsRef<Path>) -> ComputeResult<Self> {
        Ok(self.config(EqualizeConfig::from_yaml_file(path)?))
    }

    /// Set compute backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Select a GPU adapter by enumeration index.
    pub fn adapter(mut self, index: usize) -> Self {
        self.config.device.adapter = Some(index);
        self
    }

    pub fn power(mut self, power: PowerMode) -> Self {
        self.config.device.power = power;
        self
    }

    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.config.normalization = normalization;
        self
    }

    pub fn scan(mut self, scan: ScanStrategy) -> Self {
        self.config.scan = scan;
        self
    }

    /// Reject images whose channel count differs from `channels`.
    pub fn channels(mut self, channels: u32) -> Self {
        self.config.channels = Some(channels);
        self
    }

    /// Apply `HISTEQ_BACKEND` / `HISTEQ_ADAPTER`.
    pub fn env_overrides(mut self) -> ComputeResult<Self> {
        self.config = self.config.with_env_overrides()?;
        Ok(self)
    }

    /// Open the device and build the equalizer.
    pub fn build(self) -> ComputeResult<AnyEqualizer> {
        create_equalizer(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;

    #[test]
    fn test_report_has_all_stages() {
        let eq = Equalizer::new(CpuDevice::new());
        let image = Image::filled(3, 3, 1, 42).unwrap();
        let (_, report) = eq.equalize_with_report(&image).unwrap();
        for stage in PipelineStage::ALL {
            assert!(report.stage(stage).is_some());
        }
        assert_eq!(report.histogram.channel(0)[42], 9);
        assert_eq!(report.cumulative.total(0), 9);
        assert!(report.to_string().contains("remap"));
    }

    #[test]
    fn test_channel_requirement() {
        let config = EqualizeConfig { channels: Some(3), ..Default::default() };
        let eq = Equalizer::with_config(CpuDevice::new(), config);
        let gray = Image::filled(2, 2, 1, 0).unwrap();
        assert!(matches!(eq.equalize(&gray), Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_cpu() {
        let eq = EqualizerBuilder::new()
            .backend(Backend::Cpu)
            .scan(ScanStrategy::Direct)
            .normalization(Normalization::Linear)
            .build()
            .unwrap();
        assert_eq!(eq.name(), "cpu");
        assert_eq!(eq.config().scan, ScanStrategy::Direct);
        assert_eq!(eq.config().normalization, Normalization::Linear);
    }

    #[test]
    fn test_builder_rejects_bad_channels() {
        let err = EqualizerBuilder::new().backend(Backend::Cpu).channels(9).build().unwrap_err();
        assert!(matches!(err, ComputeError::InvalidConfig(_)));
    }
}
