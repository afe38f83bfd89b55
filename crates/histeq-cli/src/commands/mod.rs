//! CLI command implementations

pub mod devices;
pub mod equalize;
pub mod histogram;

use std::path::Path;

use anyhow::{Context, Result, bail};
use image::ColorType;
use tracing::debug;

use histeq_compute::{AnyEqualizer, EqualizeConfig, EqualizerBuilder, PowerMode};
use histeq_core::Image;

use crate::PipelineArgs;

/// Load image from path, converting to `channels` 8-bit channels.
///
/// Without an explicit count the file's own channel layout is kept; deeper
/// formats are reduced to 8 bits per sample.
pub fn load_image(path: &Path, channels: Option<u32>) -> Result<Image> {
    let decoded = image::open(path)
        .with_context(|| format!("Failed to load: {}", path.display()))?;
    let channels = channels.unwrap_or(decoded.color().channel_count() as u32);
    let (width, height) = (decoded.width(), decoded.height());

    let data = match channels {
        1 => decoded.into_luma8().into_raw(),
        2 => decoded.into_luma_alpha8().into_raw(),
        3 => decoded.into_rgb8().into_raw(),
        4 => decoded.into_rgba8().into_raw(),
        n => bail!("Unsupported channel count {n} (expected 1-4)"),
    };
    debug!(path = %path.display(), width, height, channels, "loaded image");

    Image::from_raw(data, width, height, channels)
        .with_context(|| format!("Invalid image: {}", path.display()))
}

/// Save image to path; the format follows the file extension.
pub fn save_image(path: &Path, image: &Image) -> Result<()> {
    let color = match image.channels() {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        n => bail!("Unsupported channel count {n}"),
    };
    image::save_buffer(path, image.data(), image.width(), image.height(), color)
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Layer pipeline options: config file, then environment, then flags.
pub fn pipeline_config(path: Option<&Path>, args: &PipelineArgs) -> Result<EqualizeConfig> {
    let config = match path {
        Some(path) => EqualizeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EqualizeConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid environment override")?;

    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(index) = args.device {
        config.device.adapter = Some(index);
    }
    if args.low_power {
        config.device.power = PowerMode::LowPower;
    }
    if let Some(normalization) = args.normalization {
        config.normalization = normalization;
    }
    if let Some(scan) = args.scan {
        config.scan = scan;
    }
    if let Some(channels) = args.channels {
        config.channels = Some(channels);
    }

    config.validate().context("Invalid pipeline configuration")?;
    debug!(?config, "pipeline configuration");
    Ok(config)
}

/// Open the configured compute device.
pub fn open_equalizer(config: EqualizeConfig) -> Result<AnyEqualizer> {
    let backend = config.backend;
    EqualizerBuilder::new()
        .config(config)
        .build()
        .with_context(|| format!("Failed to open {backend} backend"))
}
