use tracing::{debug, trace};

use histeq_core::{BIN_COUNT, Histogram, Image};

use super::{PipelineStage, StageTimings, timed};
use crate::backend::{ComputeDevice, KernelDims};
use crate::ComputeResult;

/// Count every sample into its channel's 256-bin block.
///
/// An empty image yields an all-zero histogram without touching the device.
pub fn build_histogram<D: ComputeDevice>(device: &D, image: &Image) -> ComputeResult<(Histogram, StageTimings)> {
    let (width, height, channels) = image.dimensions();
    trace!(width, height, channels, "build_histogram");

    let mut timings = StageTimings::default();
    if image.is_empty() {
        return Ok((Histogram::zeroed(channels)?, timings));
    }

    let bins = channels as usize * BIN_COUNT;
    let (samples, mut hist) = timed(&mut timings.upload, || {
        let samples = device.upload_samples(image.data(), "image_samples")?;
        let hist = device.allocate_counts(bins, "histogram")?;
        Ok((samples, hist))
    })?;

    let dims = KernelDims::new(image.pixel_count(), channels);
    timed(&mut timings.kernel, || device.exec_histogram(&samples, &mut hist, dims))?;
    let counts = timed(&mut timings.download, || device.download_counts(&hist, bins))?;

    debug!(stage = %PipelineStage::Histogram, backend = device.name(), %timings, "stage complete");
    Ok((Histogram::from_counts(counts, channels)?, timings))
}
