use tracing::{debug, trace};

use histeq_core::{CumulativeHistogram, Image, Normalization};

use super::{PipelineStage, StageTimings, timed};
use crate::backend::{ComputeDevice, KernelDims, RemapParams};
use crate::ComputeResult;

/// Map every sample through its channel's cumulative histogram.
///
/// An empty image is returned as-is.
pub fn remap<D: ComputeDevice>(device: &D, image: &Image, cumulative: &CumulativeHistogram,
                               normalization: Normalization) -> ComputeResult<(Image, StageTimings)> {
    let (width, height, channels) = image.dimensions();
    trace!(width, height, channels, normalization = normalization.name(), "remap");

    if cumulative.channels() != channels {
        return Err(histeq_core::Error::ChannelMismatch {
            expected: channels,
            got: cumulative.channels(),
        }
        .into());
    }

    let mut timings = StageTimings::default();
    if image.is_empty() {
        return Ok((image.clone(), timings));
    }

    let len = image.data().len();
    let (samples, cdf, mut dst) = timed(&mut timings.upload, || {
        let samples = device.upload_samples(image.data(), "image_samples")?;
        let cdf = device.upload_counts(cumulative.counts(), "cumulative")?;
        let dst = device.allocate_samples(len, "remapped_samples")?;
        Ok((samples, cdf, dst))
    })?;

    let params = RemapParams::new(
        KernelDims::new(image.pixel_count(), channels),
        normalization,
        cumulative.min_nonzero_per_channel(),
    );
    timed(&mut timings.kernel, || device.exec_remap(&samples, &cdf, &mut dst, params))?;
    let out = timed(&mut timings.download, || device.download_samples(&dst, len))?;

    debug!(stage = %PipelineStage::Remap, backend = device.name(), %timings, "stage complete");
    Ok((image.with_samples(out)?, timings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use crate::ComputeError;
    use histeq_core::Histogram;

    #[test]
    fn test_channel_mismatch() {
        let image = Image::filled(2, 2, 3, 7).unwrap();
        let cdf = CumulativeHistogram::sequential(&Histogram::zeroed(1).unwrap());
        let err = remap(&CpuDevice::new(), &image, &cdf, Normalization::MinNonZero).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Core(histeq_core::Error::ChannelMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn test_empty_passthrough() {
        let image = Image::empty(1).unwrap();
        let cdf = CumulativeHistogram::sequential(&Histogram::zeroed(1).unwrap());
        let (out, _) = remap(&CpuDevice::new(), &image, &cdf, Normalization::Linear).unwrap();
        assert_eq!(out, image);
    }
}
