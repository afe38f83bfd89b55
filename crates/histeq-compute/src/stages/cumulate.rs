use tracing::{debug, trace};

use histeq_core::{CumulativeHistogram, Histogram};

use super::{PipelineStage, StageTimings, timed};
use crate::backend::ComputeDevice;
use crate::config::ScanStrategy;
use crate::ComputeResult;

/// Inclusive prefix sum of each channel block.
pub fn cumulate<D: ComputeDevice>(device: &D, histogram: &Histogram,
                                  scan: ScanStrategy) -> ComputeResult<(CumulativeHistogram, StageTimings)> {
    let channels = histogram.channels();
    trace!(channels, scan = scan.name(), "cumulate");

    let len = histogram.counts().len();
    let mut timings = StageTimings::default();
    let (hist, mut cdf) = timed(&mut timings.upload, || {
        let hist = device.upload_counts(histogram.counts(), "histogram")?;
        let cdf = device.allocate_counts(len, "cumulative")?;
        Ok((hist, cdf))
    })?;

    timed(&mut timings.kernel, || device.exec_cumulate(&hist, &mut cdf, channels, scan))?;
    let counts = timed(&mut timings.download, || device.download_counts(&cdf, len))?;

    debug!(stage = %PipelineStage::Cumulate, backend = device.name(), %timings, "stage complete");
    Ok((CumulativeHistogram::from_counts(counts, channels)?, timings))
}
