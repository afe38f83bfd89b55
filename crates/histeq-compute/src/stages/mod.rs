//! The three pipeline stages.
//!
//! Every stage follows the same shape: upload inputs to stage-scoped device
//! buffers, dispatch one kernel, block until it completes and copy the result
//! back. Buffers are dropped when the stage function returns, whether it
//! succeeds or fails.

mod cumulate;
mod histogram;
mod remap;

pub use cumulate::cumulate;
pub use histogram::build_histogram;
pub use remap::remap;

use std::fmt;
use std::time::{Duration, Instant};

use crate::ComputeResult;

/// Pipeline stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Histogram,
    Cumulate,
    Remap,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [PipelineStage; 3] = [Self::Histogram, Self::Cumulate, Self::Remap];

    pub fn name(self) -> &'static str {
        match self {
            Self::Histogram => "histogram",
            Self::Cumulate => "cumulate",
            Self::Remap => "remap",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-measured wall time of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    /// Allocation and host-to-device copies.
    pub upload: Duration,
    /// Kernel dispatch until completion.
    pub kernel: Duration,
    /// Device-to-host copy.
    pub download: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.upload + self.kernel + self.download
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upload {:>9.3} ms  kernel {:>9.3} ms  download {:>9.3} ms  total {:>9.3} ms",
            ms(self.upload), ms(self.kernel), ms(self.download), ms(self.total()),
        )
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Run `f`, adding its wall time to `slot`.
pub(crate) fn timed<T>(slot: &mut Duration, f: impl FnOnce() -> ComputeResult<T>) -> ComputeResult<T> {
    let start = Instant::now();
    let out = f();
    *slot += start.elapsed();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        let t = StageTimings {
            upload: Duration::from_millis(2),
            kernel: Duration::from_millis(5),
            download: Duration::from_millis(1),
        };
        assert_eq!(t.total(), Duration::from_millis(8));
        assert!(t.to_string().contains("kernel"));
    }

    #[test]
    fn test_timed_propagates_error() {
        let mut slot = Duration::ZERO;
        let res: ComputeResult<()> = timed(&mut slot, || {
            Err(crate::ComputeError::Transfer("boom".into()))
        });
        assert!(res.is_err());
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<_> = PipelineStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["histogram", "cumulate", "remap"]);
    }
}
