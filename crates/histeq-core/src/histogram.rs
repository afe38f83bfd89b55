//! Per-channel intensity histograms.
//!
//! Both histogram kinds share one layout: a flat `u32` array holding one
//! contiguous block of [`BIN_COUNT`] entries per channel.
//!
//! ```text
//! [ch0 bin0 .. ch0 bin255 | ch1 bin0 .. ch1 bin255 | ...]
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Image, Result};

/// Number of bins per channel (one per 8-bit intensity level).
pub const BIN_COUNT: usize = 256;

fn check_shape(len: usize, channels: u32) -> Result<()> {
    if channels == 0 || channels > crate::MAX_CHANNELS {
        return Err(Error::InvalidChannels(channels));
    }
    let expected = BIN_COUNT * channels as usize;
    if len != expected {
        return Err(Error::HistogramShape { len, expected, channels });
    }
    Ok(())
}

/// Raw per-bin counts.
///
/// Each channel block sums to the pixel count of the image it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHistogram")]
pub struct Histogram {
    counts: Vec<u32>,
    channels: u32,
}

/// Unchecked serialized form; deserialization goes through `from_counts`.
#[derive(Deserialize)]
struct RawHistogram {
    counts: Vec<u32>,
    channels: u32,
}

impl TryFrom<RawHistogram> for Histogram {
    type Error = Error;

    fn try_from(raw: RawHistogram) -> Result<Self> {
        Self::from_counts(raw.counts, raw.channels)
    }
}

impl Histogram {
    /// All-zero histogram for `channels` channels.
    pub fn zeroed(channels: u32) -> Result<Self> {
        check_shape(BIN_COUNT * channels as usize, channels)?;
        Ok(Self {
            counts: vec![0; BIN_COUNT * channels as usize],
            channels,
        })
    }

    /// Wraps raw counts, checking the block layout.
    ///
    /// Each channel block must sum to at most `u32::MAX` so its running sum
    /// fits the cumulative histogram.
    pub fn from_counts(counts: Vec<u32>, channels: u32) -> Result<Self> {
        check_shape(counts.len(), channels)?;
        for (channel, block) in counts.chunks_exact(BIN_COUNT).enumerate() {
            let total: u64 = block.iter().map(|&n| n as u64).sum();
            if total > u32::MAX as u64 {
                return Err(Error::HistogramOverflow { channel: channel as u32, total });
            }
        }
        Ok(Self { counts, channels })
    }

    /// Counts every sample of `image` on the host.
    ///
    /// Reference definition of the histogram stage; the compute backends must
    /// produce the same counts.
    pub fn of_image(image: &Image) -> Result<Self> {
        let mut hist = Self::zeroed(image.channels())?;
        let c = image.channels() as usize;
        for px in image.data().chunks_exact(c) {
            for (ch, &v) in px.iter().enumerate() {
                hist.counts[ch * BIN_COUNT + v as usize] += 1;
            }
        }
        Ok(hist)
    }

    /// Channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// All counts, channel blocks back to back.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Consumes the histogram and returns its counts.
    pub fn into_counts(self) -> Vec<u32> {
        self.counts
    }

    /// The 256-entry block of one channel.
    pub fn channel(&self, channel: u32) -> &[u32] {
        let start = channel as usize * BIN_COUNT;
        &self.counts[start..start + BIN_COUNT]
    }

    /// Sum of each channel block.
    pub fn channel_totals(&self) -> Vec<u64> {
        self.counts
            .chunks_exact(BIN_COUNT)
            .map(|block| block.iter().map(|&n| n as u64).sum())
            .collect()
    }
}

/// Inclusive running sums of a [`Histogram`], computed per channel block.
///
/// Non-decreasing within each block; the last entry of a block equals the
/// pixel count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeHistogram {
    counts: Vec<u32>,
    channels: u32,
}

impl CumulativeHistogram {
    /// Wraps raw cumulative counts, checking the block layout.
    pub fn from_counts(counts: Vec<u32>, channels: u32) -> Result<Self> {
        check_shape(counts.len(), channels)?;
        Ok(Self { counts, channels })
    }

    /// Sequential inclusive scan of each channel block.
    ///
    /// ```rust
    /// use histeq_core::{CumulativeHistogram, Histogram};
    ///
    /// let mut counts = vec![0u32; 256];
    /// counts[3] = 2;
    /// counts[7] = 5;
    /// let hist = Histogram::from_counts(counts, 1).unwrap();
    /// let cdf = CumulativeHistogram::sequential(&hist);
    /// assert_eq!(cdf.channel(0)[2], 0);
    /// assert_eq!(cdf.channel(0)[3], 2);
    /// assert_eq!(cdf.channel(0)[255], 7);
    /// ```
    pub fn sequential(hist: &Histogram) -> Self {
        let mut counts = hist.counts.clone();
        for block in counts.chunks_exact_mut(BIN_COUNT) {
            let mut acc = 0u32;
            for v in block.iter_mut() {
                acc += *v;
                *v = acc;
            }
        }
        Self {
            counts,
            channels: hist.channels,
        }
    }

    /// Channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// All cumulative counts, channel blocks back to back.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Consumes the histogram and returns its counts.
    pub fn into_counts(self) -> Vec<u32> {
        self.counts
    }

    /// The 256-entry block of one channel.
    pub fn channel(&self, channel: u32) -> &[u32] {
        let start = channel as usize * BIN_COUNT;
        &self.counts[start..start + BIN_COUNT]
    }

    /// Last entry of a channel block (the number of counted pixels).
    pub fn total(&self, channel: u32) -> u32 {
        self.channel(channel)[BIN_COUNT - 1]
    }

    /// Smallest non-zero entry of a channel block, or 0 if the block is empty.
    ///
    /// The block is non-decreasing, so this is the first non-zero entry.
    pub fn min_nonzero(&self, channel: u32) -> u32 {
        self.channel(channel)
            .iter()
            .copied()
            .find(|&v| v != 0)
            .unwrap_or(0)
    }

    /// [`Self::min_nonzero`] for every channel, padded with zeros to four.
    pub fn min_nonzero_per_channel(&self) -> [u32; 4] {
        let mut mins = [0u32; 4];
        for (ch, slot) in mins.iter_mut().enumerate().take(self.channels as usize) {
            *slot = self.min_nonzero(ch as u32);
        }
        mins
    }

    /// True if every channel block is non-decreasing.
    pub fn is_monotonic(&self) -> bool {
        self.counts
            .chunks_exact(BIN_COUNT)
            .all(|block| block.windows(2).all(|w| w[0] <= w[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        let err = Histogram::from_counts(vec![0; 300], 1).unwrap_err();
        assert_eq!(err, Error::HistogramShape { len: 300, expected: 256, channels: 1 });
        assert!(CumulativeHistogram::from_counts(vec![0; 768], 3).is_ok());
        assert_eq!(Histogram::zeroed(0).unwrap_err(), Error::InvalidChannels(0));
    }

    #[test]
    fn test_from_counts_rejects_overflowing_block() {
        let mut counts = vec![0u32; 512];
        counts[256] = u32::MAX;
        counts[257] = 1;
        let err = Histogram::from_counts(counts, 2).unwrap_err();
        assert_eq!(err, Error::HistogramOverflow { channel: 1, total: u32::MAX as u64 + 1 });

        // A block summing to exactly u32::MAX still scans without overflow
        let mut counts = vec![0u32; 256];
        counts[0] = u32::MAX - 1;
        counts[255] = 1;
        let hist = Histogram::from_counts(counts, 1).unwrap();
        assert_eq!(CumulativeHistogram::sequential(&hist).total(0), u32::MAX);
    }

    #[test]
    fn test_of_image_counts_per_channel() {
        let img = Image::from_raw(vec![0, 255, 0, 7, 255, 7], 2, 1, 3).unwrap();
        let hist = Histogram::of_image(&img).unwrap();
        assert_eq!(hist.channel(0)[0], 1);
        assert_eq!(hist.channel(0)[7], 1);
        assert_eq!(hist.channel(1)[255], 2);
        assert_eq!(hist.channel(2)[0], 1);
        assert_eq!(hist.channel(2)[7], 1);
        assert_eq!(hist.channel_totals(), vec![2, 2, 2]);
    }

    #[test]
    fn test_sequential_keeps_channels_apart() {
        let mut counts = vec![0u32; 512];
        counts[255] = 4;
        counts[256] = 1;
        let hist = Histogram::from_counts(counts, 2).unwrap();
        let cdf = CumulativeHistogram::sequential(&hist);
        assert_eq!(cdf.total(0), 4);
        assert_eq!(cdf.channel(1)[0], 1);
        assert_eq!(cdf.total(1), 1);
        assert!(cdf.is_monotonic());
    }

    #[test]
    fn test_min_nonzero() {
        let mut counts = vec![0u32; 256];
        counts[10] = 3;
        counts[20] = 1;
        let hist = Histogram::from_counts(counts, 1).unwrap();
        let cdf = CumulativeHistogram::sequential(&hist);
        assert_eq!(cdf.min_nonzero(0), 3);
        assert_eq!(cdf.min_nonzero_per_channel(), [3, 0, 0, 0]);

        let empty = CumulativeHistogram::from_counts(vec![0; 256], 1).unwrap();
        assert_eq!(empty.min_nonzero(0), 0);
    }

    #[test]
    fn test_is_monotonic_detects_decrease() {
        let mut counts = vec![5u32; 256];
        counts[100] = 4;
        let cdf = CumulativeHistogram::from_counts(counts, 1).unwrap();
        assert!(!cdf.is_monotonic());
    }
}
