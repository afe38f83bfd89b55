//! Interleaved 8-bit image buffer.
//!
//! Samples are stored pixel by pixel, channel by channel:
//!
//! ```text
//! [r0 g0 b0 r1 g1 b1 ...]
//! ```
//!
//! The total sample count is limited to `u32::MAX` so that every sample can be
//! addressed by a 32-bit kernel index.

use crate::{Error, Result};

/// Maximum number of interleaved channels per pixel.
pub const MAX_CHANNELS: u32 = 4;

/// 8-bit image with interleaved channels.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u32,
}

impl Image {
    /// Creates an image from raw interleaved samples.
    ///
    /// # Example
    ///
    /// ```rust
    /// use histeq_core::Image;
    ///
    /// let img = Image::from_raw(vec![10, 20, 30, 40, 50, 60], 2, 1, 3).unwrap();
    /// assert_eq!(img.pixel_count(), 2);
    /// assert_eq!(img.pixel(1, 0), &[40, 50, 60]);
    /// ```
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, channels: u32) -> Result<Self> {
        let expected = Self::checked_len(width, height, channels)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height, channels })
    }

    /// Creates an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u32, value: u8) -> Result<Self> {
        let len = Self::checked_len(width, height, channels)?;
        Ok(Self {
            data: vec![value; len],
            width,
            height,
            channels,
        })
    }

    /// Creates an empty (0x0) image with the given channel count.
    pub fn empty(channels: u32) -> Result<Self> {
        Self::filled(0, 0, channels, 0)
    }

    fn checked_len(width: u32, height: u32, channels: u32) -> Result<usize> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannels(channels));
        }
        let len = (width as u64) * (height as u64) * (channels as u64);
        if len > u32::MAX as u64 {
            return Err(Error::DimensionOverflow { width, height, channels });
        }
        Ok(len as usize)
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// (width, height, channels).
    pub fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    /// Number of pixels. Always fits in `u32`.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Number of samples (`pixel_count * channels`).
    pub fn sample_count(&self) -> u32 {
        self.data.len() as u32
    }

    /// True if the image holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw interleaved samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image and returns its samples.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Samples of the pixel at (x, y).
    ///
    /// # Panics
    ///
    /// Panics if (x, y) is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Iterates over the samples of one channel.
    pub fn channel_samples(&self, channel: u32) -> impl Iterator<Item = u8> + '_ {
        self.data
            .iter()
            .skip(channel as usize)
            .step_by(self.channels as usize)
            .copied()
    }

    /// Builds a new image with the same dimensions from replacement samples.
    pub fn with_samples(&self, data: Vec<u8>) -> Result<Self> {
        Self::from_raw(data, self.width, self.height, self.channels)
    }

    /// Size of the sample buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_validates_len() {
        let err = Image::from_raw(vec![0; 11], 2, 2, 3).unwrap_err();
        assert_eq!(err, Error::BufferSizeMismatch { expected: 12, actual: 11 });
    }

    #[test]
    fn test_invalid_channels() {
        assert_eq!(Image::filled(1, 1, 0, 0).unwrap_err(), Error::InvalidChannels(0));
        assert_eq!(Image::filled(1, 1, 5, 0).unwrap_err(), Error::InvalidChannels(5));
    }

    #[test]
    fn test_dimension_overflow() {
        let err = Image::filled(65536, 65536, 3, 0).unwrap_err();
        assert!(matches!(err, Error::DimensionOverflow { .. }));
    }

    #[test]
    fn test_empty() {
        let img = Image::empty(3).unwrap();
        assert!(img.is_empty());
        assert_eq!(img.pixel_count(), 0);
        assert_eq!(img.dimensions(), (0, 0, 3));
    }

    #[test]
    fn test_channel_samples() {
        let img = Image::from_raw(vec![1, 2, 3, 4, 5, 6], 2, 1, 3).unwrap();
        let greens: Vec<u8> = img.channel_samples(1).collect();
        assert_eq!(greens, vec![2, 5]);
    }

    #[test]
    fn test_pixel() {
        let img = Image::from_raw((0..12).collect(), 2, 2, 3).unwrap();
        assert_eq!(img.pixel(0, 1), &[6, 7, 8]);
    }
}
