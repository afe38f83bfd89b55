//! Shared inputs for the histeq benchmarks.

use histeq_core::{Image, Result};

/// Deterministic noise image skewed towards dark values.
pub fn noise_image(width: u32, height: u32, channels: u32) -> Result<Image> {
    let mut state = 0x9e37_79b9u32;
    let data = (0..width as usize * height as usize * channels as usize)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            ((state >> 24) as u8) / 3
        })
        .collect();
    Image::from_raw(data, width, height, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        let a = noise_image(16, 8, 3).unwrap();
        assert_eq!(a, noise_image(16, 8, 3).unwrap());
        assert!(a.data().iter().all(|&v| v <= 85));
    }
}
