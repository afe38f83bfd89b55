//! Pipeline tests for histeq-compute on the CPU backend.

use histeq_compute::{
    Backend, ComputeError, CpuDevice, CumulativeHistogram, DeviceLimits, EqualizeConfig, Equalizer,
    EqualizerBuilder, Histogram, Image, Normalization, ScanStrategy, describe_backends,
};

/// Deterministic pseudo-random test image.
fn noise_image(width: u32, height: u32, channels: u32, seed: u32) -> Image {
    let mut state = seed;
    let data = (0..width * height * channels)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            // Skew towards dark values so equalization has work to do
            let v = (state >> 24) as u8;
            v / 2 + (v & 3)
        })
        .collect();
    Image::from_raw(data, width, height, channels).unwrap()
}

fn cpu(config: EqualizeConfig) -> Equalizer<CpuDevice> {
    Equalizer::with_config(CpuDevice::new(), config)
}

#[test]
fn test_cpu_backend_available() {
    assert!(Backend::Cpu.is_available());
    assert!(describe_backends().contains("CPU"));
}

#[test]
fn test_histogram_sums_to_pixel_count() {
    let eq = cpu(EqualizeConfig::default());
    let image = noise_image(97, 61, 3, 7);
    let hist = eq.build_histogram(&image).unwrap();
    for total in hist.channel_totals() {
        assert_eq!(total, image.pixel_count() as u64);
    }
    assert_eq!(hist, Histogram::of_image(&image).unwrap());
}

#[test]
fn test_cumulative_ends_at_pixel_count() {
    let eq = cpu(EqualizeConfig::default());
    let image = noise_image(64, 64, 4, 11);
    let cdf = eq.cumulate(&eq.build_histogram(&image).unwrap()).unwrap();
    assert!(cdf.is_monotonic());
    for c in 0..4 {
        assert_eq!(cdf.channel(c)[255], image.pixel_count());
    }
}

#[test]
fn test_scan_strategies_agree() {
    let image = noise_image(320, 240, 3, 3);
    let direct = cpu(EqualizeConfig { scan: ScanStrategy::Direct, ..Default::default() });
    let blelloch = cpu(EqualizeConfig { scan: ScanStrategy::Blelloch, ..Default::default() });

    let hist = direct.build_histogram(&image).unwrap();
    let a = direct.cumulate(&hist).unwrap();
    let b = blelloch.cumulate(&hist).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, CumulativeHistogram::sequential(&hist));
    assert_eq!(direct.equalize(&image).unwrap(), blelloch.equalize(&image).unwrap());
}

#[test]
fn test_equalize_deterministic() {
    let eq = cpu(EqualizeConfig::default());
    let image = noise_image(128, 96, 3, 42);
    let first = eq.equalize(&image).unwrap();
    let second = eq.equalize(&image).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.dimensions(), image.dimensions());
}

#[test]
fn test_equalize_matches_host_formula() {
    let image = noise_image(50, 30, 2, 5);
    for normalization in [Normalization::MinNonZero, Normalization::Linear] {
        let eq = cpu(EqualizeConfig { normalization, ..Default::default() });
        let out = eq.equalize(&image).unwrap();

        let cdf = CumulativeHistogram::sequential(&Histogram::of_image(&image).unwrap());
        let mins = cdf.min_nonzero_per_channel();
        let total = image.pixel_count();
        for (i, (&src, &dst)) in image.data().iter().zip(out.data()).enumerate() {
            let c = i % 2;
            let expected = normalization.apply(cdf.channel(c as u32)[src as usize], mins[c], total);
            assert_eq!(dst, expected, "sample {i} ({normalization})");
        }
    }
}

#[test]
fn test_empty_image() {
    let eq = cpu(EqualizeConfig::default());
    let image = Image::empty(3).unwrap();
    let out = eq.equalize(&image).unwrap();
    assert_eq!(out.dimensions(), (0, 0, 3));
    assert!(out.data().is_empty());
}

#[test]
fn test_single_pixel() {
    let image = Image::from_raw(vec![200, 200, 200], 1, 1, 3).unwrap();
    for normalization in [Normalization::MinNonZero, Normalization::Linear] {
        let eq = cpu(EqualizeConfig { normalization, ..Default::default() });
        let (out, report) = eq.equalize_with_report(&image).unwrap();

        for c in 0..3 {
            let hist = report.histogram.channel(c);
            assert_eq!(hist[200], 1);
            assert_eq!(hist.iter().sum::<u32>(), 1);

            let cdf = report.cumulative.channel(c);
            assert!(cdf[..200].iter().all(|&v| v == 0));
            assert!(cdf[200..].iter().all(|&v| v == 1));
        }
        assert_eq!(out.data(), &[255, 255, 255]);
    }
}

#[test]
fn test_flat_image_is_constant() {
    let eq = cpu(EqualizeConfig::default());
    let out = eq.equalize(&Image::filled(17, 9, 1, 77).unwrap()).unwrap();
    let first = out.data()[0];
    assert!(out.data().iter().all(|&v| v == first));
}

#[test]
fn test_two_level_image() {
    let eq = cpu(EqualizeConfig::default());
    let data: Vec<u8> = (0..8).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
    let image = Image::from_raw(data.clone(), 4, 2, 1).unwrap();
    let out = eq.equalize(&image).unwrap();
    assert_eq!(out.data(), data.as_slice());
}

#[test]
fn test_ramp() {
    let image = Image::from_raw(vec![0, 1, 2, 3], 2, 2, 1).unwrap();

    let eq = cpu(EqualizeConfig::default());
    assert_eq!(eq.equalize(&image).unwrap().data(), &[0, 85, 170, 255]);

    let eq = cpu(EqualizeConfig { normalization: Normalization::Linear, ..Default::default() });
    assert_eq!(eq.equalize(&image).unwrap().data(), &[64, 128, 191, 255]);
}

#[test]
fn test_input_not_mutated() {
    let eq = cpu(EqualizeConfig::default());
    let image = noise_image(16, 16, 3, 9);
    let copy = image.clone();
    let _ = eq.equalize(&image).unwrap();
    assert_eq!(image, copy);
}

#[test]
fn test_memory_limit_then_recovers() {
    let limits = DeviceLimits {
        max_buffer_bytes: 2048,
        ..Default::default()
    };
    let eq = Equalizer::new(CpuDevice::with_limits(limits));

    let big = noise_image(64, 64, 1, 1);
    match eq.equalize(&big) {
        Err(ComputeError::DeviceMemory { label, requested, .. }) => {
            assert_eq!(label, "image_samples");
            assert_eq!(requested, 4096);
        }
        other => panic!("expected DeviceMemory, got {other:?}"),
    }

    // Same device still works for an image that fits
    let small = noise_image(4, 4, 1, 1);
    assert!(eq.equalize(&small).is_ok());
}

#[test]
fn test_builder_from_env_style_config() {
    let config = EqualizeConfig::from_yaml_str("backend: cpu\nnormalization: linear\nscan: direct\n").unwrap();
    let eq = EqualizerBuilder::new().config(config).build().unwrap();
    assert_eq!(eq.name(), "cpu");

    let image = noise_image(8, 8, 3, 2);
    let reference = cpu(EqualizeConfig { normalization: Normalization::Linear, ..Default::default() });
    assert_eq!(eq.equalize(&image).unwrap(), reference.equalize(&image).unwrap());
}
