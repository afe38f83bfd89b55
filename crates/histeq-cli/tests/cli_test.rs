//! End-to-end tests for the `histeq` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn histeq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_histeq"))
        .args(args)
        .env_remove("HISTEQ_BACKEND")
        .env_remove("HISTEQ_ADAPTER")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run histeq")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// 4x1 grayscale ramp 0,1,2,3.
fn write_ramp(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("ramp.png");
    image::save_buffer(&path, &[0u8, 1, 2, 3], 4, 1, image::ColorType::L8).unwrap();
    path
}

#[test]
fn test_equalize_cpu() {
    let dir = TempDir::new().unwrap();
    let input = write_ramp(&dir);
    let output = dir.path().join("out.png");

    let out = histeq(&["equalize", path_str(&input), "-o", path_str(&output), "-b", "cpu"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let result = image::open(&output).unwrap().into_luma8();
    assert_eq!(result.into_raw(), vec![0, 85, 170, 255]);
}

#[test]
fn test_equalize_report_and_linear() {
    let dir = TempDir::new().unwrap();
    let input = write_ramp(&dir);
    let output = dir.path().join("out.png");

    let out = histeq(&[
        "equalize", path_str(&input), "-o", path_str(&output),
        "--backend", "cpu", "--normalization", "linear", "--scan", "direct", "--report",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    for stage in ["histogram", "cumulate", "remap"] {
        assert!(stdout.contains(stage), "missing {stage} in report:\n{stdout}");
    }

    let result = image::open(&output).unwrap().into_luma8();
    assert_eq!(result.into_raw(), vec![64, 128, 191, 255]);
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let input = write_ramp(&dir);
    let output = dir.path().join("out.png");
    let config = dir.path().join("histeq.yaml");
    std::fs::write(&config, "backend: cpu\nnormalization: linear\n").unwrap();

    let out = histeq(&["--config", path_str(&config), "equalize", path_str(&input), "-o", path_str(&output)]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let result = image::open(&output).unwrap().into_luma8();
    assert_eq!(result.into_raw(), vec![64, 128, 191, 255]);
}

#[test]
fn test_histogram_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rgb.png");
    let pixels: Vec<u8> = [10u8, 20, 30].repeat(6);
    image::save_buffer(&input, &pixels, 3, 2, image::ColorType::Rgb8).unwrap();

    let out = histeq(&["histogram", path_str(&input), "--json", "-b", "cpu"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(doc["channels"], 3);
    assert_eq!(doc["kind"], "histogram");
    let bins = doc["bins"].as_array().unwrap();
    assert_eq!(bins.len(), 3);
    assert_eq!(bins[0][10], 6);
    assert_eq!(bins[1][20], 6);
    assert_eq!(bins[2][30], 6);
}

#[test]
fn test_histogram_cumulative_text() {
    let dir = TempDir::new().unwrap();
    let input = write_ramp(&dir);

    let out = histeq(&["histogram", path_str(&input), "--cumulative", "-b", "cpu"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("cumulative"));
    assert!(stdout.contains("255  4"));
}

#[test]
fn test_channels_conversion() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rgb.png");
    image::save_buffer(&input, &[0u8, 0, 0, 255, 255, 255], 2, 1, image::ColorType::Rgb8).unwrap();
    let output = dir.path().join("gray.png");

    let out = histeq(&["equalize", path_str(&input), "-o", path_str(&output), "-b", "cpu", "-c", "1"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let result = image::open(&output).unwrap();
    assert_eq!(result.color().channel_count(), 1);
}

#[test]
fn test_devices() {
    let out = histeq(&["devices"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("CPU"));
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.png");
    let out = histeq(&["equalize", "does-not-exist.png", "-o", path_str(&output), "-b", "cpu"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to load"));
}

#[test]
fn test_log_file() {
    let dir = TempDir::new().unwrap();
    let input = write_ramp(&dir);
    let output = dir.path().join("out.png");
    let log = dir.path().join("histeq.log");

    let out = histeq(&[
        "-vv", "--log", path_str(&log),
        "equalize", path_str(&input), "-o", path_str(&output), "-b", "cpu",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("stage complete"));
}
