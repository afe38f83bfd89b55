//! Histogram command
//!
//! Prints per-channel bin counts (or running sums) computed on the device.

use std::path::Path;

use anyhow::Result;
use tracing::{info, trace};

use histeq_core::BIN_COUNT;

use crate::HistogramArgs;

pub fn run(args: HistogramArgs, config: Option<&Path>, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), cumulative = args.cumulative, json = args.json, "histogram::run");

    let config = super::pipeline_config(config, &args.pipeline)?;
    let image = super::load_image(&args.input, config.channels)?;
    let eq = super::open_equalizer(config)?;
    let (w, h, c) = image.dimensions();
    info!(backend = eq.name(), w, h, c, "Building histogram");

    let histogram = eq.build_histogram(&image)?;
    let (kind, counts) = if args.cumulative {
        ("cumulative", eq.cumulate(&histogram)?.into_counts())
    } else {
        ("histogram", histogram.into_counts())
    };
    let blocks: Vec<&[u32]> = counts.chunks(BIN_COUNT).collect();

    if args.json {
        let doc = serde_json::json!({
            "file": args.input.display().to_string(),
            "width": w,
            "height": h,
            "channels": c,
            "kind": kind,
            "backend": eq.name(),
            "bins": blocks,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{}: {}x{}, {} channel(s), {}", args.input.display(), w, h, c, kind);
    if verbose > 0 {
        println!("Device: {}", eq.device_name());
    }
    for (ch, block) in blocks.iter().enumerate() {
        println!("channel {ch}:");
        for (bin, &count) in block.iter().enumerate() {
            if count != 0 {
                println!("  {bin:>3}  {count}");
            }
        }
    }

    Ok(())
}
