//! Equalize command
//!
//! Loads an image, runs the full pipeline and writes the result.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, trace};

use crate::EqualizeArgs;

pub fn run(args: EqualizeArgs, config: Option<&Path>, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "equalize::run");

    let config = super::pipeline_config(config, &args.pipeline)?;
    let image = super::load_image(&args.input, config.channels)?;
    let eq = super::open_equalizer(config)?;

    let (w, h, c) = image.dimensions();
    info!(backend = eq.name(), device = %eq.device_name(), w, h, c, "Equalizing");

    if verbose > 0 {
        println!("Equalizing {} ({}x{}, {} channel(s)) on {}",
            args.input.display(), w, h, c, eq.device_name());
    }

    let (output, report) = eq
        .equalize_with_report(&image)
        .with_context(|| format!("Failed to equalize: {}", args.input.display()))?;

    super::save_image(&args.output, &output)?;

    if args.report {
        println!("{report}");
    }
    if verbose > 0 {
        println!("Done.");
    }

    Ok(())
}
