//! Devices command
//!
//! Lists compute backends and the GPU adapters `--device` can select.

use anyhow::Result;
use tracing::trace;

use histeq_compute::{describe_backends, list_devices, select_best_backend};

pub fn run(verbose: u8) -> Result<()> {
    trace!("devices::run");

    println!("Backends:");
    for line in describe_backends().lines() {
        println!("  {line}");
    }
    if verbose > 0 {
        println!("Auto-selected: {}", select_best_backend());
    }

    let adapters = list_devices();
    if adapters.is_empty() {
        println!("No GPU adapters found");
        return Ok(());
    }
    println!("Adapters:");
    for adapter in adapters {
        println!("  {adapter}");
    }

    Ok(())
}
