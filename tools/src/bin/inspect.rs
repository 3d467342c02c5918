//! Dataset Inspection Tool
//!
//! Prints a diagnostic report for a converted dataset: the directory tree,
//! the case counts, and any naming irregularities. Read-only; exits with a
//! non-zero status when irregularities were found so it can gate scripted
//! pipelines.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin inspect -- /data/nnunet/nnUNet_raw/Dataset001_MyelinBoundarySegmentation
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bids2nnunet::DatasetReport;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the converted dataset directory
    dataset_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let report = DatasetReport::scan(&args.dataset_dir).with_context(|| {
        format!("Failed to scan dataset: {}", args.dataset_dir.display())
    })?;
    print!("{report}");

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
