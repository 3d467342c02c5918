//! nnUNetv2 Preprocessing Tool
//!
//! Runs `nnUNetv2_plan_and_preprocess` with dataset integrity verification
//! against a converted dataset. The three nnUNetv2 directory roots are
//! derived from the conversion target directory and exported to the child
//! process.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin preprocess -- --target-dir /data/nnunet
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bids2nnunet::{NnUnetEnv, NnUnetRunner};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversion target directory holding nnUNet_raw
    #[arg(long, default_value = ".")]
    target_dir: PathBuf,

    /// Numeric nnUNetv2 dataset id
    #[arg(long, default_value = "1")]
    dataset_id: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let env = NnUnetEnv::from_target_dir(&args.target_dir);
    if !env.raw_dir.is_dir() {
        anyhow::bail!(
            "No nnUNet_raw directory under {}; run convert first",
            args.target_dir.display()
        );
    }

    NnUnetRunner::new(env)
        .plan_and_preprocess(args.dataset_id)
        .context("Preprocessing failed")?;

    println!("Preprocessing completed successfully!");
    Ok(())
}
