//! nnUNetv2 Training Tool
//!
//! Runs `nnUNetv2_train` for one fold or for all five cross-validation
//! folds in sequence. A failed fold halts the run; the remaining folds are
//! not attempted.
//!
//! ## Usage
//!
//! ```bash
//! # Train all folds
//! cargo run --bin train -- --target-dir /data/nnunet
//!
//! # Train a single fold
//! cargo run --bin train -- --target-dir /data/nnunet --fold 2
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bids2nnunet::{NnUnetEnv, NnUnetRunner, DEFAULT_CONFIGURATION, NUM_FOLDS};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversion target directory holding the nnUNetv2 roots
    #[arg(long, default_value = ".")]
    target_dir: PathBuf,

    /// Numeric nnUNetv2 dataset id
    #[arg(long, default_value = "1")]
    dataset_id: u32,

    /// nnUNetv2 configuration name
    #[arg(long, default_value = DEFAULT_CONFIGURATION)]
    configuration: String,

    /// Train only this fold instead of all folds
    #[arg(long)]
    fold: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(fold) = args.fold {
        anyhow::ensure!(fold < NUM_FOLDS, "Fold must be in 0..{NUM_FOLDS}");
    }

    let env = NnUnetEnv::from_target_dir(&args.target_dir);
    if !env.preprocessed_dir.is_dir() {
        anyhow::bail!(
            "No nnUNet_preprocessed directory under {}; run preprocess first",
            args.target_dir.display()
        );
    }

    let runner = NnUnetRunner::new(env);
    match args.fold {
        Some(fold) => {
            runner
                .train(args.dataset_id, &args.configuration, fold)
                .with_context(|| format!("Training fold {fold} failed"))?;
        }
        None => {
            runner
                .train_all_folds(args.dataset_id, &args.configuration)
                .context("Training failed")?;
        }
    }

    println!("Training completed successfully!");
    Ok(())
}
