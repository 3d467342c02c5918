//! BIDS → nnUNetv2 Conversion Tool
//!
//! Converts a BIDS-organized myelin boundary segmentation dataset into the
//! raw-data layout nnUNetv2 trains on.
//!
//! ## Usage
//!
//! ```bash
//! # Convert into the current directory
//! cargo run --bin convert -- /data/bids
//!
//! # Convert into a dedicated target with a custom dataset name
//! cargo run --bin convert -- /data/bids --target-dir /data/nnunet --dataset-name Myelin
//!
//! # Replace an existing conversion
//! cargo run --bin convert -- /data/bids --target-dir /data/nnunet --overwrite
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bids2nnunet::{BidsLayout, ConvertOptions, Converter};
use bids2nnunet_tools::ConvertConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the source dataset in BIDS format
    datapath: PathBuf,

    /// Target directory for the converted dataset
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Name of the converted dataset
    #[arg(long)]
    dataset_name: Option<String>,

    /// Description recorded in the dataset descriptor
    #[arg(long)]
    description: Option<String>,

    /// Numeric nnUNetv2 dataset id
    #[arg(long)]
    dataset_id: Option<u32>,

    /// Replace an already populated destination
    #[arg(long)]
    overwrite: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<ConvertConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        ConvertConfig::default()
    };

    // Apply command line overrides
    if let Some(target_dir) = args.target_dir {
        config.target_dir = target_dir;
    }
    if let Some(dataset_name) = args.dataset_name {
        config.dataset_name = dataset_name;
    }
    if let Some(description) = args.description {
        config.description = description;
    }
    if let Some(dataset_id) = args.dataset_id {
        config.dataset_id = dataset_id;
    }
    if args.overwrite {
        config.overwrite = true;
    }

    if !args.datapath.exists() {
        anyhow::bail!("Source path does not exist: {}", args.datapath.display());
    }

    let layout = BidsLayout::open(&args.datapath)
        .with_context(|| format!("Failed to discover BIDS layout in {}", args.datapath.display()))?;

    println!(
        "Converting {} annotated and {} unannotated subjects...",
        layout.annotated_subjects().len(),
        layout.unannotated_subjects().len()
    );

    let options = ConvertOptions {
        dataset_name: config.dataset_name,
        description: config.description,
        dataset_id: config.dataset_id,
        overwrite: config.overwrite,
    };
    let summary = Converter::new(&layout, options)
        .run(&config.target_dir)
        .context("Conversion failed")?;

    println!(
        "Wrote {} training and {} test cases to {}",
        summary.num_training,
        summary.num_test,
        summary.dataset_dir.display()
    );
    println!("Conversion completed successfully!");
    Ok(())
}
