//! nnUNetv2 Inference Tool
//!
//! Runs `nnUNetv2_predict` over a directory of images with a trained model,
//! selecting the checkpoint (best vs. final) and the compute device.
//!
//! ## Usage
//!
//! ```bash
//! # Predict with the final checkpoint on CUDA
//! cargo run --bin predict -- imagesTs/ --target-dir /data/nnunet --output /data/predictions
//!
//! # Predict with the best checkpoint on CPU, model stored elsewhere
//! cargo run --bin predict -- imagesTs/ --target-dir /data/nnunet \
//!     --model /models/myelin --best --cpu
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use bids2nnunet::{Checkpoint, Device, NnUnetEnv, NnUnetRunner};
use bids2nnunet_tools::PredictConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of input images to predict on
    input: PathBuf,

    /// Output directory for predicted masks
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Conversion target directory holding the nnUNetv2 roots
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Trained model root, overriding <target-dir>/nnUNet_results
    #[arg(long)]
    model: Option<PathBuf>,

    /// Numeric nnUNetv2 dataset id
    #[arg(long)]
    dataset_id: Option<u32>,

    /// nnUNetv2 configuration name
    #[arg(long)]
    configuration: Option<String>,

    /// Use the best checkpoint instead of the final one
    #[arg(long)]
    best: bool,

    /// Run on CPU instead of CUDA
    #[arg(long)]
    cpu: bool,

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
        serde_json::from_str::<PredictConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        PredictConfig::default()
    };

    // Apply command line overrides
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(target_dir) = args.target_dir {
        config.target_dir = target_dir;
    }
    if let Some(model) = args.model {
        config.model_dir = Some(model);
    }
    if let Some(dataset_id) = args.dataset_id {
        config.dataset_id = dataset_id;
    }
    if let Some(configuration) = args.configuration {
        config.configuration = configuration;
    }
    if args.best {
        config.use_best_checkpoint = true;
    }
    if args.cpu {
        config.cpu = true;
    }

    if !args.input.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", args.input.display());
    }
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let mut env = NnUnetEnv::from_target_dir(&config.target_dir);
    if let Some(model_dir) = &config.model_dir {
        env.results_dir = model_dir.clone();
    }

    let checkpoint = if config.use_best_checkpoint {
        Checkpoint::Best
    } else {
        Checkpoint::Final
    };
    let device = if config.cpu { Device::Cpu } else { Device::Cuda };

    NnUnetRunner::new(env)
        .predict(
            &args.input,
            &config.output_dir,
            config.dataset_id,
            &config.configuration,
            checkpoint,
            device,
        )
        .context("Inference failed")?;

    println!(
        "Predictions written to {}",
        config.output_dir.display()
    );
    println!("Inference completed successfully!");
    Ok(())
}
