//! Configuration for the pipeline tools.
//!
//! Each tool accepts an optional JSON configuration file; command-line
//! flags are applied on top of it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the conversion tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Target directory for the converted dataset.
    pub target_dir: PathBuf,
    /// Dataset name used in file names and the descriptor.
    pub dataset_name: String,
    /// Dataset description recorded in the descriptor.
    pub description: String,
    /// Numeric nnUNetv2 dataset id.
    pub dataset_id: u32,
    /// Replace an already populated destination instead of refusing.
    pub overwrite: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            dataset_name: "MyelinBoundarySegmentation".to_string(),
            description: "Myelin boundary segmentation dataset for nnUNetv2".to_string(),
            dataset_id: 1,
            overwrite: false,
        }
    }
}

/// Configuration for the inference tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    /// Conversion target directory holding the nnUNetv2 roots.
    pub target_dir: PathBuf,
    /// Output directory for predicted masks.
    pub output_dir: PathBuf,
    /// Trained model root, overriding `<target_dir>/nnUNet_results`.
    pub model_dir: Option<PathBuf>,
    /// Numeric nnUNetv2 dataset id.
    pub dataset_id: u32,
    /// nnUNetv2 configuration name.
    pub configuration: String,
    /// Load the best checkpoint instead of the final one.
    pub use_best_checkpoint: bool,
    /// Run on CPU instead of CUDA.
    pub cpu: bool,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            output_dir: PathBuf::from("predictions"),
            model_dir: None,
            dataset_id: 1,
            configuration: "2d".to_string(),
            use_best_checkpoint: false,
            cpu: false,
        }
    }
}
