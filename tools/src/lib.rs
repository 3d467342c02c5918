//! Command-line tools for the myelin boundary segmentation pipeline.
//!
//! ## Available tools
//!
//! - `convert`: convert a BIDS source dataset into the nnUNetv2 raw layout
//! - `inspect`: print a diagnostic report for a converted dataset
//! - `preprocess`: run nnUNetv2 planning and preprocessing
//! - `train`: train nnUNetv2 cross-validation folds
//! - `predict`: run nnUNetv2 inference with a trained model
//!
//! ## Usage
//!
//! ```bash
//! # Convert a BIDS dataset
//! cargo run --bin convert -- /data/bids --target-dir /data/nnunet
//!
//! # Inspect the converted dataset
//! cargo run --bin inspect -- /data/nnunet/nnUNet_raw/Dataset001_MyelinBoundarySegmentation
//!
//! # Preprocess, train all folds, then predict
//! cargo run --bin preprocess -- --target-dir /data/nnunet
//! cargo run --bin train -- --target-dir /data/nnunet
//! cargo run --bin predict -- /data/nnunet/nnUNet_raw/Dataset001_MyelinBoundarySegmentation/imagesTs \
//!     --target-dir /data/nnunet --output /data/predictions
//! ```

pub mod config;

pub use config::{ConvertConfig, PredictConfig};
