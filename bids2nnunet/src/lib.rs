//! BIDS → nnUNetv2 dataset preparation for myelin boundary segmentation.
//!
//! Converts a BIDS-organized microscopy dataset into the raw-data layout
//! nnUNetv2 trains on: annotated subjects become training cases with 0/1
//! boundary masks, unannotated subjects become test cases, and the
//! `dataset.json` descriptor is generated alongside. Preprocessing, training
//! and inference stay in nnUNetv2; the `nnunet` module assembles those
//! invocations.

mod bids;
mod convert;
mod descriptor;
mod error;
mod nnunet;
mod report;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bids::{BidsLayout, SampleKey, SampleRow};
pub use convert::{CaseId, CaseMap, ConversionSummary, ConvertOptions, Converter};
pub use descriptor::DatasetDescriptor;
pub use error::{ConversionError, ConversionResult};
pub use nnunet::{
    Checkpoint, Device, NnUnetEnv, NnUnetRunner, DEFAULT_CONFIGURATION, NUM_FOLDS,
};
pub use report::DatasetReport;
