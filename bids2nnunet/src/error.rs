use std::path::PathBuf;

use thiserror::Error;

/// The error type for `bids2nnunet` operations.
///
/// This enum covers every failure class of the conversion pipeline, from
/// malformed source layouts to failed invocations of the external nnUNetv2
/// command-line tools.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Error for when an expected directory is missing from the source tree.
    #[error("Expected directory does not exist: {path}")]
    MissingDirectory {
        /// The directory that was expected.
        path: PathBuf,
    },

    /// Error for when an expected file is missing from the source tree.
    #[error("Expected file does not exist: {path}")]
    MissingFile {
        /// The file that was expected.
        path: PathBuf,
    },

    /// Error for when a file name does not follow the BIDS
    /// `sub-<participant>_..._sample-<id>` convention.
    #[error("File name does not contain the expected 'sub-*_sample-*' pattern: {path}")]
    UnrecognizedFileName {
        /// The offending file.
        path: PathBuf,
    },

    /// Error for when a row of `samples.tsv` cannot be parsed.
    #[error("Malformed samples manifest {path} at line {line}: {reason}")]
    MalformedManifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// One-based line number of the offending row.
        line: usize,
        /// Why the row was rejected.
        reason: String,
    },

    /// Error for when a training image has no matching manual annotation.
    #[error("No manual annotation found for {participant} {sample}")]
    MissingLabel {
        /// The participant identifier, e.g. `sub-nyuMouse26`.
        participant: String,
        /// The sample identifier, e.g. `sample-0002`.
        sample: String,
    },

    /// Error for when an image refers to a sample absent from `samples.tsv`.
    #[error("Sample {participant} {sample} is not listed in the samples manifest")]
    UnlistedSample {
        /// The participant identifier.
        participant: String,
        /// The sample identifier.
        sample: String,
    },

    /// Error for when the destination dataset directory is already populated
    /// and no overwrite was requested.
    #[error("Destination is already populated (pass --overwrite to replace it): {path}")]
    DestinationExists {
        /// The populated dataset directory.
        path: PathBuf,
    },

    /// Error for when the number of files on disk disagrees with the
    /// expected case count.
    #[error("{folder} holds {actual} files but {expected} were expected")]
    CountMismatch {
        /// The folder that was recounted, e.g. `imagesTr`.
        folder: String,
        /// The count implied by the case assignment or descriptor.
        expected: usize,
        /// The count actually found on disk.
        actual: usize,
    },

    /// Error for when a label file has no corresponding image.
    #[error("Orphaned label without a matching image: {path}")]
    OrphanLabel {
        /// The orphaned label file.
        path: PathBuf,
    },

    /// Error for when a source tree yields no training cases at all.
    #[error("No annotated subjects found under {path}")]
    EmptySource {
        /// The BIDS root that was searched.
        path: PathBuf,
    },

    /// Error for when an external nnUNetv2 command exits with failure.
    #[error("External command failed{}: {command}", exit_code_suffix(.code))]
    CommandFailed {
        /// The rendered command line.
        command: String,
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// Error for when an external nnUNetv2 command is not installed.
    #[error("'{program}' not found on PATH; install nnUNetv2 first")]
    CommandNotFound {
        /// The program that could not be spawned.
        program: String,
    },

    /// Error for when an image file cannot be decoded or encoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error for when JSON metadata cannot be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error for a failed file-system operation, with the path it touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the operation touched.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// Wrap an I/O error together with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_code_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

/// A specialized `Result` type for `bids2nnunet` operations.
pub type ConversionResult<T> = Result<T, ConversionError>;
