//! BIDS source layout discovery.
//!
//! This module locates subjects, microscopy images and manual annotations in
//! a BIDS-organized dataset. Annotated subjects live under
//! `derivatives/labels`, unannotated subjects under
//! `derivatives/ads-derivatives`, and the `samples.tsv` manifest at the root
//! fixes the order in which samples were acquired.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::info;
use regex::Regex;

use crate::error::{ConversionError, ConversionResult};

/// Identity of one microscopy sample, parsed from a BIDS file name.
///
/// File names follow the `sub-<participant>_..._sample-<id>_...` convention,
/// e.g. `sub-nyuMouse26_sample-0002_axonmyelin.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey {
    /// The participant identifier, e.g. `sub-nyuMouse26`.
    pub participant: String,
    /// The sample identifier, e.g. `sample-0002`.
    pub sample: String,
}

impl SampleKey {
    /// Extract the participant and sample identifiers from a file path.
    pub fn parse(path: &Path) -> ConversionResult<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"(sub-[A-Za-z0-9]+)_.*(sample-\d+)").unwrap());

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let captures =
            pattern
                .captures(name)
                .ok_or_else(|| ConversionError::UnrecognizedFileName {
                    path: path.to_path_buf(),
                })?;

        Ok(Self {
            participant: captures[1].to_string(),
            sample: captures[2].to_string(),
        })
    }
}

impl std::fmt::Display for SampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.participant, self.sample)
    }
}

/// One row of the `samples.tsv` manifest.
#[derive(Debug, Clone)]
pub struct SampleRow {
    /// The sample identifier column.
    pub sample_id: String,
    /// The participant identifier column.
    pub participant_id: String,
}

/// A discovered BIDS source tree.
///
/// Discovery is read-only and deterministic: subject lists are sorted
/// lexicographically and the manifest keeps its on-disk row order.
#[derive(Debug)]
pub struct BidsLayout {
    root: PathBuf,
    annotated_subjects: Vec<String>,
    unannotated_subjects: Vec<String>,
    samples: Vec<SampleRow>,
}

impl BidsLayout {
    /// Open a BIDS dataset root and discover its subjects and manifest.
    ///
    /// Annotated subjects (those with a directory under `derivatives/labels`)
    /// become training cases; subjects under `derivatives/ads-derivatives`
    /// have no annotations and become test cases. A source without any
    /// annotated subject is rejected.
    pub fn open(root: impl Into<PathBuf>) -> ConversionResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConversionError::MissingDirectory { path: root });
        }

        let labels_root = root.join("derivatives").join("labels");
        if !labels_root.is_dir() {
            return Err(ConversionError::MissingDirectory { path: labels_root });
        }

        let annotated_subjects = subject_directories(&labels_root)?;
        if annotated_subjects.is_empty() {
            return Err(ConversionError::EmptySource { path: root });
        }

        let ads_root = root.join("derivatives").join("ads-derivatives");
        let unannotated_subjects = if ads_root.is_dir() {
            subject_directories(&ads_root)?
        } else {
            Vec::new()
        };

        let samples = parse_samples_manifest(&root.join("samples.tsv"))?;

        info!(
            "Discovered {} annotated and {} unannotated subjects under {}",
            annotated_subjects.len(),
            unannotated_subjects.len(),
            root.display()
        );

        Ok(Self {
            root,
            annotated_subjects,
            unannotated_subjects,
            samples,
        })
    }

    /// The BIDS dataset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subjects with manual annotations, sorted lexicographically.
    pub fn annotated_subjects(&self) -> &[String] {
        &self.annotated_subjects
    }

    /// Subjects without annotations, sorted lexicographically.
    pub fn unannotated_subjects(&self) -> &[String] {
        &self.unannotated_subjects
    }

    /// The `samples.tsv` rows in on-disk order.
    pub fn samples(&self) -> &[SampleRow] {
        &self.samples
    }

    /// Sorted microscopy images of one subject (`<root>/<subject>/micr/*.png`).
    pub fn subject_images(&self, subject: &str) -> ConversionResult<Vec<PathBuf>> {
        let micr_dir = self.root.join(subject).join("micr");
        if !micr_dir.is_dir() {
            return Err(ConversionError::MissingDirectory { path: micr_dir });
        }
        png_files_sorted(&micr_dir)
    }

    /// The manual boundary annotation for one training sample.
    ///
    /// Annotations are named
    /// `<subject>_<sample>_axonmyelin_seg-touching*-manual.png`; when several
    /// revisions exist the lexicographically last one wins. A training sample
    /// without any matching annotation is a hard error.
    pub fn find_label(&self, key: &SampleKey) -> ConversionResult<PathBuf> {
        let label_dir = self
            .root
            .join("derivatives")
            .join("labels")
            .join(&key.participant)
            .join("micr");
        if !label_dir.is_dir() {
            return Err(ConversionError::MissingDirectory { path: label_dir });
        }

        let prefix = format!("{}_{}_axonmyelin_seg-touching", key.participant, key.sample);
        let mut revisions: Vec<PathBuf> = png_files_sorted(&label_dir)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with("-manual.png"))
            })
            .collect();

        revisions.pop().ok_or_else(|| ConversionError::MissingLabel {
            participant: key.participant.clone(),
            sample: key.sample.clone(),
        })
    }
}

/// Sorted `sub-*` directory names directly under `dir`.
fn subject_directories(dir: &Path) -> ConversionResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| ConversionError::io(dir, e))?;

    let mut subjects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConversionError::io(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with("sub-") {
                subjects.push(name.to_string());
            }
        }
    }

    subjects.sort();
    Ok(subjects)
}

/// Sorted `*.png` files directly under `dir`.
fn png_files_sorted(dir: &Path) -> ConversionResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ConversionError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConversionError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Parse `samples.tsv`: a header row followed by
/// `<sample_id>\t<participant_id>` rows.
fn parse_samples_manifest(path: &Path) -> ConversionResult<Vec<SampleRow>> {
    if !path.is_file() {
        return Err(ConversionError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|e| ConversionError::io(path, e))?;

    let mut rows = Vec::new();
    for (index, line) in contents.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut columns = line.split('\t');
        let (Some(sample_id), Some(participant_id)) = (columns.next(), columns.next()) else {
            return Err(ConversionError::MalformedManifest {
                path: path.to_path_buf(),
                line: index + 1,
                reason: "expected at least two tab-separated columns".to_string(),
            });
        };
        if sample_id.trim().is_empty() || participant_id.trim().is_empty() {
            return Err(ConversionError::MalformedManifest {
                path: path.to_path_buf(),
                line: index + 1,
                reason: "empty sample or participant column".to_string(),
            });
        }
        rows.push(SampleRow {
            sample_id: sample_id.trim().to_string(),
            participant_id: participant_id.trim().to_string(),
        });
    }

    Ok(rows)
}
