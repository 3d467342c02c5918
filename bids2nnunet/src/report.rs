//! Read-only diagnostics over a converted dataset.
//!
//! `DatasetReport::scan` walks a converted dataset directory, recounts its
//! cases, and records every naming irregularity it finds. The rendered
//! report shows the directory tree followed by the counts and findings, for
//! manual verification after a conversion run. Nothing here mutates the
//! dataset.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::descriptor::DatasetDescriptor;
use crate::error::{ConversionError, ConversionResult};

const CASE_FOLDERS: [&str; 3] = ["imagesTr", "labelsTr", "imagesTs"];

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)_(\d+)_0000\.png$").unwrap())
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)_(\d+)\.png$").unwrap())
}

/// Findings from scanning one converted dataset directory.
#[derive(Debug)]
pub struct DatasetReport {
    dataset_dir: PathBuf,
    descriptor: Option<DatasetDescriptor>,
    num_training_images: usize,
    num_training_labels: usize,
    num_test_images: usize,
    irregularities: Vec<String>,
    tree: String,
}

impl DatasetReport {
    /// Scan a converted dataset directory.
    pub fn scan(dataset_dir: &Path) -> ConversionResult<Self> {
        if !dataset_dir.is_dir() {
            return Err(ConversionError::MissingDirectory {
                path: dataset_dir.to_path_buf(),
            });
        }

        let mut irregularities = Vec::new();

        let descriptor = match DatasetDescriptor::load(&dataset_dir.join(DatasetDescriptor::FILE_NAME))
        {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                irregularities.push(format!("dataset.json is missing or unreadable: {err}"));
                None
            }
        };

        let mut prefixes = BTreeSet::new();
        let training_ids = scan_folder(
            dataset_dir,
            "imagesTr",
            image_pattern(),
            &mut prefixes,
            &mut irregularities,
        )?;
        let label_ids = scan_folder(
            dataset_dir,
            "labelsTr",
            label_pattern(),
            &mut prefixes,
            &mut irregularities,
        )?;
        let test_ids = scan_folder(
            dataset_dir,
            "imagesTs",
            image_pattern(),
            &mut prefixes,
            &mut irregularities,
        )?;

        for id in &label_ids {
            if !training_ids.contains(id) {
                irregularities.push(format!("orphaned label for case {id:03} has no image"));
            }
        }
        for id in &training_ids {
            if !label_ids.contains(id) {
                irregularities.push(format!("training image for case {id:03} has no label"));
            }
        }

        let all_ids: BTreeSet<u32> = training_ids.union(&test_ids).copied().collect();
        let contiguous = all_ids
            .iter()
            .enumerate()
            .all(|(index, id)| index as u32 == *id);
        if !all_ids.is_empty() && !contiguous {
            irregularities.push(format!(
                "case ids are not contiguous from 000 (found {} ids up to {:03})",
                all_ids.len(),
                all_ids.iter().max().unwrap()
            ));
        }

        if prefixes.len() > 1 {
            irregularities.push(format!(
                "inconsistent dataset name prefixes: {}",
                prefixes.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }

        if let Some(descriptor) = &descriptor {
            if let Some(prefix) = prefixes.iter().next() {
                if prefixes.len() == 1 && prefix != &descriptor.name {
                    irregularities.push(format!(
                        "file name prefix '{prefix}' does not match descriptor name '{}'",
                        descriptor.name
                    ));
                }
            }
            for (folder, declared, actual) in [
                ("imagesTr", descriptor.num_training, training_ids.len()),
                ("labelsTr", descriptor.num_training, label_ids.len()),
                ("imagesTs", descriptor.num_test, test_ids.len()),
            ] {
                if declared != actual {
                    irregularities.push(format!(
                        "{folder} holds {actual} cases but the descriptor declares {declared}"
                    ));
                }
            }
        }

        find_stray_files(dataset_dir, &mut irregularities)?;

        let mut tree = format!(
            "{}\n",
            dataset_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| dataset_dir.display().to_string())
        );
        render_tree(dataset_dir, "", &mut tree)?;

        Ok(Self {
            dataset_dir: dataset_dir.to_path_buf(),
            descriptor,
            num_training_images: training_ids.len(),
            num_training_labels: label_ids.len(),
            num_test_images: test_ids.len(),
            irregularities,
            tree,
        })
    }

    /// The scanned dataset directory.
    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// The descriptor, when one could be read.
    pub fn descriptor(&self) -> Option<&DatasetDescriptor> {
        self.descriptor.as_ref()
    }

    /// Number of training images found on disk.
    pub fn num_training_images(&self) -> usize {
        self.num_training_images
    }

    /// Number of training labels found on disk.
    pub fn num_training_labels(&self) -> usize {
        self.num_training_labels
    }

    /// Number of test images found on disk.
    pub fn num_test_images(&self) -> usize {
        self.num_test_images
    }

    /// Every irregularity found during the scan.
    pub fn irregularities(&self) -> &[String] {
        &self.irregularities
    }

    /// Whether the scan found no irregularities.
    pub fn is_clean(&self) -> bool {
        self.irregularities.is_empty()
    }
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)?;
        writeln!(f)?;
        writeln!(
            f,
            "{} training images, {} training labels, {} test images",
            self.num_training_images, self.num_training_labels, self.num_test_images
        )?;
        if let Some(descriptor) = &self.descriptor {
            writeln!(
                f,
                "Descriptor '{}': {} training, {} test cases declared",
                descriptor.name, descriptor.num_training, descriptor.num_test
            )?;
        }
        if self.irregularities.is_empty() {
            writeln!(f, "No irregularities detected.")?;
        } else {
            writeln!(f, "Irregularities:")?;
            for finding in &self.irregularities {
                writeln!(f, "  - {finding}")?;
            }
        }
        Ok(())
    }
}

/// Collect the case ids of one folder, recording files that do not follow
/// the expected naming pattern.
fn scan_folder(
    dataset_dir: &Path,
    folder: &str,
    pattern: &Regex,
    prefixes: &mut BTreeSet<String>,
    irregularities: &mut Vec<String>,
) -> ConversionResult<BTreeSet<u32>> {
    let dir = dataset_dir.join(folder);
    let mut ids = BTreeSet::new();
    if !dir.is_dir() {
        irregularities.push(format!("{folder} directory is missing"));
        return Ok(ids);
    }

    let entries = fs::read_dir(&dir).map_err(|e| ConversionError::io(&dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConversionError::io(&dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match pattern.captures(&name) {
            Some(captures) => {
                prefixes.insert(captures[1].to_string());
                // Digits only by construction of the pattern.
                if let Ok(id) = captures[2].parse::<u32>() {
                    ids.insert(id);
                }
            }
            None => irregularities.push(format!("{folder}/{name} does not match the naming pattern")),
        }
    }
    Ok(ids)
}

/// Flag files that live outside the three case folders and `dataset.json`.
fn find_stray_files(dataset_dir: &Path, irregularities: &mut Vec<String>) -> ConversionResult<()> {
    for entry in WalkDir::new(dataset_dir).min_depth(1) {
        let entry = entry.map_err(|e| ConversionError::io(dataset_dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dataset_dir)
            .expect("walked path is under the dataset directory");

        let expected = match relative.components().count() {
            1 => relative == Path::new(DatasetDescriptor::FILE_NAME),
            2 => CASE_FOLDERS
                .iter()
                .any(|folder| relative.starts_with(folder)),
            _ => false,
        };
        if !expected {
            irregularities.push(format!("unexpected file: {}", relative.display()));
        }
    }
    Ok(())
}

/// Render a directory tree with `├──`/`└──` connectors, entries sorted by
/// name.
fn render_tree(dir: &Path, prefix: &str, out: &mut String) -> ConversionResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| ConversionError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConversionError::io(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();

    let count = paths.len();
    for (index, path) in paths.iter().enumerate() {
        let last = index + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&name);
        out.push('\n');

        if path.is_dir() {
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            render_tree(path, &child_prefix, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bids::BidsLayout;
    use crate::convert::{ConvertOptions, Converter};
    use crate::fixtures;

    fn converted_dataset(target: &Path) -> PathBuf {
        let source = fixtures::bids_source(&["sub-nyuMouse26", "sub-nyuMouse27"], &["sub-nyuMouse30"]);
        let layout = BidsLayout::open(source.path()).unwrap();
        Converter::new(&layout, ConvertOptions::default())
            .run(target)
            .unwrap()
            .dataset_dir
    }

    #[test]
    fn freshly_converted_dataset_is_clean() {
        let target = tempfile::tempdir().unwrap();
        let dataset_dir = converted_dataset(target.path());

        let report = DatasetReport::scan(&dataset_dir).unwrap();
        assert!(report.is_clean(), "unexpected findings: {:?}", report.irregularities());
        assert_eq!(report.num_training_images(), 4);
        assert_eq!(report.num_training_labels(), 4);
        assert_eq!(report.num_test_images(), 2);

        // The report and the descriptor agree on the case counts.
        let descriptor = report.descriptor().unwrap();
        assert_eq!(descriptor.num_training, report.num_training_images());
        assert_eq!(descriptor.num_test, report.num_test_images());
    }

    #[test]
    fn detects_missing_label_and_count_mismatch() {
        let target = tempfile::tempdir().unwrap();
        let dataset_dir = converted_dataset(target.path());
        fs::remove_file(dataset_dir.join("labelsTr").join("MyelinBoundarySegmentation_002.png"))
            .unwrap();

        let report = DatasetReport::scan(&dataset_dir).unwrap();
        assert!(!report.is_clean());
        assert!(report
            .irregularities()
            .iter()
            .any(|finding| finding.contains("case 002 has no label")));
        assert!(report
            .irregularities()
            .iter()
            .any(|finding| finding.contains("descriptor declares")));
    }

    #[test]
    fn detects_orphaned_label() {
        let target = tempfile::tempdir().unwrap();
        let dataset_dir = converted_dataset(target.path());
        fixtures::write_mask(&dataset_dir.join("labelsTr").join("MyelinBoundarySegmentation_099.png"));

        let report = DatasetReport::scan(&dataset_dir).unwrap();
        assert!(report
            .irregularities()
            .iter()
            .any(|finding| finding.contains("orphaned label for case 099")));
    }

    #[test]
    fn detects_nonconforming_and_stray_files() {
        let target = tempfile::tempdir().unwrap();
        let dataset_dir = converted_dataset(target.path());
        fs::write(dataset_dir.join("imagesTr").join("notes.txt"), b"scratch").unwrap();
        fs::write(dataset_dir.join("README"), b"stray").unwrap();

        let report = DatasetReport::scan(&dataset_dir).unwrap();
        assert!(report
            .irregularities()
            .iter()
            .any(|finding| finding.contains("imagesTr/notes.txt")));
        assert!(report
            .irregularities()
            .iter()
            .any(|finding| finding.contains("unexpected file: README")));
    }

    #[test]
    fn renders_directory_tree_with_connectors() {
        let target = tempfile::tempdir().unwrap();
        let dataset_dir = converted_dataset(target.path());

        let report = DatasetReport::scan(&dataset_dir).unwrap();
        let rendered = report.to_string();
        assert!(rendered.contains("├── "));
        assert!(rendered.contains("└── "));
        assert!(rendered.contains("imagesTr"));
        assert!(rendered.contains("labelsTr"));
        assert!(rendered.contains("dataset.json"));
    }

    #[test]
    fn missing_dataset_directory_is_an_error() {
        let err = DatasetReport::scan(Path::new("/nonexistent/dataset")).unwrap_err();
        assert!(matches!(err, ConversionError::MissingDirectory { .. }));
    }
}
