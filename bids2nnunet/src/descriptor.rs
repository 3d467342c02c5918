//! The nnUNetv2 `dataset.json` descriptor.
//!
//! The schema is dictated entirely by nnUNetv2: channel names, the
//! label-value mapping, case counts and the file ending must all match what
//! the framework's preprocessing step expects.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult};

/// Metadata descriptor written to the root of a converted dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset name, also the prefix of every case file name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Semantic label name → integer label value.
    pub labels: BTreeMap<String, u32>,
    /// Channel index (as a string, per the nnUNetv2 schema) → channel name.
    pub channel_names: BTreeMap<String, String>,
    /// Number of training cases.
    #[serde(rename = "numTraining")]
    pub num_training: usize,
    /// Number of test cases.
    #[serde(rename = "numTest")]
    pub num_test: usize,
    /// File extension of every image and label file.
    pub file_ending: String,
}

impl DatasetDescriptor {
    /// File name of the descriptor inside the dataset directory.
    pub const FILE_NAME: &'static str = "dataset.json";

    /// Build the myelin boundary segmentation descriptor: a single grayscale
    /// channel rescaled to [0, 1], background 0 and boundary 1.
    pub fn new(name: &str, description: &str, num_training: usize, num_test: usize) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("background".to_string(), 0);
        labels.insert("boundary".to_string(), 1);

        let mut channel_names = BTreeMap::new();
        channel_names.insert("0".to_string(), "rescale_to_0_1".to_string());

        Self {
            name: name.to_string(),
            description: description.to_string(),
            labels,
            channel_names,
            num_training,
            num_test,
            file_ending: ".png".to_string(),
        }
    }

    /// Write the descriptor as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> ConversionResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").map_err(|e| ConversionError::io(path, e))
    }

    /// Read a descriptor back from disk.
    pub fn load(path: &Path) -> ConversionResult<Self> {
        if !path.is_file() {
            return Err(ConversionError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path).map_err(|e| ConversionError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Recount the dataset directory and fail when the declared counts
    /// disagree with the files actually on disk. nnUNetv2's own integrity
    /// check is the final authority, but a descriptor must never knowingly
    /// declare counts that are already wrong.
    pub fn verify(&self, dataset_dir: &Path) -> ConversionResult<()> {
        for (folder, expected) in [
            ("imagesTr", self.num_training),
            ("labelsTr", self.num_training),
            ("imagesTs", self.num_test),
        ] {
            let actual = count_pngs(&dataset_dir.join(folder))?;
            if actual != expected {
                return Err(ConversionError::CountMismatch {
                    folder: folder.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

fn count_pngs(dir: &Path) -> ConversionResult<usize> {
    if !dir.is_dir() {
        return Err(ConversionError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|e| ConversionError::io(dir, e))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ConversionError::io(dir, e))?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DatasetDescriptor::FILE_NAME);

        let descriptor = DatasetDescriptor::new("Myelin", "test dataset", 4, 2);
        descriptor.save(&path).unwrap();
        let loaded = DatasetDescriptor::load(&path).unwrap();

        assert_eq!(loaded.name, "Myelin");
        assert_eq!(loaded.num_training, 4);
        assert_eq!(loaded.num_test, 2);
        assert_eq!(loaded.labels["boundary"], 1);
        assert_eq!(loaded.channel_names["0"], "rescale_to_0_1");
        assert_eq!(loaded.file_ending, ".png");
    }

    #[test]
    fn serialized_field_names_match_the_nnunet_schema() {
        let descriptor = DatasetDescriptor::new("Myelin", "test dataset", 1, 0);
        let json = serde_json::to_value(&descriptor).unwrap();

        assert!(json.get("numTraining").is_some());
        assert!(json.get("numTest").is_some());
        assert!(json.get("channel_names").is_some());
        assert!(json.get("file_ending").is_some());
    }

    #[test]
    fn verify_detects_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        for subdir in ["imagesTr", "labelsTr", "imagesTs"] {
            std::fs::create_dir_all(dir.path().join(subdir)).unwrap();
        }
        fixtures::write_image(&dir.path().join("imagesTr").join("Myelin_000_0000.png"));
        fixtures::write_mask(&dir.path().join("labelsTr").join("Myelin_000.png"));

        let descriptor = DatasetDescriptor::new("Myelin", "test dataset", 1, 0);
        descriptor.verify(dir.path()).unwrap();

        let wrong = DatasetDescriptor::new("Myelin", "test dataset", 2, 0);
        let err = wrong.verify(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::CountMismatch { expected: 2, actual: 1, .. }
        ));
    }
}
