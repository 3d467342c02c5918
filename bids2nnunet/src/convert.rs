//! BIDS → nnUNetv2 format conversion.
//!
//! The converter assigns sequential numeric case ids to discovered samples,
//! copies images into the `imagesTr`/`labelsTr`/`imagesTs` layout expected by
//! nnUNetv2, remaps manual masks from the on-disk 0/255 convention to the
//! 0/1 label values the framework trains on, and records the metadata the
//! framework's preprocessing step requires.
//!
//! All planning happens before the first file is written: a source with a
//! missing annotation aborts without leaving partial state behind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::bids::{BidsLayout, SampleKey};
use crate::descriptor::DatasetDescriptor;
use crate::error::{ConversionError, ConversionResult};

/// Zero-padded numeric case identifier assigned during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseId(pub u32);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Ordered assignment of sample keys to case ids.
///
/// Training ids are assigned first, in `samples.tsv` row order restricted to
/// annotated subjects; test ids continue the sequence for unannotated
/// subjects. Row order is the determinism anchor: converting the same source
/// twice yields identical assignments.
#[derive(Debug)]
pub struct CaseMap {
    training: Vec<(SampleKey, CaseId)>,
    test: Vec<(SampleKey, CaseId)>,
    index: HashMap<SampleKey, CaseId>,
}

impl CaseMap {
    /// Build the case assignment from a discovered layout.
    pub fn build(layout: &BidsLayout) -> Self {
        let annotated: HashSet<&str> = layout
            .annotated_subjects()
            .iter()
            .map(String::as_str)
            .collect();
        let unannotated: HashSet<&str> = layout
            .unannotated_subjects()
            .iter()
            .map(String::as_str)
            .collect();

        let mut training = Vec::new();
        let mut test = Vec::new();
        let mut index = HashMap::new();
        let mut next_id = 0;

        for (subjects, is_training) in [(&annotated, true), (&unannotated, false)] {
            for row in layout.samples() {
                if !subjects.contains(row.participant_id.as_str()) {
                    continue;
                }
                let key = SampleKey {
                    participant: row.participant_id.clone(),
                    sample: row.sample_id.clone(),
                };
                if index.contains_key(&key) {
                    continue;
                }
                let id = CaseId(next_id);
                next_id += 1;
                index.insert(key.clone(), id);
                if is_training {
                    training.push((key, id));
                } else {
                    test.push((key, id));
                }
            }
        }

        Self {
            training,
            test,
            index,
        }
    }

    /// The case id assigned to a sample, if any.
    pub fn get(&self, key: &SampleKey) -> Option<CaseId> {
        self.index.get(key).copied()
    }

    /// Training assignments in id order.
    pub fn training(&self) -> &[(SampleKey, CaseId)] {
        &self.training
    }

    /// Test assignments in id order.
    pub fn test(&self) -> &[(SampleKey, CaseId)] {
        &self.test
    }

    /// Number of training cases.
    pub fn num_training(&self) -> usize {
        self.training.len()
    }

    /// Number of test cases.
    pub fn num_test(&self) -> usize {
        self.test.len()
    }

    /// Save the full subject-to-case mapping as JSON, so the original BIDS
    /// identity of every case can be recovered later.
    pub fn save(&self, path: &Path) -> ConversionResult<()> {
        let mapping: BTreeMap<String, u32> = self
            .training
            .iter()
            .chain(&self.test)
            .map(|(key, id)| (key.to_string(), id.0))
            .collect();
        let json = serde_json::to_string_pretty(&mapping)?;
        fs::write(path, json + "\n").map_err(|e| ConversionError::io(path, e))
    }
}

/// Options controlling a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Dataset name used in file names and the descriptor.
    pub dataset_name: String,
    /// Free-form dataset description recorded in the descriptor.
    pub description: String,
    /// Numeric nnUNetv2 dataset id (folder `Dataset<id>_<name>`).
    pub dataset_id: u32,
    /// Replace an already populated destination instead of refusing.
    pub overwrite: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            dataset_name: "MyelinBoundarySegmentation".to_string(),
            description: "Myelin boundary segmentation dataset for nnUNetv2".to_string(),
            dataset_id: 1,
            overwrite: false,
        }
    }
}

/// Outcome of a successful conversion run.
#[derive(Debug)]
pub struct ConversionSummary {
    /// The populated `Dataset<id>_<name>` directory.
    pub dataset_dir: PathBuf,
    /// Number of training image/label pairs written.
    pub num_training: usize,
    /// Number of test images written.
    pub num_test: usize,
}

/// One fully resolved training case, ready to be written.
struct TrainingCase {
    case_id: CaseId,
    image: PathBuf,
    label: PathBuf,
}

/// One fully resolved test case.
struct TestCase {
    case_id: CaseId,
    image: PathBuf,
}

/// The BIDS → nnUNetv2 converter.
///
/// Source files are copied, never moved; the source tree is not mutated.
pub struct Converter<'a> {
    layout: &'a BidsLayout,
    options: ConvertOptions,
}

impl<'a> Converter<'a> {
    pub fn new(layout: &'a BidsLayout, options: ConvertOptions) -> Self {
        Self { layout, options }
    }

    /// Convert the source layout into `<target>/nnUNet_raw/Dataset<id>_<name>`.
    pub fn run(&self, target_dir: &Path) -> ConversionResult<ConversionSummary> {
        let case_map = CaseMap::build(self.layout);
        if case_map.num_training() == 0 {
            return Err(ConversionError::EmptySource {
                path: self.layout.root().to_path_buf(),
            });
        }

        // Resolve every source file up front so a missing annotation aborts
        // before anything is written.
        let training_cases = self.plan_training_cases(&case_map)?;
        let test_cases = self.plan_test_cases(&case_map)?;

        let dataset_dir = target_dir.join("nnUNet_raw").join(format!(
            "Dataset{:03}_{}",
            self.options.dataset_id, self.options.dataset_name
        ));
        self.prepare_destination(&dataset_dir)?;

        for case in &training_cases {
            let image_dest = dataset_dir
                .join("imagesTr")
                .join(self.image_file_name(case.case_id));
            copy_file(&case.image, &image_dest)?;

            let label_dest = dataset_dir
                .join("labelsTr")
                .join(self.label_file_name(case.case_id));
            write_label(&case.label, &label_dest)?;
        }

        for case in &test_cases {
            let image_dest = dataset_dir
                .join("imagesTs")
                .join(self.image_file_name(case.case_id));
            copy_file(&case.image, &image_dest)?;
        }

        self.verify_output(&dataset_dir, &training_cases, &test_cases)?;

        // Metadata is written last so an interrupted run is detectably
        // incomplete.
        let descriptor = DatasetDescriptor::new(
            &self.options.dataset_name,
            &self.options.description,
            training_cases.len(),
            test_cases.len(),
        );
        descriptor.save(&dataset_dir.join(DatasetDescriptor::FILE_NAME))?;
        descriptor.verify(&dataset_dir)?;
        case_map.save(&target_dir.join("subject_to_case_identifier.json"))?;

        info!(
            "Converted {} training and {} test cases into {}",
            training_cases.len(),
            test_cases.len(),
            dataset_dir.display()
        );

        Ok(ConversionSummary {
            dataset_dir,
            num_training: training_cases.len(),
            num_test: test_cases.len(),
        })
    }

    fn image_file_name(&self, case_id: CaseId) -> String {
        format!("{}_{case_id}_0000.png", self.options.dataset_name)
    }

    fn label_file_name(&self, case_id: CaseId) -> String {
        format!("{}_{case_id}.png", self.options.dataset_name)
    }

    /// Pair every training image with its case id and manual annotation.
    fn plan_training_cases(&self, case_map: &CaseMap) -> ConversionResult<Vec<TrainingCase>> {
        let mut cases = Vec::with_capacity(case_map.num_training());
        for subject in self.layout.annotated_subjects() {
            for image in self.layout.subject_images(subject)? {
                let key = SampleKey::parse(&image)?;
                let case_id = case_map
                    .get(&key)
                    .ok_or_else(|| ConversionError::UnlistedSample {
                        participant: key.participant.clone(),
                        sample: key.sample.clone(),
                    })?;
                let label = self.layout.find_label(&key)?;
                cases.push(TrainingCase {
                    case_id,
                    image,
                    label,
                });
            }
        }
        Ok(cases)
    }

    fn plan_test_cases(&self, case_map: &CaseMap) -> ConversionResult<Vec<TestCase>> {
        let mut cases = Vec::with_capacity(case_map.num_test());
        for subject in self.layout.unannotated_subjects() {
            for image in self.layout.subject_images(subject)? {
                let key = SampleKey::parse(&image)?;
                let case_id = case_map
                    .get(&key)
                    .ok_or_else(|| ConversionError::UnlistedSample {
                        participant: key.participant.clone(),
                        sample: key.sample.clone(),
                    })?;
                cases.push(TestCase { case_id, image });
            }
        }
        Ok(cases)
    }

    /// Refuse a populated destination unless overwrite was requested, in
    /// which case the stale dataset directory is removed wholesale. Silent
    /// merging with leftovers is never allowed.
    fn prepare_destination(&self, dataset_dir: &Path) -> ConversionResult<()> {
        if dataset_dir.exists() {
            let mut entries =
                fs::read_dir(dataset_dir).map_err(|e| ConversionError::io(dataset_dir, e))?;
            if entries.next().is_some() {
                if !self.options.overwrite {
                    return Err(ConversionError::DestinationExists {
                        path: dataset_dir.to_path_buf(),
                    });
                }
                fs::remove_dir_all(dataset_dir)
                    .map_err(|e| ConversionError::io(dataset_dir, e))?;
            }
        }

        for subdir in ["imagesTr", "labelsTr", "imagesTs"] {
            let dir = dataset_dir.join(subdir);
            fs::create_dir_all(&dir).map_err(|e| ConversionError::io(dir, e))?;
        }
        Ok(())
    }

    /// Recount the destination and enforce the pairing invariant: every
    /// training case has exactly one image and one label, and no orphaned
    /// labels exist.
    fn verify_output(
        &self,
        dataset_dir: &Path,
        training: &[TrainingCase],
        test: &[TestCase],
    ) -> ConversionResult<()> {
        let expected_labels: HashSet<String> = training
            .iter()
            .map(|case| self.label_file_name(case.case_id))
            .collect();

        for case in training {
            let image = dataset_dir
                .join("imagesTr")
                .join(self.image_file_name(case.case_id));
            if !image.is_file() {
                return Err(ConversionError::MissingFile { path: image });
            }
            let label = dataset_dir
                .join("labelsTr")
                .join(self.label_file_name(case.case_id));
            if !label.is_file() {
                return Err(ConversionError::MissingFile { path: label });
            }
        }

        let labels_dir = dataset_dir.join("labelsTr");
        for entry in fs::read_dir(&labels_dir).map_err(|e| ConversionError::io(&labels_dir, e))? {
            let entry = entry.map_err(|e| ConversionError::io(&labels_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !expected_labels.contains(&name) {
                return Err(ConversionError::OrphanLabel { path: entry.path() });
            }
        }

        for (subdir, expected) in [
            ("imagesTr", training.len()),
            ("labelsTr", expected_labels.len()),
            ("imagesTs", test.len()),
        ] {
            let dir = dataset_dir.join(subdir);
            let actual = fs::read_dir(&dir)
                .map_err(|e| ConversionError::io(&dir, e))?
                .count();
            if actual != expected {
                return Err(ConversionError::CountMismatch {
                    folder: subdir.to_string(),
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }
}

fn copy_file(source: &Path, dest: &Path) -> ConversionResult<()> {
    fs::copy(source, dest)
        .map(|_| ())
        .map_err(|e| ConversionError::io(dest, e))
}

/// Decode a manual mask and remap the on-disk 0/255 values to the 0/1 label
/// values nnUNetv2 expects.
fn write_label(source: &Path, dest: &Path) -> ConversionResult<()> {
    let mut mask = image::open(source)?.into_luma8();
    for pixel in mask.pixels_mut() {
        pixel.0[0] /= 255;
    }
    mask.save(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn convert(source: &Path, target: &Path, overwrite: bool) -> ConversionResult<ConversionSummary> {
        let layout = BidsLayout::open(source).unwrap();
        let options = ConvertOptions {
            overwrite,
            ..ConvertOptions::default()
        };
        Converter::new(&layout, options).run(target)
    }

    #[test]
    fn converts_annotated_subjects_into_training_cases() {
        let source = fixtures::bids_source(&["sub-nyuMouse26", "sub-nyuMouse27"], &["sub-nyuMouse30"]);
        let target = tempfile::tempdir().unwrap();

        let summary = convert(source.path(), target.path(), false).unwrap();
        assert_eq!(summary.num_training, 4);
        assert_eq!(summary.num_test, 2);

        let dataset_dir = &summary.dataset_dir;
        for id in 0..4 {
            assert!(dataset_dir
                .join("imagesTr")
                .join(format!("MyelinBoundarySegmentation_{id:03}_0000.png"))
                .is_file());
            assert!(dataset_dir
                .join("labelsTr")
                .join(format!("MyelinBoundarySegmentation_{id:03}.png"))
                .is_file());
        }
        for id in 4..6 {
            assert!(dataset_dir
                .join("imagesTs")
                .join(format!("MyelinBoundarySegmentation_{id:03}_0000.png"))
                .is_file());
        }
        assert!(dataset_dir.join("dataset.json").is_file());
        assert!(target.path().join("subject_to_case_identifier.json").is_file());
    }

    #[test]
    fn labels_are_remapped_to_zero_and_one() {
        let source = fixtures::bids_source(&["sub-nyuMouse26"], &[]);
        let target = tempfile::tempdir().unwrap();

        let summary = convert(source.path(), target.path(), false).unwrap();
        let label = image::open(
            summary
                .dataset_dir
                .join("labelsTr")
                .join("MyelinBoundarySegmentation_000.png"),
        )
        .unwrap()
        .into_luma8();

        let max = label.pixels().map(|p| p.0[0]).max().unwrap();
        let min = label.pixels().map(|p| p.0[0]).min().unwrap();
        assert_eq!(max, 1);
        assert_eq!(min, 0);
    }

    #[test]
    fn conversion_is_deterministic() {
        let source = fixtures::bids_source(&["sub-nyuMouse26", "sub-nyuMouse27"], &["sub-nyuMouse30"]);
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        convert(source.path(), first.path(), false).unwrap();
        convert(source.path(), second.path(), false).unwrap();

        let map_a = std::fs::read(first.path().join("subject_to_case_identifier.json")).unwrap();
        let map_b = std::fs::read(second.path().join("subject_to_case_identifier.json")).unwrap();
        assert_eq!(map_a, map_b);

        let listing = |root: &Path| {
            let mut names: Vec<String> = walkdir::WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    e.path()
                        .strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            names.sort();
            names
        };
        assert_eq!(listing(first.path()), listing(second.path()));
    }

    #[test]
    fn missing_annotation_aborts_without_partial_state() {
        let source = fixtures::bids_source(&["sub-nyuMouse26"], &[]);
        let label_dir = source
            .path()
            .join("derivatives")
            .join("labels")
            .join("sub-nyuMouse26")
            .join("micr");
        std::fs::remove_file(
            label_dir.join("sub-nyuMouse26_sample-0001_axonmyelin_seg-touching1-manual.png"),
        )
        .unwrap();
        let target = tempfile::tempdir().unwrap();

        let err = convert(source.path(), target.path(), false).unwrap_err();
        assert!(matches!(err, ConversionError::MissingLabel { .. }));
        assert!(!target.path().join("nnUNet_raw").exists());
    }

    #[test]
    fn refuses_populated_destination_without_overwrite() {
        let source = fixtures::bids_source(&["sub-nyuMouse26"], &[]);
        let target = tempfile::tempdir().unwrap();

        convert(source.path(), target.path(), false).unwrap();
        let err = convert(source.path(), target.path(), false).unwrap_err();
        assert!(matches!(err, ConversionError::DestinationExists { .. }));
    }

    #[test]
    fn overwrite_replaces_stale_destination() {
        let source = fixtures::bids_source(&["sub-nyuMouse26"], &[]);
        let target = tempfile::tempdir().unwrap();

        let first = convert(source.path(), target.path(), false).unwrap();
        // Leave a file that would betray a silent merge.
        std::fs::write(first.dataset_dir.join("imagesTr").join("stale.png"), b"x").unwrap();

        let second = convert(source.path(), target.path(), true).unwrap();
        assert!(!second.dataset_dir.join("imagesTr").join("stale.png").exists());
        assert_eq!(second.num_training, 2);
    }

    #[test]
    fn image_for_unlisted_sample_is_rejected() {
        let source = fixtures::bids_source(&["sub-nyuMouse26"], &[]);
        fixtures::write_image(
            &source
                .path()
                .join("sub-nyuMouse26")
                .join("micr")
                .join("sub-nyuMouse26_sample-0099_axonmyelin.png"),
        );
        let target = tempfile::tempdir().unwrap();

        let err = convert(source.path(), target.path(), false).unwrap_err();
        assert!(matches!(err, ConversionError::UnlistedSample { .. }));
    }

    #[test]
    fn case_ids_follow_manifest_order() {
        let source = fixtures::bids_source(&["sub-nyuMouse26", "sub-nyuMouse27"], &[]);
        let layout = BidsLayout::open(source.path()).unwrap();
        let case_map = CaseMap::build(&layout);

        let first = &case_map.training()[0];
        assert_eq!(first.0.participant, "sub-nyuMouse26");
        assert_eq!(first.0.sample, "sample-0000");
        assert_eq!(first.1, CaseId(0));
        assert_eq!(case_map.training().last().unwrap().1, CaseId(3));
    }
}
