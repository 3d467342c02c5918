//! Miniature BIDS trees used by the unit tests.

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma};
use tempfile::TempDir;

/// Samples created for every fixture subject.
pub const SAMPLES_PER_SUBJECT: [&str; 2] = ["sample-0000", "sample-0001"];

/// Build a BIDS source tree with the given annotated and unannotated
/// subjects, two samples each, and a matching `samples.tsv`.
pub fn bids_source(annotated: &[&str], unannotated: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let mut manifest = String::from("sample_id\tparticipant_id\n");
    for subject in annotated.iter().chain(unannotated) {
        let micr_dir = root.join(subject).join("micr");
        fs::create_dir_all(&micr_dir).unwrap();
        for sample in SAMPLES_PER_SUBJECT {
            manifest.push_str(&format!("{sample}\t{subject}\n"));
            write_image(&micr_dir.join(format!("{subject}_{sample}_axonmyelin.png")));
        }
    }

    for subject in annotated {
        let label_dir = root
            .join("derivatives")
            .join("labels")
            .join(subject)
            .join("micr");
        fs::create_dir_all(&label_dir).unwrap();
        for sample in SAMPLES_PER_SUBJECT {
            write_mask(&label_dir.join(format!(
                "{subject}_{sample}_axonmyelin_seg-touching1-manual.png"
            )));
        }
    }

    for subject in unannotated {
        let ads_dir = root
            .join("derivatives")
            .join("ads-derivatives")
            .join(subject);
        fs::create_dir_all(&ads_dir).unwrap();
    }

    fs::write(root.join("samples.tsv"), manifest).unwrap();
    dir
}

/// Write a small grayscale image.
pub fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let image = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 16 + y) as u8]));
    image.save(path).unwrap();
}

/// Write a small binary mask in the on-disk 0/255 convention.
pub fn write_mask(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mask = GrayImage::from_fn(8, 8, |x, _| Luma([if x % 2 == 0 { 255 } else { 0 }]));
    mask.save(path).unwrap();
}
