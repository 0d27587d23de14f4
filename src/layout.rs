//! File naming conventions of a longitudinal cortical thickness (longCT) study directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IcvError, Result};
use crate::util::SUBJECT_PREFIX;

pub const SST_DIR: &str = "aCT_SingleSubjectTemplate";
pub const SST_AFFINE_FILE: &str = "T_template0_toUCItemplate_AffineOnly0GenericAffine.mat";
pub const RAW_VOLUMES_FILE: &str = "JohnsonGyrusAtlas_volumes.csv";
pub const SST_DETERMINANT_FILE: &str = "SST-to-UCItemplate-affinemat-determinant.csv";
pub const TIMEPOINT_DETERMINANT_FILE: &str = "Timepoints-to-UCItemplate-affinemat-determinant.csv";
pub const ADJUSTED_VOLUMES_FILE: &str = "JohnsonGyrusAtlas_volumes_ICVadjusted_mm3.csv";
pub const PROCESSED_DIR: &str = "processed";


/// Paths of all inputs and outputs of a study rooted at `base_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyLayout {
    pub base_dir: PathBuf,
    pub mask: String,
}

impl StudyLayout {

    /// Create the layout for an existing study directory.
    pub fn new<P: AsRef<Path>>(base_dir: P, mask: &str) -> Result<StudyLayout> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(IcvError::MissingStudyDirectory(base_dir.to_path_buf()));
        }
        Ok(StudyLayout { base_dir: base_dir.to_path_buf(), mask: String::from(mask) })
    }

    /// The subject directory names (e.g. `sub-2001374`), sorted lexicographically.
    pub fn subjects(&self) -> Result<Vec<String>> {
        let mut subjects = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(SUBJECT_PREFIX) && entry.path().is_dir() {
                subjects.push(name);
            }
        }
        subjects.sort();
        Ok(subjects)
    }

    pub fn sst_affine(&self, subject: &str) -> PathBuf {
        self.base_dir.join(subject).join(SST_DIR).join(SST_AFFINE_FILE)
    }

    /// The directory of one timepoint of a subject, `<subject>_ses-T<n>_T1w_RIP_*`.
    ///
    /// If several directories match, the first in sorted order is used.
    pub fn timepoint_dir(&self, subject: &str, timepoint: u32) -> Result<PathBuf> {
        let subject_dir = self.base_dir.join(subject);
        let prefix = format!("{}_ses-T{}_T1w_RIP_", subject, timepoint);
        if !subject_dir.is_dir() {
            return Err(IcvError::MissingInput(subject_dir.join(format!("{}*", prefix))));
        }
        let mut matches: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&subject_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        matches
            .into_iter()
            .next()
            .ok_or_else(|| IcvError::MissingInput(subject_dir.join(format!("{}*", prefix))))
    }

    pub fn timepoint_affine(&self, subject: &str, timepoint: u32) -> Result<PathBuf> {
        let dir = self.timepoint_dir(subject, timepoint)?;
        Ok(dir.join(format!("{}_ses-T{}_T1wtoUCItemplate_AffineOnly0GenericAffine.mat", subject, timepoint)))
    }

    pub fn tissue_stats(&self, timepoint: u32) -> PathBuf {
        self.base_dir.join(format!("3dROIstats_T{}_CSF-GM-WM-dGM_{}.txt", timepoint, self.mask))
    }

    pub fn raw_volumes(&self) -> PathBuf {
        self.base_dir.join(RAW_VOLUMES_FILE)
    }

    pub fn sst_determinants(&self) -> PathBuf {
        self.base_dir.join(SST_DETERMINANT_FILE)
    }

    pub fn timepoint_determinants(&self) -> PathBuf {
        self.base_dir.join(TIMEPOINT_DETERMINANT_FILE)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.base_dir.join(PROCESSED_DIR)
    }

    pub fn raw_segmentations(&self) -> PathBuf {
        self.processed_dir().join(format!("JohnsonBrainSegmentations_raw_{}.csv", self.mask))
    }

    pub fn adjusted_volumes(&self) -> PathBuf {
        self.processed_dir().join(ADJUSTED_VOLUMES_FILE)
    }

    pub fn regression_diagnostics(&self) -> PathBuf {
        self.processed_dir().join(format!("ICV_regression_diagnostics_{}.csv", self.mask))
    }
}
