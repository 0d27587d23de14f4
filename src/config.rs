//! Study configuration: group and cohort assignments, the regions to adjust and the unit scale.

use serde::Deserialize;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IcvError, Result};

/// Name of the optional configuration file looked up in the study base directory.
pub const CONFIG_FILE_NAME: &str = "icv_study.toml";

/// Voxel volume in mm³ of the 0.352 x 0.352 x 0.7 mm acquisition.
pub const DEFAULT_VOXEL_SCALE: f64 = 0.352 * 0.352 * 0.7;

pub const DEFAULT_MASK: &str = "wholebrain";


/// Models the configuration of a longitudinal ICV adjustment study.
///
/// # Examples
///
/// ```
/// let config = icvadjust::StudyConfig::from_toml_str(r#"
///     voxel_scale = 1.0
///     [groups]
///     placebo = ["A", "B"]
///     [cohort_source]
///     "1" = ["A", "B"]
/// "#).unwrap();
/// assert_eq!(Some("placebo"), config.group_of("A"));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    /// Treatment group name to subject IDs.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Source cohort label to subject IDs.
    pub cohort_source: BTreeMap<String, Vec<String>>,
    /// Regions to adjust. Empty means every region found in the volume tables.
    pub regions: BTreeSet<String>,
    /// Multiplier converting adjusted voxel counts to physical volume.
    pub voxel_scale: f64,
    /// Label of the tissue mask, part of the tissue statistics file names.
    pub mask: String,
    /// Script run when the SST affine of a subject is missing. Called as `script SUBJECT MAX_TIMEPOINT BASE_DIR`.
    pub registration_script: Option<PathBuf>,
}

impl Default for StudyConfig {
    fn default() -> StudyConfig {
        StudyConfig {
            groups: BTreeMap::new(),
            cohort_source: BTreeMap::new(),
            regions: BTreeSet::new(),
            voxel_scale: DEFAULT_VOXEL_SCALE,
            mask: String::from(DEFAULT_MASK),
            registration_script: None,
        }
    }
}

impl StudyConfig {

    /// Read and validate a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<StudyConfig> {
        let content = fs::read_to_string(path)?;
        StudyConfig::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<StudyConfig> {
        let config: StudyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<base_dir>/icv_study.toml` if it exists, the defaults otherwise.
    pub fn for_study_dir<P: AsRef<Path>>(base_dir: P) -> Result<StudyConfig> {
        let path = base_dir.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::info!(config = %path.display(), "loading study configuration");
            StudyConfig::from_file(&path)
        } else {
            tracing::info!("no {} in study directory, using default configuration", CONFIG_FILE_NAME);
            Ok(StudyConfig::default())
        }
    }

    /// Check that every subject is in at most one group and one source, and that the scale is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.voxel_scale.is_finite() || self.voxel_scale <= 0.0 {
            return Err(IcvError::InvalidConfig(format!("voxel_scale must be positive, got {}", self.voxel_scale)));
        }
        check_unique_membership("group", &self.groups)?;
        check_unique_membership("cohort source", &self.cohort_source)?;
        Ok(())
    }

    pub fn group_of(&self, subject: &str) -> Option<&str> {
        membership(&self.groups, subject)
    }

    pub fn source_of(&self, subject: &str) -> Option<&str> {
        membership(&self.cohort_source, subject)
    }

    /// All subjects assigned to a group, sorted.
    pub fn cohort(&self) -> BTreeSet<String> {
        self.groups.values().flatten().cloned().collect()
    }

    /// Whether the region is selected for adjustment.
    pub fn includes_region(&self, region: &str) -> bool {
        self.regions.is_empty() || self.regions.contains(region)
    }
}


fn membership<'a>(assignment: &'a BTreeMap<String, Vec<String>>, subject: &str) -> Option<&'a str> {
    assignment
        .iter()
        .find(|(_, subjects)| subjects.iter().any(|s| s == subject))
        .map(|(label, _)| label.as_str())
}


fn check_unique_membership(kind: &str, assignment: &BTreeMap<String, Vec<String>>) -> Result<()> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (label, subjects) in assignment.iter() {
        for subject in subjects.iter() {
            if let Some(previous) = seen.insert(subject.as_str(), label.as_str()) {
                return Err(IcvError::InvalidConfig(format!(
                    "subject {} is assigned to {} '{}' and '{}'",
                    subject, kind, previous, label
                )));
            }
        }
    }
    Ok(())
}
