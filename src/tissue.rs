//! Functions for reading per-timepoint tissue class statistics written by AFNI's 3dROIstats.
//!
//! Each line holds the path of the segmented image followed by the CSF, gray matter, white
//! matter and deep gray matter volumes of that image.

use csv::WriterBuilder;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::error::{IcvError, Result};
use crate::util::{format_optional_f64, strip_subject_prefix, SUBJECT_PREFIX};
use crate::volumes::{region_column, VolumeTable};

pub const CSF_REGION: &str = "CSF";
pub const GM_REGION: &str = "GM";
pub const WM_REGION: &str = "WM";
pub const DGM_REGION: &str = "dGM";
/// Whole brain volume, GM + WM + dGM.
pub const BRAIN_REGION: &str = "GM+WM+dGM";

pub const TISSUE_REGIONS: [&str; 5] = [CSF_REGION, GM_REGION, WM_REGION, DGM_REGION, BRAIN_REGION];


/// Tissue class volumes of one subject at one timepoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueVolumes {
    pub csf: f64,
    pub gm: f64,
    pub wm: f64,
    pub dgm: f64,
}

impl TissueVolumes {
    /// The whole brain volume: gray matter, white matter and deep gray matter.
    pub fn brain(&self) -> f64 {
        self.gm + self.wm + self.dgm
    }

    fn by_region(&self) -> [(&'static str, f64); 5] {
        [
            (CSF_REGION, self.csf),
            (GM_REGION, self.gm),
            (WM_REGION, self.wm),
            (DGM_REGION, self.dgm),
            (BRAIN_REGION, self.brain()),
        ]
    }
}


/// Tissue volumes of all subjects of one timepoint, keyed by subject ID without the `sub-` prefix.
pub type TissueTable = BTreeMap<String, TissueVolumes>;


/// Extract the subject ID from the image path: the first path component starting with `sub-`.
pub fn subject_from_path(path: &str) -> Option<&str> {
    path.split('/')
        .find(|component| component.starts_with(SUBJECT_PREFIX))
        .map(strip_subject_prefix)
}


/// Read a 3dROIstats tissue statistics file.
pub fn read_tissue_stats<P: AsRef<Path>>(path: P) -> Result<TissueTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IcvError::MissingInput(path.to_path_buf()));
    }
    tissue_stats_from_reader(File::open(path)?, path)
}


pub fn tissue_stats_from_reader<R: Read>(input: R, path: &Path) -> Result<TissueTable> {
    let malformed = |line_no: usize, reason: String| {
        IcvError::MalformedTable(path.to_path_buf(), format!("line {}: {}", line_no, reason))
    };

    let mut table = TissueTable::new();
    for (idx, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 5 {
            return Err(malformed(idx + 1, format!("expected 5 fields, found {}", fields.len())));
        }
        let subject = subject_from_path(fields[0])
            .ok_or_else(|| malformed(idx + 1, format!("no subject in '{}'", fields[0])))?;

        let mut values = [0f64; 4];
        for (value, field) in values.iter_mut().zip(fields[1..5].iter()) {
            *value = field
                .parse()
                .map_err(|err| malformed(idx + 1, format!("'{}': {}", field, err)))?;
        }
        table.insert(
            subject.to_string(),
            TissueVolumes { csf: values[0], gm: values[1], wm: values[2], dgm: values[3] },
        );
    }
    Ok(table)
}


/// Convert the tissue volumes of one timepoint into volume table cells, including the whole brain volume.
pub fn tissue_volume_table(timepoint: u32, tissue: &TissueTable) -> VolumeTable {
    let mut table = VolumeTable::new();
    for (subject, volumes) in tissue.iter() {
        for (region, value) in volumes.by_region().iter() {
            table.insert(subject, timepoint, region, Some(*value));
        }
    }
    table
}


/// Write the raw segmentation volumes of all timepoints: `Dog#`, then `T<n>_<tissue>` per timepoint.
pub fn write_segmentations_csv<W: Write>(tissue: &BTreeMap<u32, TissueTable>, output: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(output);

    let mut header = vec![String::from(crate::icv::SUBJECT_COLUMN)];
    for timepoint in tissue.keys() {
        header.extend(TISSUE_REGIONS.iter().map(|region| region_column(*timepoint, region)));
    }
    writer.write_record(&header)?;

    let subjects: std::collections::BTreeSet<&String> = tissue.values().flat_map(|t| t.keys()).collect();
    for subject in subjects {
        let mut row = vec![subject.clone()];
        for table in tissue.values() {
            match table.get(subject) {
                Some(volumes) => row.extend(volumes.by_region().iter().map(|(_, v)| v.to_string())),
                None => row.extend(TISSUE_REGIONS.iter().map(|_| format_optional_f64(None))),
            }
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
