//! Regional volume tables.
//!
//! On disk, raw volumes are a CSV with one row per subject and one `T<n>_<region>` column per
//! timepoint and region. In memory they are normalized into one cell per (subject, timepoint,
//! region), so column names are only ever built or parsed at the file boundary.

use csv::ReaderBuilder;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{IcvError, Result};
use crate::util::parse_optional_f64;

/// Raw volumes keyed by (subject, region, timepoint).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeTable {
    cells: BTreeMap<(String, String, u32), Option<f64>>,
}

impl VolumeTable {
    pub fn new() -> VolumeTable {
        VolumeTable::default()
    }

    pub fn insert(&mut self, subject: &str, timepoint: u32, region: &str, raw_volume: Option<f64>) {
        self.cells.insert((subject.to_string(), region.to_string(), timepoint), raw_volume);
    }

    /// The raw volume, `None` if the cell is absent or empty.
    pub fn get(&self, subject: &str, timepoint: u32, region: &str) -> Option<f64> {
        self.cells
            .get(&(subject.to_string(), region.to_string(), timepoint))
            .cloned()
            .flatten()
    }

    pub fn subjects(&self) -> BTreeSet<String> {
        self.cells.keys().map(|k| k.0.clone()).collect()
    }

    pub fn regions(&self) -> BTreeSet<String> {
        self.cells.keys().map(|k| k.1.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Add all cells of `other`. Cells present in both tables take the value from `other`.
    pub fn merge(&mut self, other: VolumeTable) {
        self.cells.extend(other.cells);
    }
}


/// Split a `T<n>_<region>` column name into timepoint and region.
///
/// # Examples
///
/// ```
/// use icvadjust::volumes::parse_region_column;
/// assert_eq!(Some((2, "Hippocampus_R")), parse_region_column("T2_Hippocampus_R"));
/// assert_eq!(None, parse_region_column("Group"));
/// ```
pub fn parse_region_column(column: &str) -> Option<(u32, &str)> {
    let rest = column.strip_prefix('T')?;
    let sep = rest.find('_')?;
    let (digits, region) = (&rest[..sep], &rest[sep + 1..]);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || region.is_empty() {
        return None;
    }
    Some((digits.parse().ok()?, region))
}


/// Format the column name of a timepoint and region.
pub fn region_column(timepoint: u32, region: &str) -> String {
    format!("T{}_{}", timepoint, region)
}


/// Read a raw regional volume table. A missing file is a structural error for the batch.
pub fn read_volume_table<P: AsRef<Path>>(path: P) -> Result<VolumeTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IcvError::MissingInput(path.to_path_buf()));
    }
    volume_table_from_reader(File::open(path)?, path)
}


/// Read a raw regional volume table from a CSV stream.
///
/// The first column holds the subject IDs. Columns that are not named `T<n>_<region>` are ignored.
pub fn volume_table_from_reader<R: Read>(input: R, path: &Path) -> Result<VolumeTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(IcvError::MalformedTable(path.to_path_buf(), String::from("no header row")));
    }

    let columns: Vec<(usize, u32, String)> = headers
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(idx, name)| parse_region_column(name).map(|(t, r)| (idx, t, r.to_string())))
        .collect();

    let mut table = VolumeTable::new();
    for result in reader.records() {
        let record = result?;
        let subject = record.get(0).unwrap_or("").trim();
        if subject.is_empty() {
            return Err(IcvError::MalformedTable(path.to_path_buf(), String::from("row without subject ID")));
        }
        for (idx, timepoint, region) in columns.iter() {
            let cell = record.get(*idx).unwrap_or("");
            let value = parse_optional_f64(cell).map_err(|err| {
                IcvError::MalformedTable(
                    path.to_path_buf(),
                    format!("subject {}, column {}: {}", subject, region_column(*timepoint, region), err),
                )
            })?;
            table.insert(subject, *timepoint, region, value);
        }
    }
    Ok(table)
}


#[cfg(test)]
mod test {
    use super::*;

    const DEMO_VOLUMES: &str = "\
Dog#,Label,T0_Amygdala_L,T0_Hippocampus_R,T1_Amygdala_L,T1_Hippocampus_R
2001374,x,101.5,220,99,
CCCCUR,y,95,210.25,nan,205
";

    #[test]
    fn region_columns_are_parsed() {
        assert_eq!(Some((0, "Amygdala_L")), parse_region_column("T0_Amygdala_L"));
        assert_eq!(Some((12, "GM+WM+dGM")), parse_region_column("T12_GM+WM+dGM"));
        assert_eq!(None, parse_region_column("T_Amygdala_L"));
        assert_eq!(None, parse_region_column("Tx_Amygdala_L"));
        assert_eq!(None, parse_region_column("T0_"));
        assert_eq!(None, parse_region_column("Dog#"));
        assert_eq!("T3_CSF", region_column(3, "CSF"));
    }

    #[test]
    fn the_demo_volume_table_can_be_read() {
        let table = volume_table_from_reader(DEMO_VOLUMES.as_bytes(), Path::new("volumes.csv")).unwrap();

        assert_eq!(8, table.len());
        assert_eq!(vec!["2001374", "CCCCUR"], table.subjects().into_iter().collect::<Vec<_>>());
        assert_eq!(vec!["Amygdala_L", "Hippocampus_R"], table.regions().into_iter().collect::<Vec<_>>());
        assert_eq!(Some(101.5), table.get("2001374", 0, "Amygdala_L"));
        assert_eq!(None, table.get("2001374", 1, "Hippocampus_R"));
        assert_eq!(None, table.get("CCCCUR", 1, "Amygdala_L"));
        assert_eq!(None, table.get("CCCCUR", 2, "Amygdala_L"));
    }

    #[test]
    fn a_non_numeric_cell_is_malformed() {
        let content = "Dog#,T0_CSF\nA,lots\n";
        let result = volume_table_from_reader(content.as_bytes(), Path::new("volumes.csv"));
        assert!(matches!(result, Err(IcvError::MalformedTable(_, _))));
    }

    #[test]
    fn merged_cells_override() {
        let mut a = VolumeTable::new();
        a.insert("A", 0, "CSF", Some(1.0));
        let mut b = VolumeTable::new();
        b.insert("A", 0, "CSF", Some(2.0));
        b.insert("A", 0, "GM", Some(3.0));
        a.merge(b);
        assert_eq!(Some(2.0), a.get("A", 0, "CSF"));
        assert_eq!(2, a.len());
    }
}
