//! Batch extraction of ICV proxies (affine determinants) and the determinant tables.
//!
//! For every subject the SST-to-template affine gives the baseline ICV, and every timepoint's
//! T1w-to-template affine gives a per-timepoint value. Failures are kept per cell, so one subject
//! without a transform never stops the others.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::determinant::{read_affine_determinant, AffineDeterminant};
use crate::error::{IcvError, Result};
use crate::layout::StudyLayout;
use crate::registration::RegistrationTool;
use crate::report::BatchReport;
use crate::util::{parse_optional_f64, strip_subject_prefix};

/// Index column of all subject-keyed tables.
pub const SUBJECT_COLUMN: &str = "Dog#";
pub const SST_DET_COLUMN: &str = "SST_Det";
pub const SST_DET_INV_COLUMN: &str = "SST_DetInv";

/// Result of one extraction: the determinants, or why they could not be computed.
pub type DeterminantCell = std::result::Result<AffineDeterminant, IcvError>;


/// The determinants of one subject.
#[derive(Debug)]
pub struct SubjectDeterminants {
    pub subject: String,
    pub sst: DeterminantCell,
    /// One cell per timepoint, index = timepoint.
    pub timepoints: Vec<DeterminantCell>,
}


/// The determinants of all subjects of a study, in lexicographic subject order.
#[derive(Debug)]
pub struct DeterminantTable {
    pub max_timepoint: u32,
    pub subjects: Vec<SubjectDeterminants>,
}

impl DeterminantTable {

    /// Collect the failed cells into a report.
    pub fn report(&self) -> BatchReport {
        let mut report = BatchReport::new();
        for subject in self.subjects.iter() {
            if let Err(err) = &subject.sst {
                report.record(Some(subject.subject.as_str()), None, None, copy_cell_error(err));
            }
            for (timepoint, cell) in subject.timepoints.iter().enumerate() {
                if let Err(err) = cell {
                    report.record(Some(subject.subject.as_str()), Some(timepoint as u32), None, copy_cell_error(err));
                }
            }
        }
        report
    }

    /// Write the `Dog#,SST_Det,SST_DetInv` table.
    pub fn write_sst_csv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(output);
        writer.write_record(&[SUBJECT_COLUMN, SST_DET_COLUMN, SST_DET_INV_COLUMN])?;
        for subject in self.subjects.iter() {
            let (det, det_inv) = format_cell(&subject.sst);
            writer.write_record(&[subject.subject.as_str(), det.as_str(), det_inv.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the per-timepoint table: `Dog#`, then `T<n> Det` for all timepoints, then `T<n> DetInv`.
    pub fn write_timepoint_csv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(output);
        let mut header = vec![String::from(SUBJECT_COLUMN)];
        header.extend((0..=self.max_timepoint).map(|t| format!("T{} Det", t)));
        header.extend((0..=self.max_timepoint).map(|t| format!("T{} DetInv", t)));
        writer.write_record(&header)?;

        for subject in self.subjects.iter() {
            let cells: Vec<(String, String)> = subject.timepoints.iter().map(format_cell).collect();
            let mut row = vec![subject.subject.clone()];
            row.extend(cells.iter().map(|c| c.0.clone()));
            row.extend(cells.iter().map(|c| c.1.clone()));
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}


/// Missing cells are written empty, singular ones as NaN so the two stay distinguishable.
fn format_cell(cell: &DeterminantCell) -> (String, String) {
    match cell {
        Ok(d) => (d.det.to_string(), d.det_inv.to_string()),
        Err(IcvError::SingularMatrix(_)) => (String::from("NaN"), String::from("NaN")),
        Err(_) => (String::new(), String::new()),
    }
}


/// IcvError holds non-cloneable sources; reports keep a message-preserving copy.
fn copy_cell_error(err: &IcvError) -> IcvError {
    match err {
        IcvError::MissingInput(path) => IcvError::MissingInput(path.clone()),
        IcvError::SingularMatrix(det) => IcvError::SingularMatrix(*det),
        IcvError::ExternalToolFailure(tool, status) => IcvError::ExternalToolFailure(tool.clone(), status.clone()),
        IcvError::InvalidMatFormat => IcvError::InvalidMatFormat,
        IcvError::UnsupportedMatType(mopt) => IcvError::UnsupportedMatType(*mopt),
        IcvError::MissingMatVariable(name) => IcvError::MissingMatVariable(name.clone()),
        IcvError::InvalidParameterCount(e, f) => IcvError::InvalidParameterCount(*e, *f),
        other => IcvError::Io(std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
    }
}


/// Turn a recoverable failure into a cell, propagate anything else.
fn into_cell(result: Result<AffineDeterminant>, subject: &str, what: &str) -> Result<DeterminantCell> {
    match result {
        Ok(d) => {
            tracing::debug!(subject, what, det = d.det, det_inv = d.det_inv, "determinant computed");
            Ok(Ok(d))
        }
        Err(err @ IcvError::SingularMatrix(_)) => {
            tracing::warn!(subject, what, singular = true, "{}", err);
            Ok(Err(err))
        }
        Err(err) if err.is_recoverable() => {
            tracing::info!(subject, what, "cannot calculate determinant: {}", err);
            Ok(Err(err))
        }
        Err(err) => Err(err),
    }
}


/// Extract the SST determinant of a subject, running the registration tool once if the affine is missing.
pub fn extract_sst(
    layout: &StudyLayout,
    subject: &str,
    max_timepoint: u32,
    tool: Option<&dyn RegistrationTool>,
) -> Result<DeterminantCell> {
    let affine = layout.sst_affine(subject);
    if !affine.is_file() {
        if let Some(tool) = tool {
            tracing::info!(subject, affine = %affine.display(), "SST affine does not exist, running registration tool");
            if let Err(err) = tool.register(subject, max_timepoint, &layout.base_dir) {
                tracing::error!(subject, tool = %tool.name(), "{}", err);
                return Ok(Err(err));
            }
        }
    }
    into_cell(read_affine_determinant(&affine), subject, "SST")
}


/// Extract the determinant of one timepoint of a subject.
pub fn extract_timepoint(layout: &StudyLayout, subject: &str, timepoint: u32) -> Result<DeterminantCell> {
    let result = layout
        .timepoint_affine(subject, timepoint)
        .and_then(read_affine_determinant);
    into_cell(result, subject, &format!("T{}", timepoint))
}


/// Extract SST and timepoint determinants for every subject of the study.
///
/// Subjects are processed in lexicographic order and timepoints in ascending order. Only
/// failures that are not recoverable for a single cell abort the batch.
pub fn extract_determinants(
    layout: &StudyLayout,
    max_timepoint: u32,
    tool: Option<&dyn RegistrationTool>,
) -> Result<DeterminantTable> {
    let subjects = layout.subjects()?;
    tracing::info!(num_subjects = subjects.len(), max_timepoint, "extracting affine determinants");

    let mut table = DeterminantTable { max_timepoint, subjects: Vec::with_capacity(subjects.len()) };
    for subject in subjects {
        let sst = extract_sst(layout, &subject, max_timepoint, tool)?;
        let mut timepoints = Vec::with_capacity(max_timepoint as usize + 1);
        for timepoint in 0..=max_timepoint {
            timepoints.push(extract_timepoint(layout, &subject, timepoint)?);
        }
        table.subjects.push(SubjectDeterminants { subject, sst, timepoints });
    }
    Ok(table)
}


/// Baseline ICV per subject, keyed by subject ID without the `sub-` prefix.
pub type IcvTable = BTreeMap<String, Option<f64>>;


/// Read the ICV column (`SST_Det`) from an SST determinant table.
pub fn read_icv_table<P: AsRef<Path>>(path: P) -> Result<IcvTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IcvError::MissingInput(path.to_path_buf()));
    }
    icv_table_from_reader(File::open(path)?, path)
}


pub fn icv_table_from_reader<R: Read>(input: R, path: &Path) -> Result<IcvTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
    let headers = reader.headers()?.clone();
    let subject_idx = headers
        .iter()
        .position(|h| h == SUBJECT_COLUMN)
        .ok_or_else(|| IcvError::MalformedTable(path.to_path_buf(), format!("no '{}' column", SUBJECT_COLUMN)))?;
    let det_idx = headers
        .iter()
        .position(|h| h == SST_DET_COLUMN)
        .ok_or_else(|| IcvError::MalformedTable(path.to_path_buf(), format!("no '{}' column", SST_DET_COLUMN)))?;

    let mut icv = IcvTable::new();
    for result in reader.records() {
        let record = result?;
        let subject = strip_subject_prefix(record.get(subject_idx).unwrap_or("")).to_string();
        let cell = record.get(det_idx).unwrap_or("");
        let value = parse_optional_f64(cell)
            .map_err(|err| IcvError::MalformedTable(path.to_path_buf(), format!("subject {}: {}", subject, err)))?;
        icv.insert(subject, value);
    }
    Ok(icv)
}


/// Baseline ICV values straight from an extracted table, without a round trip through CSV.
pub fn icv_from_determinants(table: &DeterminantTable) -> IcvTable {
    table
        .subjects
        .iter()
        .map(|s| {
            let value = s.sst.as_ref().ok().map(|d| d.det);
            (strip_subject_prefix(&s.subject).to_string(), value)
        })
        .collect()
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::ants_mat::{write_ants_affine, AntsAffine};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn scaling(factor: f64) -> AntsAffine {
        AntsAffine {
            parameters: vec![factor, 0.0, 0.0, 0.0, factor, 0.0, 0.0, 0.0, factor, 1.0, 2.0, 3.0],
            fixed: vec![0.0; 3],
        }
    }

    fn write_sst(base: &Path, subject: &str, affine: &AntsAffine) {
        let dir = base.join(subject).join(crate::layout::SST_DIR);
        fs::create_dir_all(&dir).unwrap();
        write_ants_affine(dir.join(crate::layout::SST_AFFINE_FILE), affine).unwrap();
    }

    fn write_timepoint(base: &Path, subject: &str, timepoint: u32, affine: &AntsAffine) {
        let dir = base.join(subject).join(format!("{}_ses-T{}_T1w_RIP_{}", subject, timepoint, timepoint));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join(format!("{}_ses-T{}_T1wtoUCItemplate_AffineOnly0GenericAffine.mat", subject, timepoint));
        write_ants_affine(file, affine).unwrap();
    }

    struct WritingTool;

    impl RegistrationTool for WritingTool {
        fn register(&self, subject: &str, _max_timepoint: u32, base_dir: &Path) -> Result<()> {
            write_sst(base_dir, subject, &scaling(3.0));
            Ok(())
        }

        fn name(&self) -> String {
            String::from("writing-tool")
        }
    }

    struct FailingTool;

    impl RegistrationTool for FailingTool {
        fn register(&self, _subject: &str, _max_timepoint: u32, _base_dir: &Path) -> Result<()> {
            Err(IcvError::ExternalToolFailure(self.name(), String::from("exit status: 1")))
        }

        fn name(&self) -> String {
            String::from("failing-tool")
        }
    }

    #[test]
    fn determinants_are_extracted_per_subject_and_timepoint() {
        let dir = tempdir().unwrap();
        write_sst(dir.path(), "sub-B", &scaling(2.0));
        write_sst(dir.path(), "sub-A", &scaling(1.0));
        write_timepoint(dir.path(), "sub-A", 0, &scaling(2.0));
        write_timepoint(dir.path(), "sub-A", 1, &scaling(0.5));
        write_timepoint(dir.path(), "sub-B", 1, &scaling(0.0));

        let layout = StudyLayout::new(dir.path(), "wholebrain").unwrap();
        let table = extract_determinants(&layout, 1, None).unwrap();

        assert_eq!(2, table.subjects.len());
        assert_eq!("sub-A", table.subjects[0].subject);
        assert_eq!(1.0, table.subjects[0].sst.as_ref().unwrap().det);
        assert_eq!(8.0, table.subjects[0].timepoints[0].as_ref().unwrap().det);
        assert_eq!(8.0, table.subjects[0].timepoints[1].as_ref().unwrap().det_inv);
        assert_eq!(8.0, table.subjects[1].sst.as_ref().unwrap().det);
        assert!(matches!(table.subjects[1].timepoints[0], Err(IcvError::MissingInput(_))));
        assert!(matches!(table.subjects[1].timepoints[1], Err(IcvError::SingularMatrix(_))));

        let counts = table.report().counts();
        assert_eq!(Some(&1), counts.get("missing-input"));
        assert_eq!(Some(&1), counts.get("singular-matrix"));
    }

    #[test]
    fn the_tool_is_run_once_for_a_missing_sst_affine() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub-A")).unwrap();
        let layout = StudyLayout::new(dir.path(), "wholebrain").unwrap();

        let cell = extract_sst(&layout, "sub-A", 0, Some(&WritingTool as &dyn RegistrationTool)).unwrap();
        assert_eq!(27.0, cell.unwrap().det);
    }

    #[test]
    fn a_failing_tool_leaves_the_cell_missing() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub-A")).unwrap();
        let layout = StudyLayout::new(dir.path(), "wholebrain").unwrap();

        let cell = extract_sst(&layout, "sub-A", 0, Some(&FailingTool as &dyn RegistrationTool)).unwrap();
        assert!(matches!(cell, Err(IcvError::ExternalToolFailure(_, _))));
    }

    #[test]
    fn the_tables_are_written_with_missing_and_singular_cells() {
        let table = DeterminantTable {
            max_timepoint: 1,
            subjects: vec![
                SubjectDeterminants {
                    subject: String::from("sub-A"),
                    sst: Ok(AffineDeterminant { det: 2.0, det_inv: 0.5 }),
                    timepoints: vec![
                        Ok(AffineDeterminant { det: 4.0, det_inv: 0.25 }),
                        Err(IcvError::MissingInput(PathBuf::from("x.mat"))),
                    ],
                },
                SubjectDeterminants {
                    subject: String::from("sub-B"),
                    sst: Err(IcvError::SingularMatrix(0.0)),
                    timepoints: vec![Err(IcvError::SingularMatrix(0.0)), Ok(AffineDeterminant { det: 1.0, det_inv: 1.0 })],
                },
            ],
        };

        let mut sst = Vec::new();
        table.write_sst_csv(&mut sst).unwrap();
        assert_eq!("Dog#,SST_Det,SST_DetInv\nsub-A,2,0.5\nsub-B,NaN,NaN\n", String::from_utf8(sst).unwrap());

        let mut timepoints = Vec::new();
        table.write_timepoint_csv(&mut timepoints).unwrap();
        assert_eq!(
            "Dog#,T0 Det,T1 Det,T0 DetInv,T1 DetInv\nsub-A,4,,0.25,\nsub-B,NaN,1,NaN,1\n",
            String::from_utf8(timepoints).unwrap()
        );
    }

    #[test]
    fn the_icv_table_strips_the_subject_prefix() {
        let content = "Dog#,SST_Det,SST_DetInv\nsub-2001374,1.25,0.8\nsub-CCCCUR,,\nsub-X,NaN,NaN\n";
        let icv = icv_table_from_reader(content.as_bytes(), Path::new("sst.csv")).unwrap();

        assert_eq!(Some(&Some(1.25)), icv.get("2001374"));
        assert_eq!(Some(&None), icv.get("CCCCUR"));
        assert_eq!(Some(&None), icv.get("X"));
    }

    #[test]
    fn extracted_determinants_give_the_same_icv_as_the_written_table() {
        let table = DeterminantTable {
            max_timepoint: 0,
            subjects: vec![
                SubjectDeterminants {
                    subject: String::from("sub-A"),
                    sst: Ok(AffineDeterminant { det: 1.3310000000000004, det_inv: 0.7513148009015775 }),
                    timepoints: vec![Err(IcvError::MissingInput(PathBuf::from("x.mat")))],
                },
                SubjectDeterminants {
                    subject: String::from("sub-B"),
                    sst: Err(IcvError::SingularMatrix(0.0)),
                    timepoints: vec![Err(IcvError::SingularMatrix(0.0))],
                },
                SubjectDeterminants {
                    subject: String::from("sub-C"),
                    sst: Err(IcvError::MissingInput(PathBuf::from("y.mat"))),
                    timepoints: vec![Ok(AffineDeterminant { det: 2.0, det_inv: 0.5 })],
                },
            ],
        };
        let icv = icv_from_determinants(&table);
        assert_eq!(Some(&Some(1.3310000000000004)), icv.get("A"));
        assert_eq!(Some(&None), icv.get("B"));
        assert_eq!(Some(&None), icv.get("C"));

        let mut sst = Vec::new();
        table.write_sst_csv(&mut sst).unwrap();
        assert_eq!(icv, icv_table_from_reader(sst.as_slice(), Path::new("sst.csv")).unwrap());
    }

    #[test]
    fn an_icv_table_without_determinants_is_malformed() {
        let content = "Dog#,Volume\nsub-A,1\n";
        let result = icv_table_from_reader(content.as_bytes(), Path::new("sst.csv"));
        assert!(matches!(result, Err(IcvError::MalformedTable(_, _))));
    }
}
