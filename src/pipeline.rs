//! The two batch runs of a study: determinant extraction and ICV adjustment.
//!
//! Both runs keep existing outputs where the study workflow expects it, and collect per-cell
//! failures into a [`BatchReport`] instead of stopping.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::adjust::{adjust_volumes, write_diagnostics_csv, RegionDiagnostics, ScaledVolumes};
use crate::config::StudyConfig;
use crate::error::Result;
use crate::icv::{extract_determinants, icv_from_determinants, read_icv_table, DeterminantTable};
use crate::layout::StudyLayout;
use crate::registration::{RegistrationTool, ScriptTool};
use crate::report::BatchReport;
use crate::tissue::{read_tissue_stats, tissue_volume_table, write_segmentations_csv, TissueTable};
use crate::volumes::read_volume_table;


/// Create `path` and hand a buffered writer to `write`.
pub fn write_file<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    write(&mut file)?;
    file.flush()?;
    tracing::info!(path = %path.as_ref().display(), "table written");
    Ok(())
}


/// Extract all determinants of a study and write the SST and timepoint tables.
///
/// The registration script of the configuration, if any, is run for subjects without an SST affine.
pub fn run_determinants(layout: &StudyLayout, config: &StudyConfig, max_timepoint: u32) -> Result<(DeterminantTable, BatchReport)> {
    let script = config.registration_script.as_ref().map(ScriptTool::new);
    let tool = script.as_ref().map(|s| s as &dyn RegistrationTool);

    let table = extract_determinants(layout, max_timepoint, tool)?;
    write_file(layout.sst_determinants(), |w| table.write_sst_csv(w))?;
    write_file(layout.timepoint_determinants(), |w| table.write_timepoint_csv(w))?;

    let report = table.report();
    Ok((table, report))
}


/// Read the tissue statistics of timepoints `0..=max_timepoint`. Missing files are recorded and skipped.
pub fn load_tissue(layout: &StudyLayout, max_timepoint: u32, report: &mut BatchReport) -> Result<BTreeMap<u32, TissueTable>> {
    let mut tissue = BTreeMap::new();
    for timepoint in 0..=max_timepoint {
        match read_tissue_stats(layout.tissue_stats(timepoint)) {
            Ok(table) => {
                tissue.insert(timepoint, table);
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(timepoint, "no tissue statistics: {}", err);
                report.record(None, Some(timepoint), None, err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(tissue)
}


/// What an adjustment run produced.
#[derive(Debug)]
pub struct AdjustmentOutcome {
    pub volumes: ScaledVolumes,
    pub diagnostics: Vec<RegionDiagnostics>,
    pub report: BatchReport,
    /// Whether the adjusted volume table was written; an existing table is never overwritten.
    pub written: bool,
}


/// Run the full adjustment of a study.
///
/// The raw volume table is required. The ICV table is computed with [`run_determinants`] when
/// it does not exist yet, and read from disk otherwise.
pub fn run_adjustment(layout: &StudyLayout, config: &StudyConfig, max_timepoint: u32) -> Result<AdjustmentOutcome> {
    let mut report = BatchReport::new();
    fs::create_dir_all(layout.processed_dir())?;

    let tissue = load_tissue(layout, max_timepoint, &mut report)?;
    let segmentations = layout.raw_segmentations();
    if segmentations.is_file() {
        tracing::info!(path = %segmentations.display(), "segmentation table exists");
    } else {
        write_file(&segmentations, |w| write_segmentations_csv(&tissue, w))?;
    }

    let mut volumes = read_volume_table(layout.raw_volumes())?;
    for (timepoint, table) in tissue.iter() {
        volumes.merge(tissue_volume_table(*timepoint, table));
    }

    let icv_path = layout.sst_determinants();
    let icv = if icv_path.is_file() {
        tracing::info!(path = %icv_path.display(), "determinant table exists, skipping extraction");
        read_icv_table(&icv_path)?
    } else {
        let (determinants, determinant_report) = run_determinants(layout, config, max_timepoint)?;
        report.merge(determinant_report);
        icv_from_determinants(&determinants)
    };

    let adjustment = adjust_volumes(&icv, &volumes, config, max_timepoint);
    let scaled = adjustment.scaled(config.voxel_scale);
    let diagnostics = adjustment.diagnostics;
    report.merge(adjustment.report);

    let adjusted_path = layout.adjusted_volumes();
    let written = if adjusted_path.is_file() {
        tracing::info!(path = %adjusted_path.display(), "adjusted volume table exists");
        false
    } else {
        write_file(&adjusted_path, |w| scaled.write_csv(config, w))?;
        true
    };
    write_file(layout.regression_diagnostics(), |w| write_diagnostics_csv(&diagnostics, w))?;

    Ok(AdjustmentOutcome { volumes: scaled, diagnostics, report, written })
}
