//! Raz-method ICV adjustment of regional volumes.
//!
//! For every region the baseline (T0) volumes are regressed on ICV across subjects. Each
//! subject's volume at every timepoint is then corrected with that single baseline slope:
//!
//! `adjusted = raw - slope * (icv - mean_icv)`
//!
//! See Raz et al. (2005) and Dima et al. (2022).

use csv::WriterBuilder;
use ndarray::Array1;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::config::StudyConfig;
use crate::error::Result;
use crate::icv::{IcvTable, SUBJECT_COLUMN};
use crate::regression::{fit_ols_pairs, pearson_r, residual_sd, OlsFit};
use crate::report::BatchReport;
use crate::util::{format_optional_f64, round_decimals};
use crate::volumes::{region_column, VolumeTable};

/// The regression is always fit on this timepoint.
pub const BASELINE_TIMEPOINT: u32 = 0;
/// Decimal places of adjusted volumes.
pub const ADJUSTED_DECIMALS: usize = 3;


/// Remove the linear effect of the subject's ICV deviation from the cohort mean.
///
/// # Examples
///
/// ```
/// assert_eq!(30.0, icvadjust::adjust_volume(50.0, 110.0, 100.0, 2.0));
/// ```
pub fn adjust_volume(raw: f64, icv: f64, mean_icv: f64, slope: f64) -> f64 {
    raw - slope * (icv - mean_icv)
}


/// One cell of the adjustment: a subject's region at one timepoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedRecord {
    pub subject: String,
    pub timepoint: u32,
    pub region: String,
    pub raw_volume: Option<f64>,
    pub icv: Option<f64>,
    /// `None` if the raw volume or the ICV is missing.
    pub adjusted_volume: Option<f64>,
}


/// Regression summary of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDiagnostics {
    pub region: String,
    pub fit: OlsFit,
    pub residual_sd: Option<f64>,
    /// Correlation of ICV and raw baseline volume.
    pub r_raw: Option<f64>,
    /// Correlation of ICV and adjusted baseline volume, close to zero after a successful adjustment.
    pub r_adjusted: Option<f64>,
}


/// Result of adjusting a cohort, still in voxel units.
#[derive(Debug)]
pub struct Adjustment {
    /// Output subjects in sorted order.
    pub subjects: Vec<String>,
    /// Regions that could be adjusted, sorted.
    pub regions: Vec<String>,
    pub max_timepoint: u32,
    pub icv: BTreeMap<String, Option<f64>>,
    /// Records in (region, timepoint, subject) order.
    pub records: Vec<AdjustedRecord>,
    pub diagnostics: Vec<RegionDiagnostics>,
    pub report: BatchReport,
}


/// Adjusted volumes converted to physical units. Raw volumes stay in voxel units.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVolumes {
    pub voxel_scale: f64,
    pub subjects: Vec<String>,
    pub regions: Vec<String>,
    pub max_timepoint: u32,
    pub icv: BTreeMap<String, Option<f64>>,
    pub records: Vec<AdjustedRecord>,
}


/// Arithmetic mean of the non-missing ICV values of the given subjects.
pub fn mean_icv<'a, I>(icv: &IcvTable, subjects: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a String>,
{
    let values: Array1<f64> = subjects
        .into_iter()
        .filter_map(|s| icv.get(s).cloned().flatten())
        .filter(|v| v.is_finite())
        .collect();
    values.mean()
}


/// Adjust every selected region of every subject at timepoints `0..=max_timepoint`.
///
/// The working table is the union of the subjects with an ICV entry and the subjects with
/// volumes; it provides the regression samples and the mean ICV. Output rows are the
/// configured cohort, or the working table when no groups are configured. Configured regions
/// missing from the volumes are skipped. A region whose baseline regression cannot be fit is
/// recorded in the report and left out.
pub fn adjust_volumes(icv: &IcvTable, volumes: &VolumeTable, config: &StudyConfig, max_timepoint: u32) -> Adjustment {
    let mut working: BTreeSet<String> = volumes.subjects();
    working.extend(icv.keys().cloned());

    let cohort = config.cohort();
    let subjects: Vec<String> = if cohort.is_empty() { working.iter().cloned().collect() } else { cohort.into_iter().collect() };

    let available_regions = volumes.regions();
    for missing in config.regions.difference(&available_regions) {
        tracing::warn!(region = %missing, "configured region not in the volume tables");
    }
    let candidate_regions: BTreeSet<String> = available_regions
        .into_iter()
        .filter(|region| config.includes_region(region))
        .collect();

    let subject_icv = |subject: &str| icv.get(subject).cloned().flatten().filter(|v| v.is_finite());

    let mut adjustment = Adjustment {
        subjects: subjects.clone(),
        regions: Vec::new(),
        max_timepoint,
        icv: subjects.iter().map(|s| (s.clone(), subject_icv(s.as_str()))).collect(),
        records: Vec::new(),
        diagnostics: Vec::new(),
        report: BatchReport::new(),
    };

    tracing::info!(
        num_subjects = subjects.len(),
        num_working = working.len(),
        num_regions = candidate_regions.len(),
        "adjusting regions by ICV"
    );

    for region in candidate_regions.iter() {
        let pairs: Vec<(Option<f64>, Option<f64>)> = working
            .iter()
            .map(|s| (subject_icv(s.as_str()), volumes.get(s, BASELINE_TIMEPOINT, region)))
            .collect();

        let fit = match fit_ols_pairs(&pairs) {
            Ok(fit) => fit,
            Err(err) => {
                tracing::warn!(region = %region, "skipping region: {}", err);
                adjustment.report.record(None, Some(BASELINE_TIMEPOINT), Some(region.as_str()), err);
                continue;
            }
        };
        tracing::debug!(region = %region, slope = fit.slope, intercept = fit.intercept, n = fit.n, "baseline fit");

        let mean = mean_icv(icv, working.iter());
        for timepoint in 0..=max_timepoint {
            for subject in subjects.iter() {
                let raw_volume = volumes.get(subject, timepoint, region);
                let icv_value = subject_icv(subject.as_str());
                let adjusted_volume = match (raw_volume, icv_value, mean) {
                    (Some(raw), Some(v), Some(m)) => Some(round_decimals(adjust_volume(raw, v, m, fit.slope), ADJUSTED_DECIMALS)),
                    _ => None,
                };
                adjustment.records.push(AdjustedRecord {
                    subject: subject.clone(),
                    timepoint,
                    region: region.clone(),
                    raw_volume,
                    icv: icv_value,
                    adjusted_volume,
                });
            }
        }

        adjustment.diagnostics.push(diagnose(region, &fit, &pairs, mean));
        adjustment.regions.push(region.clone());
    }

    adjustment
}


fn diagnose(region: &str, fit: &OlsFit, pairs: &[(Option<f64>, Option<f64>)], mean: Option<f64>) -> RegionDiagnostics {
    let (x, y) = crate::regression::complete_pairs(pairs);
    let r_adjusted = mean.and_then(|m| {
        let adjusted: Array1<f64> = x.iter().zip(y.iter()).map(|(icv, raw)| adjust_volume(*raw, *icv, m, fit.slope)).collect();
        pearson_r(&x, &adjusted)
    });
    RegionDiagnostics {
        region: region.to_string(),
        fit: *fit,
        residual_sd: residual_sd(fit, &x, &y),
        r_raw: pearson_r(&x, &y),
        r_adjusted,
    }
}


impl Adjustment {

    /// Convert the adjusted volumes to physical units by multiplying with `voxel_scale`.
    pub fn scaled(&self, voxel_scale: f64) -> ScaledVolumes {
        ScaledVolumes {
            voxel_scale,
            subjects: self.subjects.clone(),
            regions: self.regions.clone(),
            max_timepoint: self.max_timepoint,
            icv: self.icv.clone(),
            records: self
                .records
                .iter()
                .map(|r| AdjustedRecord { adjusted_volume: r.adjusted_volume.map(|v| v * voxel_scale), ..r.clone() })
                .collect(),
        }
    }
}


impl ScaledVolumes {

    /// Write the adjusted volume table: `Dog#, Group, Source, ICV`, then `T<n>_<region>` for every
    /// region and timepoint.
    pub fn write_csv<W: Write>(&self, config: &StudyConfig, output: W) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(output);

        let mut header = vec![
            String::from(SUBJECT_COLUMN),
            String::from("Group"),
            String::from("Source"),
            String::from("ICV"),
        ];
        for region in self.regions.iter() {
            header.extend((0..=self.max_timepoint).map(|t| region_column(t, region)));
        }
        writer.write_record(&header)?;

        let mut cells: BTreeMap<(&str, &str, u32), Option<f64>> = BTreeMap::new();
        for r in self.records.iter() {
            cells.insert((r.subject.as_str(), r.region.as_str(), r.timepoint), r.adjusted_volume);
        }

        for subject in self.subjects.iter() {
            let mut row = vec![
                subject.clone(),
                config.group_of(subject).unwrap_or("").to_string(),
                config.source_of(subject).unwrap_or("").to_string(),
                format_optional_f64(self.icv.get(subject).cloned().flatten()),
            ];
            for region in self.regions.iter() {
                for timepoint in 0..=self.max_timepoint {
                    let value = cells.get(&(subject.as_str(), region.as_str(), timepoint)).cloned().flatten();
                    row.push(format_optional_f64(value));
                }
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}


/// Write one row of regression diagnostics per region.
pub fn write_diagnostics_csv<W: Write>(diagnostics: &[RegionDiagnostics], output: W) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(output);
    writer.write_record(&["region", "n", "slope", "intercept", "residual_sd", "r_raw", "r_adjusted"])?;
    for d in diagnostics.iter() {
        writer.write_record(&[
            d.region.clone(),
            d.fit.n.to_string(),
            d.fit.slope.to_string(),
            d.fit.intercept.to_string(),
            format_optional_f64(d.residual_sd),
            format_optional_f64(d.r_raw),
            format_optional_f64(d.r_adjusted),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
