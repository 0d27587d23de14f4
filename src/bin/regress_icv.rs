//! Adjust regional brain volumes for ICV with the Raz method.
//!
//! Usage: regress_icv MAX_TIMEPOINT BASE_DIR

use anyhow::{Context, Result};
use clap::Parser;

use icvadjust::cli::{init_logging, StudyArgs};
use icvadjust::pipeline::run_adjustment;
use icvadjust::{StudyConfig, StudyLayout};

#[derive(Debug, Parser)]
#[command(
    name = "regress_icv",
    version,
    about = "Regress regional volumes on ICV at baseline and write ICV-adjusted volumes in mm3"
)]
struct Cli {
    #[command(flatten)]
    study: StudyArgs,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    tracing::info!(base_dir = %cli.study.base_dir.display(), max_timepoint = cli.study.max_timepoint, "running regress_icv");
    let config = StudyConfig::for_study_dir(&cli.study.base_dir).context("loading study configuration")?;
    let layout = StudyLayout::new(&cli.study.base_dir, &config.mask)?;
    tracing::info!(
        mask = %config.mask,
        voxel_scale = config.voxel_scale,
        save_dir = %layout.processed_dir().display(),
        "study layout"
    );

    let outcome = run_adjustment(&layout, &config, cli.study.max_timepoint)
        .with_context(|| format!("adjusting volumes in {}", cli.study.base_dir.display()))?;

    tracing::info!(
        num_subjects = outcome.volumes.subjects.len(),
        num_regions = outcome.volumes.regions.len(),
        written = outcome.written,
        "adjustment finished"
    );
    outcome.report.log_summary();
    Ok(())
}
