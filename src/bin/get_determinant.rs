//! Extract the affine determinants (ICV proxies) of every subject of a longitudinal study.
//!
//! Usage: get_determinant MAX_TIMEPOINT BASE_DIR

use anyhow::{Context, Result};
use clap::Parser;

use icvadjust::cli::{init_logging, StudyArgs};
use icvadjust::pipeline::run_determinants;
use icvadjust::{StudyConfig, StudyLayout};

#[derive(Debug, Parser)]
#[command(
    name = "get_determinant",
    version,
    about = "Determinants of SST and timepoint affines to the group template"
)]
struct Cli {
    #[command(flatten)]
    study: StudyArgs,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    tracing::info!(base_dir = %cli.study.base_dir.display(), max_timepoint = cli.study.max_timepoint, "running get_determinant");
    let config = StudyConfig::for_study_dir(&cli.study.base_dir).context("loading study configuration")?;
    let layout = StudyLayout::new(&cli.study.base_dir, &config.mask)?;

    let (table, report) = run_determinants(&layout, &config, cli.study.max_timepoint)
        .with_context(|| format!("extracting determinants in {}", cli.study.base_dir.display()))?;

    tracing::info!(num_subjects = table.subjects.len(), "determinant tables written");
    report.log_summary();
    Ok(())
}
