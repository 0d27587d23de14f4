//! Command line arguments and logging setup shared by the binaries.

use clap::Args;
use std::path::PathBuf;

/// Positional arguments shared by both entry points.
#[derive(Debug, Args)]
pub struct StudyArgs {
    /// Highest timepoint index to process (timepoints 0..=MAX_TIMEPOINT)
    pub max_timepoint: u32,

    /// Base directory of the longitudinal study (longCT directory)
    pub base_dir: PathBuf,
}

/// Install the `tracing` subscriber used by the binaries. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
