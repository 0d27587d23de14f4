//! Fallback invocation of the external affine registration tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{IcvError, Result};

/// Something that can (re)create the affine transform files of a subject.
pub trait RegistrationTool {
    /// Produce the SST and timepoint affines of `subject` for timepoints `0..=max_timepoint`.
    fn register(&self, subject: &str, max_timepoint: u32, base_dir: &Path) -> Result<()>;

    fn name(&self) -> String;
}


/// Runs a registration script as `script SUBJECT MAX_TIMEPOINT BASE_DIR`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTool {
    pub script: PathBuf,
}

impl ScriptTool {
    pub fn new<P: AsRef<Path>>(script: P) -> ScriptTool {
        ScriptTool { script: script.as_ref().to_path_buf() }
    }
}

impl RegistrationTool for ScriptTool {
    fn register(&self, subject: &str, max_timepoint: u32, base_dir: &Path) -> Result<()> {
        tracing::info!(script = %self.script.display(), subject, "running registration script");
        let status = Command::new(&self.script)
            .arg(subject)
            .arg(max_timepoint.to_string())
            .arg(base_dir)
            .status()
            .map_err(|err| IcvError::ExternalToolFailure(self.name(), err.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(IcvError::ExternalToolFailure(self.name(), status.to_string()))
        }
    }

    fn name(&self) -> String {
        self.script.display().to_string()
    }
}
