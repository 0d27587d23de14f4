//! ICV proxies from ANTs affine registrations and Raz-method ICV adjustment of regional brain volumes.
//!
//! The determinant of the linear part of a subject-to-template affine approximates the subject's
//! intracranial volume. Regional volumes of a longitudinal study are regressed on it at
//! baseline, and every timepoint is corrected with the baseline slope.

pub mod adjust;
pub mod ants_mat;
pub mod cli;
pub mod config;
pub mod determinant;
pub mod error;
pub mod icv;
pub mod layout;
pub mod pipeline;
pub mod registration;
pub mod regression;
pub mod report;
pub mod tissue;
pub mod util;
pub mod volumes;

pub use adjust::{adjust_volume, adjust_volumes, AdjustedRecord, Adjustment, ScaledVolumes};
pub use ants_mat::{read_ants_affine, write_ants_affine, AntsAffine};
pub use config::StudyConfig;
pub use determinant::{affine_determinant, read_affine_determinant, AffineDeterminant};
pub use error::{IcvError, Result};
pub use icv::{extract_determinants, read_icv_table, DeterminantTable, IcvTable};
pub use layout::StudyLayout;
pub use regression::{fit_ols, OlsFit};
pub use report::BatchReport;
pub use volumes::{read_volume_table, VolumeTable};
