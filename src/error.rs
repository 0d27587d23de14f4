use quick_error::quick_error;
use std::io::{Error as IOError, ErrorKind};
use std::path::PathBuf;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum IcvError {
        /// An expected transform, volume or statistics file does not exist.
        MissingInput(path: PathBuf) {
            display("Missing input file '{}'", path.display())
        }

        /// The linear part of an affine transform cannot be inverted.
        SingularMatrix(determinant: f64) {
            display("Singular affine linear block (determinant {})", determinant)
        }

        /// A regression cannot be fit for a region.
        InsufficientData(reason: String) {
            display("Cannot fit regression: {}", reason)
        }

        /// The external registration tool exited with a failure status.
        ExternalToolFailure(tool: String, status: String) {
            display("Registration tool '{}' failed: {}", tool, status)
        }

        /// Invalid MATLAB v4 file: the type word of a variable header is not valid.
        InvalidMatFormat {
            display("Invalid MATLAB v4 file")
        }

        UnsupportedMatType(mopt: i32) {
            display("Unsupported MATLAB v4 variable type {}", mopt)
        }

        MissingMatVariable(name: String) {
            display("No variable named '{}' in MATLAB file", name)
        }

        InvalidParameterCount(expected: usize, found: usize) {
            display("Expected {} affine parameters, found {}", expected, found)
        }

        MalformedTable(path: PathBuf, reason: String) {
            display("Malformed table '{}': {}", path.display(), reason)
        }

        MissingStudyDirectory(path: PathBuf) {
            display("Study directory '{}' not found", path.display())
        }

        InvalidConfig(reason: String) {
            display("Invalid study configuration: {}", reason)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
        }

        Csv(err: csv::Error) {
            from()
            source(err)
        }

        Toml(err: toml::de::Error) {
            from()
            source(err)
        }

        Shape(err: ndarray::ShapeError) {
            from()
            source(err)
        }
    }
}

impl IcvError {
    /// Whether a batch may record this error for the affected cell and continue.
    ///
    /// Only the failures expected for a single subject or timepoint qualify: absent files,
    /// unreadable transform files and singular matrices. Everything else aborts the batch.
    pub fn is_recoverable(&self) -> bool {
        match self {
            IcvError::MissingInput(_)
            | IcvError::SingularMatrix(_)
            | IcvError::InvalidMatFormat
            | IcvError::UnsupportedMatType(_)
            | IcvError::MissingMatVariable(_)
            | IcvError::InvalidParameterCount(_, _)
            | IcvError::ExternalToolFailure(_, _) => true,
            IcvError::Io(err) => matches!(err.kind(), ErrorKind::NotFound | ErrorKind::UnexpectedEof),
            _ => false,
        }
    }

    /// Short name of the error kind, used to summarize batch reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IcvError::MissingInput(_) => "missing-input",
            IcvError::SingularMatrix(_) => "singular-matrix",
            IcvError::InsufficientData(_) => "insufficient-data",
            IcvError::ExternalToolFailure(_, _) => "external-tool-failure",
            IcvError::InvalidMatFormat
            | IcvError::UnsupportedMatType(_)
            | IcvError::MissingMatVariable(_)
            | IcvError::InvalidParameterCount(_, _) => "unreadable-transform",
            IcvError::MalformedTable(_, _) => "malformed-table",
            IcvError::MissingStudyDirectory(_) => "missing-study-directory",
            IcvError::InvalidConfig(_) => "invalid-config",
            IcvError::Io(_) => "io",
            IcvError::Csv(_) => "csv",
            IcvError::Toml(_) => "toml",
            IcvError::Shape(_) => "shape",
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, IcvError>;
