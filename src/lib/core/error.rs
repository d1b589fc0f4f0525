//! Error types for the rearrgroup library

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid interval '{0}'")]
    Interval(String),

    #[error("Read {read} has no RG: field (consider --default-sample)")]
    MissingReadGroup { read: String },

    #[error("Read {read} has an unknown read group ('{read_group}')")]
    UnknownReadGroup { read: String, read_group: String },

    #[error("Read group configuration error: {0}")]
    ReadGroupConfig(String),

    #[error("Incompatible input headers: {0}")]
    HeaderMismatch(String),

    #[error("{}: no features selected (missing track metadata?)", .0.display())]
    NoFeatures(PathBuf),

    #[error("input contains no reference sequence headers")]
    NoReferences,

    #[error("{path}: input is not coordinate-sorted (read {read})")]
    UnsortedInput { path: String, read: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("BAM error in {path}: {source}")]
    Bam {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GroupError>;

impl GroupError {
    pub(crate) fn parse<P: Into<PathBuf>, M: Into<String>>(path: P, line: usize, message: M) -> Self {
        GroupError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
