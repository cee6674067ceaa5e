//! Crate-wide error type.
//!
//! Variants follow the failure taxonomy the orchestrator acts on: bad
//! configuration aborts a run, a missing input only fails its hillslope, and
//! an invariant violation is a programmer error carrying the day index.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification used by the orchestrator's propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    MissingInput,
    Invariant,
    Io,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum AshError {
    #[error("invalid configuration `{key}` = {value}: {reason}")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("column `{column}` missing from {frame} frame")]
    MissingColumn { frame: &'static str, column: String },

    #[error("projection mismatch: {src} cannot be resampled onto {dst}")]
    ProjectionMismatch { src: String, dst: String },

    #[error("invariant violated on day {day}: {detail}")]
    Invariant { day: usize, detail: String },

    #[error("{source_name}:{line}: {detail}")]
    Parse {
        source_name: String,
        line: usize,
        detail: String,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl AshError {
    /// Shorthand for an [`AshError::InvalidConfig`] built from displayable parts.
    pub fn config(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } | Self::InvalidArgument(_) => ErrorKind::InvalidConfig,
            Self::MissingInput(_)
            | Self::MissingColumn { .. }
            | Self::ProjectionMismatch { .. }
            | Self::Parse { .. } => ErrorKind::MissingInput,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_)
            | Self::Tiff(_)
            | Self::Json(_)
            | Self::Csv(_)
            | Self::Arrow(_)
            | Self::Parquet(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, AshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_key_and_value() {
        let e = AshError::config("fire_date", "13/40", "month must be 1-12");
        let msg = e.to_string();
        assert!(msg.contains("fire_date"), "{msg}");
        assert!(msg.contains("13/40"), "{msg}");
        assert_eq!(e.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            AshError::MissingInput(PathBuf::from("H1.wat.dat")).kind(),
            ErrorKind::MissingInput
        );
        assert_eq!(
            AshError::Invariant { day: 3, detail: "porosity".into() }.kind(),
            ErrorKind::Invariant
        );
        let io = AshError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
