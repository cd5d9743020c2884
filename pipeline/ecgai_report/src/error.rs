use std::path::PathBuf;

/// The recalibration threshold has no defined mapping.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("threshold {0} must lie strictly between 0 and 1")]
    OutOfRange(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("cannot read coding tables {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed coding tables: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid coding tables: {0}")]
    Invalid(String),
}
