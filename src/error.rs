//! Crate-wide error type.
//!
//! Every fallible library call returns [`Result`]. The `sas` binary maps the
//! variants onto process exit codes:
//!
//! - `2` bad input: configuration, file format, JSON/CSV/TIFF decoding
//! - `3` numerical failure (non-convergent fit, degenerate data)
//! - `4` I/O and terminal problems

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SasError {
    /// Bad option string, non-positive geometry, mismatched lengths.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("missing capability: {0}")]
    MissingCapability(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("file format error: {0}")]
    Format(String),
    /// An interactive step was requested in headless mode.
    #[error("interactive step skipped in headless mode: {0}")]
    Headless(String),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("TIFF error")]
    Tiff(#[from] tiff::TiffError),
    #[error("image encoding error")]
    Image(#[from] image::ImageError),
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
    #[error("CSV error")]
    Csv(#[from] csv::Error),
}

impl SasError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Process exit code used by the `sas` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            SasError::Config(_)
            | SasError::MissingCapability(_)
            | SasError::Format(_)
            | SasError::Tiff(_)
            | SasError::Json(_)
            | SasError::Csv(_) => 2,
            SasError::Numerical(_) => 3,
            SasError::Headless(_) | SasError::Io(_) | SasError::Image(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, SasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(SasError::config("bad kind").exit_code(), 2);
        assert_eq!(SasError::numerical("no convergence").exit_code(), 3);
        let io = SasError::from(std::io::Error::other("disk"));
        assert_eq!(io.exit_code(), 4);
    }

    #[test]
    fn display_carries_message() {
        let err = SasError::config("unknown profile type 'foo'");
        assert_eq!(err.to_string(), "configuration error: unknown profile type 'foo'");
    }
}
