use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DicomError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid DICOM format: {0}")]
    InvalidDicomFormat(String),

    #[error("Invalid pixel data: {0}")]
    InvalidPixelData(String),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("No DICOM files found")]
    NoDicomFiles,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for DicomError {
    fn from(err: std::io::Error) -> Self {
        DicomError::Unknown(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DicomError {
    fn from(err: tokio::task::JoinError) -> Self {
        DicomError::Unknown(format!("background task failed: {err}"))
    }
}

impl DicomError {
    /// Map an I/O error raised while accessing `path`, keeping the path for
    /// missing files.
    pub(crate) fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DicomError::FileNotFound(path.into()),
            _ => DicomError::Unknown(err.to_string()),
        }
    }
}
