use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 安全輸出流程中可能發生的錯誤。 / Failures raised while staging or committing an output file.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("output path {path} has no file name")]
    InvalidTarget { path: PathBuf },
    #[error("failed to create temporary file in {dir}: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        mode: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to flush temporary file {path}: {source}")]
    Sync {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriterError {
    /// 回傳底層 I/O 錯誤的種類。 / Returns the kind of the underlying I/O failure.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            WriterError::InvalidTarget { .. } => io::ErrorKind::InvalidInput,
            WriterError::CreateTemp { source, .. }
            | WriterError::Permissions { source, .. }
            | WriterError::Sync { source, .. }
            | WriterError::Rename { source, .. } => source.kind(),
        }
    }
}

impl From<WriterError> for io::Error {
    fn from(err: WriterError) -> Self {
        io::Error::new(err.kind(), err)
    }
}
