use thiserror::Error;

use crate::TraceFormat;

/// Trace normalization errors.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("{format} trace contains no commit records")]
    EmptyTrace { format: TraceFormat },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;
