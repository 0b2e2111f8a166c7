use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Regression runner errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid test name '{0}': expected <suite>.<name>")]
    InvalidTestName(String),
    #[error("{0} not found")]
    ToolNotFound(String),
    #[error("failed to run {tool}: {source}")]
    ToolInvocation {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed with {status}")]
    ToolFailed { tool: String, status: ExitStatus },
    #[error("missing {what}: {}", path.display())]
    MissingArtifact { what: &'static str, path: PathBuf },
    #[error("cannot read task list {}: {source}", path.display())]
    TaskList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no valid tests found")]
    EmptyTaskList,
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("pipeline panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Trace(#[from] rvdiff_trace::TraceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
