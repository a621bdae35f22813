use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the harness itself.
///
/// Per-request problems never surface here: they are folded into a
/// [`TaskOutcome`](crate::runner::task::TaskOutcome). Only setup and I/O
/// failures travel up as `HarnessError`.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A step needed state that an earlier step should have stored.
    #[error("missing scenario context: {0}")]
    MissingContext(&'static str),

    /// A response arrived but did not match what the step expected.
    #[error("{0}")]
    Assertion(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A report could not be rendered.
    #[error("failed to encode report: {0}")]
    Encode(String),

    /// Report output could not be written. Aborts the whole run.
    #[error("failed to write report {path}: {source}")]
    ReportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }

    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }

    pub fn report_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReportIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error must stop the whole run instead of one scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ReportIo { .. } | Self::Encode(_))
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
