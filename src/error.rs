// Error taxonomy shared by the API client, the command handlers and the
// dispatcher. Every variant maps to a process exit code; the dispatcher is
// the only place that turns an `Error` into output on stderr.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a handler-level failure.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for CLI misuse.
pub const EXIT_USAGE: u8 = 2;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a status the handler does not accept.
    #[error("request failed with status {status}")]
    HttpStatus { status: u16 },

    #[error("{0}")]
    Usage(String),

    /// A value from the environment cannot be used.
    #[error("{0}")]
    Config(String),

    #[error("{step} failed: {source}")]
    StepFailed {
        step: Step,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Transport(err.into())
    }

    /// HTTP status carried by this error, looking through `run-all` steps.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status } => Some(*status),
            Error::StepFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) => EXIT_USAGE,
            Error::StepFailed { source, .. } => source.exit_code(),
            _ => EXIT_FAILURE,
        }
    }

    /// Attribute this error to a `run-all` step.
    pub fn at(self, step: Step) -> Self {
        Error::StepFailed {
            step,
            source: Box::new(self),
        }
    }
}

/// The stages of the `run-all` flow, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Preclean,
    Create,
    Verify,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Preclean => "preclean",
            Step::Create => "create",
            Step::Verify => "verify",
            Step::Delete => "delete",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(Error::Usage("missing --id".into()).exit_code(), EXIT_USAGE);
        assert_eq!(Error::HttpStatus { status: 500 }.exit_code(), EXIT_FAILURE);
        assert_eq!(Error::transport("connection refused").exit_code(), EXIT_FAILURE);
        assert_eq!(Error::Config("bad AUTH_TOKEN".into()).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn status_is_visible_through_step_failures() {
        let err = Error::HttpStatus { status: 422 }.at(Step::Verify);
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "verify failed: request failed with status 422");
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}
