use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// No attach point exists for the process, usually because it has exited.
    #[error("no performance data found for PID {pid}")]
    NotFound { pid: u32 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The attach point exists but its content cannot be decoded.
    #[error("malformed performance data: {0}")]
    Malformed(String),

    #[error("session is closed")]
    Closed,

    #[error("invalid object name `{0}`")]
    InvalidObjectName(String),
}

impl SessionError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        SessionError::Malformed(reason.into())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
