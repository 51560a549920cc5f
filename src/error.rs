use std::io;

use thiserror::Error;

/// Exit status for a malformed invocation.
pub const EXIT_USAGE: u8 = 1;
/// Exit status for every other fatal condition.
pub const EXIT_FATAL: u8 = 255;

#[derive(Debug, Error)]
pub enum SqError {
    #[error("{0}")]
    Usage(String),

    #[error("sqlite error {code}: {context}: {message}")]
    Engine {
        code: i32,
        context: String,
        message: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("malformed descriptor marker {marker}: {reason}")]
    MalformedMarker { marker: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl SqError {
    /// Wrap an engine failure together with what we were trying to do.
    pub fn engine(context: impl Into<String>, err: &rusqlite::Error) -> Self {
        let code = err.sqlite_error().map_or(0, |e| e.extended_code);
        let message = match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
            #[cfg(feature = "bundled")]
            rusqlite::Error::SqlInputError { msg, .. } => msg.clone(),
            other => other.to_string(),
        };
        SqError::Engine {
            code,
            context: context.into(),
            message,
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SqError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(marker: &str, reason: impl Into<String>) -> Self {
        SqError::MalformedMarker {
            marker: marker.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            SqError::Usage(_) => EXIT_USAGE,
            _ => EXIT_FATAL,
        }
    }
}
