//! Error types for the sendmime crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the sendmime crate.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on the output stream.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The source file for a body part is missing or unreadable.
    #[error("cannot read source '{path}': {source}")]
    SourceUnreadable {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },

    /// No candidate charset produced a finite lossiness score.
    #[error("no candidate charset can represent the content")]
    ConversionImpossible,

    /// The operation was cancelled through a [`CancelToken`](crate::CancelToken).
    #[error("encoding interrupted")]
    Interrupted,

    /// Multipart error
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Specialized Result type for sendmime operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a `SourceUnreadable` from a path and an `io::Error`.
    pub fn source_unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = Error::Multipart("no boundary".to_string());
        assert_eq!(err.to_string(), "Multipart error: no boundary");

        let err = Error::Encoding("invalid hex digit".to_string());
        assert_eq!(err.to_string(), "Encoding error: invalid hex digit");

        let err = Error::Interrupted;
        assert_eq!(err.to_string(), "encoding interrupted");

        let err = Error::ConversionImpossible;
        assert!(err.to_string().contains("charset"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_source_unreadable_keeps_path() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::source_unreadable("/tmp/missing.txt", io_err);
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }
}
