use core::fmt;
use std::{io, path::Path};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by the fallible operations of this crate.
///
/// Use [`Error::kind`] to find out what went wrong. The boolean loading API collapses all of these
/// into `false`.
pub struct Error {
    repr: Repr,
}

pub(crate) enum Repr {
    Io { context: String, error: io::Error },
    Other { kind: ErrorKind, message: String },
}

/// A coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file could not be opened or read.
    Io,
    /// The data does not start with the `BM` signature.
    NotBitmap,
    /// The data ends before the sizes declared in its headers.
    Truncated,
    /// The headers contain inconsistent or invalid values.
    Malformed,
    /// The file is a valid bitmap, but uses features this library does not implement, or exceeds
    /// the configured [`Limits`](crate::Limits).
    Unsupported,
    /// The target surface cannot accept a bitmap.
    InvalidSurface,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            repr: Repr::Other {
                kind,
                message: message.into(),
            },
        }
    }

    pub(crate) fn io(path: &Path, error: io::Error) -> Self {
        Self {
            repr: Repr::Io {
                context: format!("failed to read '{}'", path.display()),
                error,
            },
        }
    }

    pub(crate) fn truncated() -> Self {
        Self::new(
            ErrorKind::Truncated,
            "reached end of data while decoding bitmap",
        )
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            Repr::Io { .. } => ErrorKind::Io,
            Repr::Other { kind, .. } => *kind,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Io { context, error } => write!(f, "{context}: {error:?}"),
            Repr::Other { kind, message } => write!(f, "{kind:?}: {message}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Io { context, error } => write!(f, "{context}: {error}"),
            Repr::Other { message, .. } => message.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.repr {
            Repr::Io { error, .. } => Some(error),
            Repr::Other { .. } => None,
        }
    }
}
