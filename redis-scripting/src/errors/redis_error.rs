use std::{error, fmt, io};

use arcstr::ArcStr;

use crate::errors::{
    server_error::{ServerError, ServerErrorKind},
    ParsingError,
};

/// An enum of all error kinds.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The reply shape does not match the declared output type.
    DecodeMismatch,
    /// `EVALSHA` was answered with `NOSCRIPT` and no script body was known
    /// locally to retry with `EVAL`.
    ScriptNotCached,
    /// An error raised that was identified on the client before execution.
    ClientError,
    /// This kind is returned if the error is one that is
    /// not native to the system.  This is usually the case if
    /// the cause is another error.
    IoError,
    /// An error code the library does not understand.
    ExtensionError,
    /// An error returned from the server
    ServerError(ServerErrorKind),
}

/// Represents a redis error.
///
/// For the most part you should be using the Error trait to interact with this
/// rather than the actual struct.
pub struct RedisError {
    repr: ErrorRepr,
}

#[derive(Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, ArcStr),
    IoError(io::Error),
    ParsingError(ParsingError),
    ServerError(ServerError),
}

impl PartialEq for RedisError {
    fn eq(&self, other: &RedisError) -> bool {
        match (&self.repr, &other.repr) {
            (&ErrorRepr::WithDescription(kind_a, _), &ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                &ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                &ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::ParsingError(a), ErrorRepr::ParsingError(b)) => *a == *b,
            (ErrorRepr::ServerError(a), ErrorRepr::ServerError(b)) => *a == *b,
            _ => false,
        }
    }
}

impl From<io::Error> for RedisError {
    fn from(err: io::Error) -> RedisError {
        RedisError {
            repr: ErrorRepr::IoError(err),
        }
    }
}

impl From<(ErrorKind, &'static str)> for RedisError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> RedisError {
        RedisError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for RedisError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> RedisError {
        RedisError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail.into()),
        }
    }
}

impl From<ServerError> for RedisError {
    fn from(err: ServerError) -> Self {
        Self {
            repr: ErrorRepr::ServerError(err),
        }
    }
}

impl From<ServerErrorKind> for ErrorKind {
    fn from(kind: ServerErrorKind) -> Self {
        ErrorKind::ServerError(kind)
    }
}

impl From<ParsingError> for RedisError {
    fn from(err: ParsingError) -> Self {
        RedisError {
            repr: ErrorRepr::ParsingError(err),
        }
    }
}

impl From<std::str::Utf8Error> for RedisError {
    fn from(err: std::str::Utf8Error) -> Self {
        ParsingError::from(err).into()
    }
}

impl From<std::string::FromUtf8Error> for RedisError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ParsingError::from(err).into()
    }
}

impl error::Error for RedisError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::IoError(err) => Some(err),
            ErrorRepr::ServerError(err) => Some(err),
            ErrorRepr::ParsingError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Debug for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                desc.fmt(f)?;
                f.write_str("- ")?;
                fmt::Debug::fmt(&kind, f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, detail) => {
                desc.fmt(f)?;
                f.write_str(" - ")?;
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                detail.fmt(f)
            }
            ErrorRepr::IoError(err) => err.fmt(f),
            ErrorRepr::ParsingError(err) => err.fmt(f),
            ErrorRepr::ServerError(err) => err.fmt(f),
        }
    }
}

/// Indicates a general failure in the library.
impl RedisError {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => *kind,
            ErrorRepr::IoError(_) => ErrorKind::IoError,
            ErrorRepr::ParsingError(_) => ErrorKind::DecodeMismatch,
            ErrorRepr::ServerError(err) => match err.kind() {
                Some(kind) => ErrorKind::ServerError(kind),
                None => ErrorKind::ExtensionError,
            },
        }
    }

    /// Returns the error detail.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, detail) => Some(detail.as_str()),
            ErrorRepr::ParsingError(err) => Some(&err.description),
            ErrorRepr::ServerError(err) => err.details(),
            _ => None,
        }
    }

    /// Returns the raw error code if available.
    pub fn code(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::ServerError(err) => Some(err.code()),
            _ => None,
        }
    }

    /// Returns the name of the error category for display purposes.
    pub fn category(&self) -> &str {
        match self.kind() {
            ErrorKind::DecodeMismatch => "type error",
            ErrorKind::ScriptNotCached => "script not cached",
            ErrorKind::ClientError => "client error",
            ErrorKind::IoError => "I/O error",
            ErrorKind::ExtensionError => "extension error",
            ErrorKind::ServerError(ServerErrorKind::ResponseError) => "response error",
            ErrorKind::ServerError(ServerErrorKind::BusyLoading) => "busy loading",
            ErrorKind::ServerError(ServerErrorKind::NoScript) => "no script",
            ErrorKind::ServerError(ServerErrorKind::Busy) => "busy",
            ErrorKind::ServerError(ServerErrorKind::NotBusy) => "not busy",
            ErrorKind::ServerError(ServerErrorKind::Unkillable) => "unkillable",
            ErrorKind::ServerError(ServerErrorKind::ReadOnly) => "read-only",
            ErrorKind::ServerError(ServerErrorKind::NoPerm) => "no permission",
        }
    }

    /// Indicates that the server does not hold the requested script.
    pub fn is_no_script(&self) -> bool {
        self.kind() == ErrorKind::ServerError(ServerErrorKind::NoScript)
    }

    /// Indicates that `SCRIPT KILL` found nothing to kill.
    pub fn is_server_busy(&self) -> bool {
        self.kind() == ErrorKind::ServerError(ServerErrorKind::NotBusy)
    }

    /// Indicates that this failure is an IO failure.
    pub fn is_io_error(&self) -> bool {
        self.kind() == ErrorKind::IoError
    }

    /// Returns true if error was caused by I/O time out.
    /// Note that this may not be accurate depending on platform.
    pub fn is_timeout(&self) -> bool {
        match self.repr {
            ErrorRepr::IoError(ref err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Returns true if error was caused by a dropped connection.
    pub fn is_connection_dropped(&self) -> bool {
        match self.repr {
            ErrorRepr::IoError(ref err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Returns true if the connection must be replaced. A replaced
    /// connection talks to a server whose script cache may be gone, so the
    /// caller should start over with a fresh scripting cache too.
    pub fn is_unrecoverable_error(&self) -> bool {
        match &self.repr {
            ErrorRepr::IoError(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
