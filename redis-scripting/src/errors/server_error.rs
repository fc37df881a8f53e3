use arcstr::ArcStr;
use std::fmt;

/// Kinds of errors returned from the server
#[derive(PartialEq, Debug, Clone, Copy, Eq)]
#[non_exhaustive]
pub enum ServerErrorKind {
    /// The server returned a general error.
    ResponseError,
    /// The server cannot respond because it's loading a dump.
    BusyLoading,
    /// A script that was requested by digest does not exist in the server's script cache.
    NoScript,
    /// The server is busy running a script and cannot serve the request.
    Busy,
    /// Attempted to kill a script while none was executing.
    NotBusy,
    /// The running script already performed writes and cannot be killed.
    Unkillable,
    /// Attempt to write to a read-only server.
    ReadOnly,
    /// Attempted to use a command without ACL permission.
    NoPerm,
}

impl ServerErrorKind {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::ResponseError => "ERR",
            Self::BusyLoading => "LOADING",
            Self::NoScript => "NOSCRIPT",
            Self::Busy => "BUSY",
            Self::NotBusy => "NOTBUSY",
            Self::Unkillable => "UNKILLABLE",
            Self::ReadOnly => "READONLY",
            Self::NoPerm => "NOPERM",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "ERR" => Self::ResponseError,
            "LOADING" => Self::BusyLoading,
            "NOSCRIPT" => Self::NoScript,
            "BUSY" => Self::Busy,
            "NOTBUSY" => Self::NotBusy,
            "UNKILLABLE" => Self::Unkillable,
            "READONLY" => Self::ReadOnly,
            "NOPERM" => Self::NoPerm,
            _ => return None,
        })
    }
}

/// An error that was returned from the server
#[derive(PartialEq, Debug, Clone)]
pub struct ServerError(pub(crate) Repr);

#[derive(PartialEq, Debug, Clone)]
pub(crate) enum Repr {
    Extension {
        code: ArcStr,
        detail: Option<ArcStr>,
    },
    Known {
        kind: ServerErrorKind,
        detail: Option<ArcStr>,
    },
}

impl ServerError {
    /// Builds a server error from the text of an error reply, without the
    /// leading `-`. The first word is the error code.
    ///
    /// ```rust
    /// use redis_scripting::{ServerError, ServerErrorKind};
    ///
    /// let err = ServerError::parse("NOSCRIPT No matching script. Please use EVAL.");
    /// assert_eq!(err.kind(), Some(ServerErrorKind::NoScript));
    /// assert_eq!(err.details(), Some("No matching script. Please use EVAL."));
    /// ```
    pub fn parse(line: &str) -> ServerError {
        let mut pieces = line.splitn(2, ' ');
        let code = pieces.next().unwrap_or_default();
        let detail = pieces.next().map(ArcStr::from);
        match ServerErrorKind::from_code(code) {
            Some(kind) => ServerError(Repr::Known { kind, detail }),
            None => ServerError(Repr::Extension {
                code: code.into(),
                detail,
            }),
        }
    }

    /// Returns the kind of error. If `None`, try `Self::code` to get the error code.
    pub fn kind(&self) -> Option<ServerErrorKind> {
        match &self.0 {
            Repr::Extension { .. } => None,
            Repr::Known { kind, .. } => Some(*kind),
        }
    }

    /// The error code returned from the server
    pub fn code(&self) -> &str {
        match &self.0 {
            Repr::Extension { code, .. } => code,
            Repr::Known { kind, .. } => kind.code(),
        }
    }

    /// Additional details about the error, if exist
    pub fn details(&self) -> Option<&str> {
        match &self.0 {
            Repr::Extension { detail, .. } => detail.as_ref().map(|str| str.as_str()),
            Repr::Known { detail, .. } => detail.as_ref().map(|str| str.as_str()),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())?;
        if let Some(detail) = self.details() {
            f.write_str(": ")?;
            detail.fmt(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}
