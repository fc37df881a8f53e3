use std::{borrow::Cow, fmt, str::Utf8Error, string::FromUtf8Error};

/// Describes a reply that could not be converted into the requested type.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsingError {
    pub(crate) description: Cow<'static, str>,
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Incompatible type - ")?;
        self.description.fmt(f)
    }
}

impl std::error::Error for ParsingError {}

impl From<Utf8Error> for ParsingError {
    fn from(_: Utf8Error) -> ParsingError {
        ParsingError {
            description: "Invalid UTF-8".into(),
        }
    }
}

impl From<FromUtf8Error> for ParsingError {
    fn from(_: FromUtf8Error) -> ParsingError {
        ParsingError {
            description: "Cannot convert from UTF-8".into(),
        }
    }
}
