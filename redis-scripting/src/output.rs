//! Decoding of script results.
//!
//! A script may return anything, so the caller declares the expected shape
//! with an [`OutputType`] on every call. The raw reply is checked against it
//! and turned into a [`ScriptOutput`]; a reply of any other shape is a
//! [`ErrorKind::DecodeMismatch`] error, never a silently coerced default.

use std::str::from_utf8;

use crate::types::{ErrorKind, RedisError, RedisResult, Value};

/// Declares how the reply of a script must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// A status reply, decoded into a string.
    Status,
    /// An integer reply coerced to a boolean: `0` is false, anything else
    /// is true. Lua `false` reaches the client as nil and decodes to false.
    Boolean,
    /// A signed 64 bit integer.
    Integer,
    /// An array; each element is decoded by its own shape.
    Multi,
    /// A single scalar value, kept as raw bytes.
    Value,
}

/// A decoded script result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutput {
    /// The script returned nil.
    Nil,
    /// A status string.
    Status(String),
    /// A boolean.
    Boolean(bool),
    /// An integer.
    Integer(i64),
    /// A binary-safe scalar.
    Value(Vec<u8>),
    /// An ordered sequence of decoded values.
    Multi(Vec<ScriptOutput>),
}

impl OutputType {
    /// Decodes a raw reply according to this output type.
    ///
    /// Nil is accepted for every type: it means false for [`OutputType::Boolean`]
    /// and [`ScriptOutput::Nil`] otherwise.
    pub fn decode(self, value: Value) -> RedisResult<ScriptOutput> {
        match (self, value) {
            (_, Value::ServerError(err)) => Err(err.into()),
            (OutputType::Boolean, Value::Nil) => Ok(ScriptOutput::Boolean(false)),
            (_, Value::Nil) => Ok(ScriptOutput::Nil),

            (OutputType::Status, Value::SimpleString(s)) => Ok(ScriptOutput::Status(s)),
            (OutputType::Status, Value::Okay) => Ok(ScriptOutput::Status("OK".to_string())),
            (OutputType::Status, Value::BulkString(bytes)) => {
                Ok(ScriptOutput::Status(String::from_utf8(bytes)?))
            }

            (OutputType::Boolean, Value::Int(i)) => Ok(ScriptOutput::Boolean(i != 0)),
            (OutputType::Boolean, Value::Boolean(b)) => Ok(ScriptOutput::Boolean(b)),

            (OutputType::Integer, Value::Int(i)) => Ok(ScriptOutput::Integer(i)),

            (OutputType::Value, Value::BulkString(bytes)) => Ok(ScriptOutput::Value(bytes)),
            (OutputType::Value, Value::SimpleString(s)) => Ok(ScriptOutput::Value(s.into_bytes())),
            (OutputType::Value, Value::Okay) => Ok(ScriptOutput::Value(b"OK".to_vec())),

            (OutputType::Multi, Value::Array(items)) => items
                .into_iter()
                .map(decode_element)
                .collect::<RedisResult<Vec<_>>>()
                .map(ScriptOutput::Multi),

            (output, value) => invalid_type_error!(
                value,
                format!("Reply does not match output type {output:?}.")
            ),
        }
    }
}

/// Decodes a nested element of a multi reply by its own shape.
fn decode_element(value: Value) -> RedisResult<ScriptOutput> {
    Ok(match value {
        Value::Nil => ScriptOutput::Nil,
        Value::Int(i) => ScriptOutput::Integer(i),
        Value::BulkString(bytes) => ScriptOutput::Value(bytes),
        Value::SimpleString(s) => ScriptOutput::Status(s),
        Value::Okay => ScriptOutput::Status("OK".to_string()),
        Value::Boolean(b) => ScriptOutput::Boolean(b),
        Value::Array(items) => ScriptOutput::Multi(
            items
                .into_iter()
                .map(decode_element)
                .collect::<RedisResult<_>>()?,
        ),
        Value::ServerError(err) => return Err(err.into()),
    })
}

/// Conversion of a decoded script result into a Rust type.
///
/// Implemented for [`ScriptOutput`] itself, the integer types, `bool` and
/// `String`, plus `Option<T>` and `Vec<T>` over those. `Vec<u8>` reads a
/// binary scalar rather than a list.
pub trait FromScriptOutput: Sized {
    /// Converts the decoded output, failing with
    /// [`ErrorKind::DecodeMismatch`] when the shapes do not agree.
    fn from_script_output(output: ScriptOutput) -> RedisResult<Self>;

    /// Converts a binary scalar into a vector of `Self`. Only `u8` accepts
    /// it, which is what lets `Vec<u8>` read [`ScriptOutput::Value`].
    #[doc(hidden)]
    fn from_script_bytes(bytes: Vec<u8>) -> Result<Vec<Self>, Vec<u8>> {
        Err(bytes)
    }
}

impl FromScriptOutput for ScriptOutput {
    fn from_script_output(output: ScriptOutput) -> RedisResult<Self> {
        Ok(output)
    }
}

macro_rules! from_script_output_for_int {
    ($t:ty) => {
        impl FromScriptOutput for $t {
            fn from_script_output(output: ScriptOutput) -> RedisResult<$t> {
                match output {
                    ScriptOutput::Integer(i) => match <$t>::try_from(i) {
                        Ok(rv) => Ok(rv),
                        Err(_) => invalid_type_error!(output, "Integer out of range."),
                    },
                    _ => invalid_type_error!(output, "Output not convertible to integer."),
                }
            }
        }
    };
}

from_script_output_for_int!(i64);
from_script_output_for_int!(isize);
from_script_output_for_int!(i32);
from_script_output_for_int!(u64);
from_script_output_for_int!(usize);

impl FromScriptOutput for bool {
    fn from_script_output(output: ScriptOutput) -> RedisResult<bool> {
        match output {
            ScriptOutput::Boolean(b) => Ok(b),
            _ => invalid_type_error!(output, "Output not convertible to bool."),
        }
    }
}

impl FromScriptOutput for String {
    fn from_script_output(output: ScriptOutput) -> RedisResult<String> {
        match output {
            ScriptOutput::Status(s) => Ok(s),
            ScriptOutput::Value(bytes) => Ok(from_utf8(&bytes)?.to_string()),
            _ => invalid_type_error!(output, "Output not convertible to string."),
        }
    }
}

impl FromScriptOutput for u8 {
    fn from_script_output(output: ScriptOutput) -> RedisResult<u8> {
        match output {
            ScriptOutput::Integer(i) => match u8::try_from(i) {
                Ok(rv) => Ok(rv),
                Err(_) => invalid_type_error!(output, "Integer out of range."),
            },
            _ => invalid_type_error!(output, "Output not convertible to integer."),
        }
    }

    fn from_script_bytes(bytes: Vec<u8>) -> Result<Vec<u8>, Vec<u8>> {
        Ok(bytes)
    }
}

impl<T: FromScriptOutput> FromScriptOutput for Option<T> {
    fn from_script_output(output: ScriptOutput) -> RedisResult<Option<T>> {
        match output {
            ScriptOutput::Nil => Ok(None),
            output => T::from_script_output(output).map(Some),
        }
    }
}

#[cfg(feature = "bytes")]
impl FromScriptOutput for bytes::Bytes {
    fn from_script_output(output: ScriptOutput) -> RedisResult<bytes::Bytes> {
        Vec::<u8>::from_script_output(output).map(bytes::Bytes::from)
    }
}

impl<T: FromScriptOutput> FromScriptOutput for Vec<T> {
    fn from_script_output(output: ScriptOutput) -> RedisResult<Vec<T>> {
        match output {
            ScriptOutput::Multi(items) => items.into_iter().map(T::from_script_output).collect(),
            ScriptOutput::Value(bytes) => match T::from_script_bytes(bytes) {
                Ok(rv) => Ok(rv),
                Err(bytes) => invalid_type_error!(
                    ScriptOutput::Value(bytes),
                    "Output not convertible to a sequence."
                ),
            },
            ScriptOutput::Status(s) => match T::from_script_bytes(s.into_bytes()) {
                Ok(rv) => Ok(rv),
                Err(bytes) => invalid_type_error!(
                    String::from_utf8_lossy(&bytes),
                    "Output not convertible to a sequence."
                ),
            },
            _ => invalid_type_error!(output, "Output not convertible to a sequence."),
        }
    }
}
