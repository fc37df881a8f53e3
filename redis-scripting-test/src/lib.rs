//! Testing support
//!
//! This module provides `MockScriptConnection` which implements
//! `ConnectionLike` and can be wrapped in a `ScriptingConnection` like any
//! other connection. It checks that the exact sequence of expected commands
//! is sent, which makes the `EVAL`/`EVALSHA` choices of the digest cache
//! visible in unit tests without a Redis server.
//!
//! # Example
//!
//! ```rust
//! use redis_scripting::{Cmd, OutputType, ScriptDigest, ScriptingConnection};
//! use redis_scripting_test::{MockCmd, MockScriptConnection};
//!
//! let mock = MockScriptConnection::new(vec![
//!     MockCmd::new(Cmd::eval(b"return 1", (), ()), Ok(1)),
//!     MockCmd::new(Cmd::evalsha(&ScriptDigest::of("return 1"), (), ()), Ok(1)),
//! ])
//! .assert_all_commands_consumed();
//!
//! let mut con = ScriptingConnection::new(mock);
//! futures::executor::block_on(async {
//!     let first: i64 = con.eval("return 1", OutputType::Integer, (), ()).await.unwrap();
//!     let second: i64 = con.eval("return 1", OutputType::Integer, (), ()).await.unwrap();
//!     assert_eq!((first, second), (1, 1));
//! });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::{future, FutureExt};

use redis_scripting::{
    Cmd, ConnectionLike, ErrorKind, RedisError, RedisFuture, RedisResult, ServerError, Value,
};

/// Helper trait for converting test values into a `redis_scripting::Value`
/// returned from a `MockScriptConnection`.
pub trait IntoRedisValue {
    /// Convert a value into `redis_scripting::Value`.
    fn into_redis_value(self) -> Value;
}

// Script integers are 64 bit; `i32` keeps bare literals like `Ok(1)` working.
impl IntoRedisValue for i32 {
    fn into_redis_value(self) -> Value {
        Value::Int(self.into())
    }
}

impl IntoRedisValue for i64 {
    fn into_redis_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoRedisValue for &str {
    fn into_redis_value(self) -> Value {
        Value::BulkString(self.as_bytes().to_vec())
    }
}

impl IntoRedisValue for Vec<u8> {
    fn into_redis_value(self) -> Value {
        Value::BulkString(self)
    }
}

impl IntoRedisValue for Value {
    fn into_redis_value(self) -> Value {
        self
    }
}

impl IntoRedisValue for ServerError {
    fn into_redis_value(self) -> Value {
        Value::ServerError(self)
    }
}

/// Builds the [`Value`] a script reply decodes to.
///
/// * integers, `&str` and other [`IntoRedisValue`] types
/// * `nil` for a Lua `false` or `nil` reply
/// * `ok` for `redis.status_reply('OK')`
/// * `status:"PONG"` for other status replies, in parentheses inside arrays
/// * `[..]` for Lua tables
///
/// ```rust
/// use redis_scripting::Value;
/// use redis_scripting_test::redis_value;
///
/// assert_eq!(
///     redis_value!([1, "two", nil, (status:"QUEUED")]),
///     Value::Array(vec![
///         Value::Int(1),
///         Value::BulkString(b"two".to_vec()),
///         Value::Nil,
///         Value::SimpleString("QUEUED".into()),
///     ])
/// );
/// ```
#[macro_export]
macro_rules! redis_value {
    ([$($e:tt),* $(,)?]) => {
        ::redis_scripting::Value::Array(vec![$($crate::redis_value!($e)),*])
    };

    (($($inner:tt)*)) => {
        $crate::redis_value!($($inner)*)
    };

    (status:$e:expr) => {
        ::redis_scripting::Value::SimpleString($e.to_string())
    };

    (nil) => {
        ::redis_scripting::Value::Nil
    };

    (ok) => {
        ::redis_scripting::Value::Okay
    };

    ($e:expr) => {
        $crate::IntoRedisValue::into_redis_value($e)
    };
}

/// Builds the error a server sends for `EVALSHA` of an unknown digest.
pub fn no_script_error() -> RedisError {
    ServerError::parse("NOSCRIPT No matching script. Please use EVAL.").into()
}

/// Builds the error a server sends for `SCRIPT KILL` while no script runs.
pub fn not_busy_error() -> RedisError {
    ServerError::parse("NOTBUSY No scripts in execution right now.").into()
}

/// Helper trait for converting `Cmd` instances into encoded byte vectors.
pub trait IntoRedisCmdBytes {
    /// Convert a command into an encoded byte vector.
    fn into_redis_cmd_bytes(self) -> Vec<u8>;
}

impl IntoRedisCmdBytes for Cmd {
    fn into_redis_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

impl IntoRedisCmdBytes for &Cmd {
    fn into_redis_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

impl IntoRedisCmdBytes for &mut Cmd {
    fn into_redis_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

/// Represents a command to be executed against a `MockScriptConnection`.
pub struct MockCmd {
    cmd_bytes: Vec<u8>,
    response: RedisResult<Value>,
}

impl MockCmd {
    /// Create a new `MockCmd` given a command and either a value convertible to
    /// a `redis_scripting::Value` or a `RedisError`.
    pub fn new<C, V>(cmd: C, response: Result<V, RedisError>) -> Self
    where
        C: IntoRedisCmdBytes,
        V: IntoRedisValue,
    {
        MockCmd {
            cmd_bytes: cmd.into_redis_cmd_bytes(),
            response: response.map(IntoRedisValue::into_redis_value),
        }
    }
}

/// A mock connection for testing without a server. `MockScriptConnection` checks whether the
/// client submits a specific sequence of commands and generates an error if it does not.
///
/// Clones share the command queue and the request counter.
#[derive(Clone)]
pub struct MockScriptConnection {
    commands: Arc<Mutex<VecDeque<MockCmd>>>,
    requests: Arc<AtomicUsize>,
    assert_is_empty_on_drop: bool,
}

impl MockScriptConnection {
    /// Construct a new from the given sequence of commands.
    pub fn new<I>(commands: I) -> Self
    where
        I: IntoIterator<Item = MockCmd>,
    {
        MockScriptConnection {
            commands: Arc::new(Mutex::new(VecDeque::from_iter(commands))),
            requests: Arc::new(AtomicUsize::new(0)),
            assert_is_empty_on_drop: false,
        }
    }

    /// Enable assertion to ensure all commands have been consumed
    pub fn assert_all_commands_consumed(mut self) -> Self {
        self.assert_is_empty_on_drop = true;
        self
    }

    /// Returns true once every expected command has been sent.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().unwrap().is_empty()
    }

    /// Number of requests received so far, expected or not.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn respond(&mut self, cmd: &[u8]) -> RedisResult<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut commands = self.commands.lock().unwrap();
        let next_cmd = commands.pop_front().ok_or_else(|| {
            self.assert_is_empty_on_drop = false;
            RedisError::from((
                ErrorKind::ClientError,
                "TEST",
                format!(
                    "unexpected command: {}",
                    String::from_utf8_lossy(cmd).escape_debug()
                ),
            ))
        })?;

        if cmd != next_cmd.cmd_bytes {
            self.assert_is_empty_on_drop = false;
            return Err(RedisError::from((
                ErrorKind::ClientError,
                "TEST",
                format!(
                    "unexpected command: expected={}, actual={}",
                    String::from_utf8_lossy(&next_cmd.cmd_bytes).escape_debug(),
                    String::from_utf8_lossy(cmd).escape_debug(),
                ),
            )));
        }

        next_cmd.response
    }
}

impl Drop for MockScriptConnection {
    fn drop(&mut self) {
        if self.assert_is_empty_on_drop && Arc::strong_count(&self.commands) == 1 {
            let commands = self.commands.lock().unwrap();
            assert!(
                commands.is_empty(),
                "{} expected commands were never sent",
                commands.len()
            );
        }
    }
}

impl ConnectionLike for MockScriptConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let response = self.respond(&cmd.get_packed_command());
        future::ready(response).boxed()
    }
}
