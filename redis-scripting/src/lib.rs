//! redis-scripting runs Lua scripts on a Redis server through `EVAL` and
//! `EVALSHA`, keeping track of which scripts the server already knows so
//! that repeated calls only send a 40 character digest.
//!
//! The crate does not own a socket. It drives any type implementing
//! [`ConnectionLike`], an async request channel that takes a [`Cmd`] and
//! resolves to the single reply [`Value`].
//!
//! # Basic Operation
//!
//! Wrap the connection in a [`ScriptingConnection`] and call
//! [`eval`](ScriptingConnection::eval). The first call for a body sends
//! `EVAL`; once it succeeds the digest is marked loaded and later calls send
//! `EVALSHA`. If the server has lost the script in the meantime it answers
//! `NOSCRIPT` and the call is repeated once with `EVAL`.
//!
//! ```rust,no_run
//! use redis_scripting::{ConnectionLike, OutputType, ScriptingConnection};
//!
//! async fn incr_by<C: ConnectionLike + Send>(
//!     con: &mut ScriptingConnection<C>,
//!     key: &str,
//!     by: i64,
//! ) -> redis_scripting::RedisResult<i64> {
//!     con.eval(
//!         "return redis.call('INCRBY', KEYS[1], ARGV[1])",
//!         OutputType::Integer,
//!         key,
//!         by,
//!     )
//!     .await
//! }
//! ```
//!
//! A script returns whatever Lua hands back, so every call names the
//! expected [`OutputType`]. The reply is checked against it and decoded into
//! a [`ScriptOutput`], which is then converted into the requested Rust type
//! through [`FromScriptOutput`]. A reply of a different shape is an error of
//! kind [`ErrorKind::DecodeMismatch`].
//!
//! ## Scripts by digest
//!
//! [`evalsha`](ScriptingConnection::evalsha) runs a script by digest alone.
//! If the server answers `NOSCRIPT`, the body is resent with `EVAL` when this
//! connection has seen it before (through `eval`, `script_load` or a
//! [`Script`]); otherwise the call fails with [`ErrorKind::ScriptNotCached`].
//!
//! ## Script objects
//!
//! [`Script`] computes the digest once and collects keys and arguments with
//! a builder:
//!
//! ```rust,no_run
//! # use redis_scripting::{ConnectionLike, OutputType, Script, ScriptingConnection};
//! # async fn run<C: ConnectionLike + Send>(con: &mut ScriptingConnection<C>) -> redis_scripting::RedisResult<()> {
//! let script = Script::new("return {KEYS[1], ARGV[1]}");
//! let reply: Vec<String> = script
//!     .key("name")
//!     .arg("value")
//!     .invoke_async(con, OutputType::Multi)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Raw commands
//!
//! [`AsyncScriptCommands`] is implemented for every [`ConnectionLike`] and
//! sends the scripting commands as they are, without consulting the cache.
//!
//! ## Optional Features
//!
//! * `bytes`: accepts and returns `bytes::Bytes` (optional)
//!
//! ## Logging
//!
//! Requests are logged at `trace` level through the `log` crate, `NOSCRIPT`
//! fallbacks and cache flushes at `debug`.

#![deny(non_camel_case_types)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, warn(rustdoc::broken_intra_doc_links))]
#![cfg_attr(docsrs, feature(doc_cfg))]

// public api
pub use crate::cache::ScriptCache;
pub use crate::cmd::{cmd, pack_command, Cmd};
pub use crate::commands::{AsyncScriptCommands, FlushMode};
pub use crate::config::ScriptingConfig;
pub use crate::connection::ConnectionLike;
pub use crate::output::{FromScriptOutput, OutputType, ScriptOutput};
pub use crate::script::{digest, Script, ScriptDigest, ScriptInvocation, DIGEST_LEN};
pub use crate::scripting::ScriptingConnection;

pub use crate::types::{
    // utility functions
    from_owned_redis_value,
    from_redis_value,

    // error kinds
    ErrorKind,
    ParsingError,
    RedisError,
    ServerError,
    ServerErrorKind,

    // conversion traits
    FromRedisValue,

    // utility types
    RedisFuture,
    RedisResult,
    RedisWrite,
    ToRedisArgs,

    // low level values
    Value,
};

mod macros;

mod cache;
mod cmd;
mod commands;
mod config;
mod connection;
mod errors;
mod output;
mod script;
mod scripting;
mod types;
