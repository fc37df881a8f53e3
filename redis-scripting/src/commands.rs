use crate::cmd::{cmd, Cmd};
use crate::connection::ConnectionLike;
use crate::script::ScriptDigest;
use crate::types::{RedisFuture, RedisWrite, ToRedisArgs, Value};

/// Mode for `SCRIPT FLUSH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushMode {
    /// Flush in a background thread.
    Async,
    /// Flush before returning.
    Sync,
}

impl ToRedisArgs for FlushMode {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match self {
            FlushMode::Async => out.write_arg(b"ASYNC"),
            FlushMode::Sync => out.write_arg(b"SYNC"),
        }
    }
}

// `numkeys` is derived from the flattened keys, so a `Vec<&str>` of three
// keys counts as three.
fn script_call<T, K, A>(name: &str, target: T, keys: K, args: A) -> Cmd
where
    T: ToRedisArgs,
    K: ToRedisArgs,
    A: ToRedisArgs,
{
    let keys = keys.to_redis_args();
    let mut rv = cmd(name);
    rv.arg(target).arg(keys.len()).arg(keys).arg(args);
    rv
}

impl Cmd {
    /// `EVAL script numkeys key [key ...] arg [arg ...]`
    pub fn eval<K: ToRedisArgs, A: ToRedisArgs>(script: &[u8], keys: K, args: A) -> Cmd {
        script_call("EVAL", script, keys, args)
    }

    /// `EVALSHA sha1 numkeys key [key ...] arg [arg ...]`
    pub fn evalsha<K: ToRedisArgs, A: ToRedisArgs>(digest: &ScriptDigest, keys: K, args: A) -> Cmd {
        script_call("EVALSHA", digest, keys, args)
    }

    /// `SCRIPT LOAD script`
    pub fn script_load(script: &[u8]) -> Cmd {
        let mut rv = cmd("SCRIPT");
        rv.arg("LOAD").arg(script);
        rv
    }

    /// `SCRIPT EXISTS sha1 [sha1 ...]`
    pub fn script_exists<D: AsRef<str>>(digests: &[D]) -> Cmd {
        let mut rv = cmd("SCRIPT");
        rv.arg("EXISTS");
        for digest in digests {
            rv.arg(digest.as_ref());
        }
        rv
    }

    /// `SCRIPT FLUSH [ASYNC|SYNC]`
    pub fn script_flush(mode: Option<FlushMode>) -> Cmd {
        let mut rv = cmd("SCRIPT");
        rv.arg("FLUSH").arg(mode);
        rv
    }

    /// `SCRIPT KILL`
    pub fn script_kill() -> Cmd {
        let mut rv = cmd("SCRIPT");
        rv.arg("KILL");
        rv
    }
}

/// The raw scripting commands, sent as-is without consulting any digest
/// cache. Implemented for every [`ConnectionLike`].
///
/// Most callers want [`crate::ScriptingConnection`], which tracks loaded
/// digests and recovers from `NOSCRIPT`.
pub trait AsyncScriptCommands: ConnectionLike + Send + Sized {
    /// Evaluates a script with `EVAL`. The reply is returned undecoded;
    /// error replies are returned as `Err`.
    fn eval<'a, K, A>(&'a mut self, script: &'a [u8], keys: K, args: A) -> RedisFuture<'a, Value>
    where
        K: ToRedisArgs + Send + 'a,
        A: ToRedisArgs + Send + 'a,
    {
        Box::pin(async move { Cmd::eval(script, keys, args).query_async(self).await })
    }

    /// Evaluates a loaded script by digest with `EVALSHA`.
    fn evalsha<'a, K, A>(&'a mut self, digest: &'a str, keys: K, args: A) -> RedisFuture<'a, Value>
    where
        K: ToRedisArgs + Send + 'a,
        A: ToRedisArgs + Send + 'a,
    {
        Box::pin(async move {
            let digest: ScriptDigest = digest.parse()?;
            Cmd::evalsha(&digest, keys, args).query_async(self).await
        })
    }

    /// Loads a script and returns the digest the server reports.
    fn script_load<'a>(&'a mut self, script: &'a [u8]) -> RedisFuture<'a, String> {
        Box::pin(async move { Cmd::script_load(script).query_async(self).await })
    }

    /// Checks which digests are loaded, in request order.
    fn script_exists<'a, D>(&'a mut self, digests: &'a [D]) -> RedisFuture<'a, Vec<bool>>
    where
        D: AsRef<str> + Sync,
    {
        Box::pin(async move { Cmd::script_exists(digests).query_async(self).await })
    }

    /// Removes all scripts from the server's script cache.
    fn script_flush(&mut self, mode: Option<FlushMode>) -> RedisFuture<'_, String> {
        Box::pin(async move { Cmd::script_flush(mode).query_async(self).await })
    }

    /// Kills the script currently running on the server.
    fn script_kill(&mut self) -> RedisFuture<'_, String> {
        Box::pin(async move { Cmd::script_kill().query_async(self).await })
    }
}

impl<T> AsyncScriptCommands for T where T: ConnectionLike + Send + Sized {}
