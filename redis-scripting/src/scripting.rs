use log::{debug, trace, warn};

use crate::cache::ScriptCache;
use crate::cmd::Cmd;
use crate::commands::FlushMode;
use crate::config::ScriptingConfig;
use crate::connection::ConnectionLike;
use crate::output::{FromScriptOutput, OutputType};
use crate::script::{Script, ScriptDigest};
use crate::types::{from_owned_redis_value, ErrorKind, RedisResult, ToRedisArgs, Value};

/// A connection wrapper that runs Lua scripts through a digest cache.
///
/// Scripts known to be loaded on the server are sent as `EVALSHA`, so only
/// the 40 byte digest travels over the wire; everything else is sent as
/// `EVAL` with the full body, after which the digest is marked loaded. When
/// the server answers `NOSCRIPT` (the script cache was flushed, or the
/// server restarted) the call is retried exactly once with `EVAL`.
///
/// Cloning is cheap when `C` is a cheap handle, such as a multiplexed
/// connection. All clones share one [`ScriptCache`].
///
/// ```rust,no_run
/// # use redis_scripting::{ConnectionLike, OutputType, ScriptingConnection};
/// # async fn run<C: ConnectionLike + Send>(con: C) -> redis_scripting::RedisResult<()> {
/// let mut con = ScriptingConnection::new(con);
/// // First call ships the body with EVAL.
/// let n: i64 = con.eval("return #KEYS", OutputType::Integer, &["a", "b"], ()).await?;
/// assert_eq!(n, 2);
/// // Second call only sends the digest with EVALSHA.
/// let n: i64 = con.eval("return #KEYS", OutputType::Integer, &["a"], ()).await?;
/// assert_eq!(n, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ScriptingConnection<C> {
    con: C,
    cache: ScriptCache,
    config: ScriptingConfig,
}

impl<C> ScriptingConnection<C> {
    /// Wraps `con` with an empty cache and the default configuration.
    pub fn new(con: C) -> Self {
        Self::with_config(con, ScriptingConfig::default())
    }

    /// Wraps `con` with an empty cache and the given configuration.
    pub fn with_config(con: C, config: ScriptingConfig) -> Self {
        ScriptingConnection {
            con,
            cache: ScriptCache::with_max_bodies(config.max_retained_bodies),
            config,
        }
    }

    /// Returns the digest cache shared by this connection and its clones.
    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ScriptingConfig {
        &self.config
    }

    /// Gets a reference to the underlying connection.
    pub fn get_ref(&self) -> &C {
        &self.con
    }

    /// Gets a mutable reference to the underlying connection.
    ///
    /// Scripting commands sent directly through it bypass the cache; a
    /// `SCRIPT FLUSH` sent this way is only noticed on the next `NOSCRIPT`.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.con
    }

    /// Unwraps the underlying connection, dropping this handle's reference
    /// to the cache.
    pub fn into_inner(self) -> C {
        self.con
    }

    /// Computes the digest of a script without any I/O.
    pub fn digest(&self, script: impl AsRef<[u8]>) -> String {
        crate::script::digest(script)
    }
}

impl<C> ScriptingConnection<C>
where
    C: ConnectionLike + Send,
{
    async fn request(&mut self, cmd: &Cmd) -> RedisResult<Value> {
        trace!("script request {:?}", cmd.name());
        self.con.req_packed_command(cmd).await?.extract_error()
    }

    /// Evaluates a script given as text or bytes, decoding the reply as
    /// `output`.
    ///
    /// `EVALSHA` is tried first when the digest is believed loaded, with a
    /// single `EVAL` fallback on `NOSCRIPT`. Keys and values are forwarded
    /// in order; each element of a vector or slice becomes one `KEYS[i]` or
    /// `ARGV[i]`.
    pub async fn eval<T, S, K, A>(
        &mut self,
        script: S,
        output: OutputType,
        keys: K,
        args: A,
    ) -> RedisResult<T>
    where
        T: FromScriptOutput,
        S: AsRef<[u8]>,
        K: ToRedisArgs,
        A: ToRedisArgs,
    {
        let script = Script::new(script);
        self.eval_script(&script, output, keys, args).await
    }

    pub(crate) async fn eval_script<T, K, A>(
        &mut self,
        script: &Script,
        output: OutputType,
        keys: K,
        args: A,
    ) -> RedisResult<T>
    where
        T: FromScriptOutput,
        K: ToRedisArgs,
        A: ToRedisArgs,
    {
        let digest = script.digest();
        let keys = keys.to_redis_args();
        let args = args.to_redis_args();
        if self.config.retain_script_bodies {
            self.cache.remember(digest, script.shared_code());
        }

        let value = if self.config.use_evalsha_on_cache_hit && self.cache.is_loaded(digest) {
            let evalsha = Cmd::evalsha(digest, &keys, &args);
            match self.request(&evalsha).await {
                Err(err) if err.is_no_script() => {
                    debug!("Script {digest} is no longer loaded, falling back to EVAL");
                    self.cache.forget(digest);
                    self.request(&Cmd::eval(script.code(), &keys, &args))
                        .await?
                }
                rv => rv?,
            }
        } else {
            self.request(&Cmd::eval(script.code(), &keys, &args))
                .await?
        };

        self.cache.mark_loaded(digest);
        T::from_script_output(output.decode(value)?)
    }

    /// Evaluates a script by digest with `EVALSHA`.
    ///
    /// On `NOSCRIPT` the call is retried once with `EVAL` if this connection
    /// has seen the body for `digest`; otherwise it fails with
    /// [`ErrorKind::ScriptNotCached`]. A malformed digest is rejected with
    /// [`ErrorKind::ClientError`] before anything is sent.
    pub async fn evalsha<T, K, A>(
        &mut self,
        digest: &str,
        output: OutputType,
        keys: K,
        args: A,
    ) -> RedisResult<T>
    where
        T: FromScriptOutput,
        K: ToRedisArgs,
        A: ToRedisArgs,
    {
        let digest: ScriptDigest = digest.parse()?;
        let keys = keys.to_redis_args();
        let args = args.to_redis_args();

        let evalsha = Cmd::evalsha(&digest, &keys, &args);
        let value = match self.request(&evalsha).await {
            Err(err) if err.is_no_script() => {
                self.cache.forget(&digest);
                let Some(body) = self.cache.body(&digest) else {
                    fail!((
                        ErrorKind::ScriptNotCached,
                        "Script not cached",
                        format!("the server does not know {digest} and no body was seen for it"),
                    ));
                };
                debug!("Script {digest} is not loaded, falling back to EVAL");
                self.request(&Cmd::eval(&body, &keys, &args)).await?
            }
            rv => rv?,
        };

        self.cache.mark_loaded(&digest);
        T::from_script_output(output.decode(value)?)
    }

    pub(crate) async fn load_script(&mut self, script: &Script) -> RedisResult<ScriptDigest> {
        let local = script.digest();
        if self.config.retain_script_bodies {
            self.cache.remember(local, script.shared_code());
        }

        let reply: String =
            from_owned_redis_value(self.request(&Cmd::script_load(script.code())).await?)?;
        let reported = ScriptDigest::parse(&reply)?;
        if &reported != local {
            warn!("SCRIPT LOAD reported digest {reported}, expected {local}");
        }

        self.cache.mark_loaded(&reported);
        Ok(reported)
    }

    /// Loads a script into the server's script cache without running it
    /// and returns the digest the server reports.
    pub async fn script_load(&mut self, script: impl AsRef<[u8]>) -> RedisResult<String> {
        let script = Script::new(script);
        self.load_script(&script).await.map(String::from)
    }

    /// Checks which digests are loaded on the server. The result has one
    /// entry per digest, in request order.
    pub async fn script_exists<D>(&mut self, digests: &[D]) -> RedisResult<Vec<bool>>
    where
        D: AsRef<str>,
    {
        if digests.is_empty() {
            return Ok(vec![]);
        }

        let reply: Vec<bool> =
            from_owned_redis_value(self.request(&Cmd::script_exists(digests)).await?)?;
        if reply.len() != digests.len() {
            fail!((
                ErrorKind::DecodeMismatch,
                "Unexpected SCRIPT EXISTS reply",
                format!("asked for {} digests, got {}", digests.len(), reply.len()),
            ));
        }
        Ok(reply)
    }

    /// Removes every script from the server's script cache. Once the server
    /// acknowledges, the local cache is cleared as well.
    pub async fn script_flush(&mut self, mode: Option<FlushMode>) -> RedisResult<String> {
        let reply: String = from_owned_redis_value(self.request(&Cmd::script_flush(mode)).await?)?;
        debug!("Script cache flushed, forgetting {} digests", self.cache.len());
        self.cache.clear();
        Ok(reply)
    }

    /// Kills the script currently running on the server. Fails with an error
    /// for which [`crate::RedisError::is_server_busy`] is true when nothing is
    /// running.
    pub async fn script_kill(&mut self) -> RedisResult<String> {
        from_owned_redis_value(self.request(&Cmd::script_kill()).await?)
    }
}
