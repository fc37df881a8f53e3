use std::fmt;
use std::sync::Arc;

use sha1_smol::Sha1;

use crate::connection::ConnectionLike;
use crate::output::{FromScriptOutput, OutputType};
use crate::scripting::ScriptingConnection;
use crate::types::{ErrorKind, RedisError, RedisResult, RedisWrite, ToRedisArgs};

/// Length of a hex encoded SHA1 digest.
pub const DIGEST_LEN: usize = 40;

/// Computes the digest the server uses to identify a script: the SHA1 of
/// the body bytes, as 40 lowercase hex characters.
///
/// Text scripts are hashed as their UTF-8 bytes, which is also what gets
/// sent with `EVAL` and `SCRIPT LOAD`.
///
/// ```rust
/// assert_eq!(
///     redis_scripting::digest("return 1"),
///     "e0e1f9fabfc9d4800c877a703b823ac0578ff8db"
/// );
/// ```
pub fn digest(script: impl AsRef<[u8]>) -> String {
    let mut hash = Sha1::new();
    hash.update(script.as_ref());
    hash.digest().to_string()
}

/// A validated script digest.
///
/// Digests are compared in lowercase; `parse` normalizes upper case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptDigest(String);

impl ScriptDigest {
    /// Computes the digest of a script body.
    pub fn of(script: impl AsRef<[u8]>) -> ScriptDigest {
        ScriptDigest(digest(script))
    }

    /// Validates a digest received from a caller or the server.
    pub fn parse(digest: &str) -> RedisResult<ScriptDigest> {
        if digest.len() != DIGEST_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            fail!((
                ErrorKind::ClientError,
                "Invalid script digest",
                format!("expected {DIGEST_LEN} hex characters, got {digest:?}"),
            ));
        }
        Ok(ScriptDigest(digest.to_ascii_lowercase()))
    }

    /// Returns the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScriptDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ScriptDigest> for String {
    fn from(digest: ScriptDigest) -> String {
        digest.0
    }
}

impl ToRedisArgs for ScriptDigest {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.0.as_bytes())
    }
}

impl std::str::FromStr for ScriptDigest {
    type Err = RedisError;

    fn from_str(s: &str) -> RedisResult<ScriptDigest> {
        ScriptDigest::parse(s)
    }
}

/// Represents a lua script.
#[derive(Debug, Clone)]
pub struct Script {
    code: Arc<[u8]>,
    hash: ScriptDigest,
}

/// The script object represents a lua script that can be executed on the
/// redis server.  The object itself takes care of automatic uploading and
/// execution through a [`ScriptingConnection`].  The script object itself
/// can be shared and is immutable.
///
/// Example:
///
/// ```rust,no_run
/// # use redis_scripting::{ConnectionLike, OutputType, Script, ScriptingConnection};
/// # async fn run<C: ConnectionLike + Send>(con: &mut ScriptingConnection<C>) -> redis_scripting::RedisResult<()> {
/// let script = Script::new(r"
///     return tonumber(ARGV[1]) + tonumber(ARGV[2]);
/// ");
/// let result: i64 = script
///     .arg(1)
///     .arg(2)
///     .invoke_async(con, OutputType::Integer)
///     .await?;
/// assert_eq!(result, 3);
/// # Ok(())
/// # }
/// ```
impl Script {
    /// Creates a new script object from text or raw bytes.
    pub fn new(code: impl AsRef<[u8]>) -> Script {
        let code = code.as_ref();
        Script {
            hash: ScriptDigest::of(code),
            code: Arc::from(code),
        }
    }

    /// Returns the script's SHA1 hash in hexadecimal format.
    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    /// Returns the script's digest.
    pub fn digest(&self) -> &ScriptDigest {
        &self.hash
    }

    /// Returns the script body.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub(crate) fn shared_code(&self) -> Arc<[u8]> {
        self.code.clone()
    }

    /// Creates a script invocation object with a key filled in.
    #[inline]
    pub fn key<T: ToRedisArgs>(&self, key: T) -> ScriptInvocation<'_> {
        ScriptInvocation {
            script: self,
            args: vec![],
            keys: key.to_redis_args(),
        }
    }

    /// Creates a script invocation object with an argument filled in.
    #[inline]
    pub fn arg<T: ToRedisArgs>(&self, arg: T) -> ScriptInvocation<'_> {
        ScriptInvocation {
            script: self,
            args: arg.to_redis_args(),
            keys: vec![],
        }
    }

    /// Returns an empty script invocation object.  This is primarily useful
    /// for programmatically adding arguments and keys because the type will
    /// not change.  Normally you can use `arg` and `key` directly.
    #[inline]
    pub fn prepare_invoke(&self) -> ScriptInvocation<'_> {
        ScriptInvocation {
            script: self,
            args: vec![],
            keys: vec![],
        }
    }

    /// Invokes the script without keys or arguments.
    #[inline]
    pub async fn invoke_async<C, T>(
        &self,
        con: &mut ScriptingConnection<C>,
        output: OutputType,
    ) -> RedisResult<T>
    where
        C: ConnectionLike + Send,
        T: FromScriptOutput,
    {
        self.prepare_invoke().invoke_async(con, output).await
    }
}

/// Represents a prepared script call.
pub struct ScriptInvocation<'a> {
    script: &'a Script,
    args: Vec<Vec<u8>>,
    keys: Vec<Vec<u8>>,
}

/// This type collects keys and other arguments for the script so that it
/// can be then invoked.  While the `Script` type itself holds the script,
/// the `ScriptInvocation` holds the arguments that should be invoked until
/// it's sent to the server.
impl<'a> ScriptInvocation<'a> {
    /// Adds a regular argument to the invocation.  This ends up as `ARGV[i]`
    /// in the script.
    #[inline]
    pub fn arg<'b, T: ToRedisArgs>(&'b mut self, arg: T) -> &'b mut ScriptInvocation<'a>
    where
        'a: 'b,
    {
        arg.write_redis_args(&mut self.args);
        self
    }

    /// Adds a key argument to the invocation.  This ends up as `KEYS[i]`
    /// in the script.
    #[inline]
    pub fn key<'b, T: ToRedisArgs>(&'b mut self, key: T) -> &'b mut ScriptInvocation<'a>
    where
        'a: 'b,
    {
        key.write_redis_args(&mut self.keys);
        self
    }

    /// Runs the script through the connection's digest cache: `EVALSHA` when
    /// the script is known to be loaded, `EVAL` otherwise.
    #[inline]
    pub async fn invoke_async<C, T>(
        &self,
        con: &mut ScriptingConnection<C>,
        output: OutputType,
    ) -> RedisResult<T>
    where
        C: ConnectionLike + Send,
        T: FromScriptOutput,
    {
        con.eval_script(self.script, output, &self.keys, &self.args)
            .await
    }

    /// Loads the script and returns the SHA1 of it.
    #[inline]
    pub async fn load_async<C>(&self, con: &mut ScriptingConnection<C>) -> RedisResult<String>
    where
        C: ConnectionLike + Send,
    {
        let hash = con.load_script(self.script).await?;
        Ok(hash.into())
    }
}
