use std::{fmt, io};

use crate::connection::ConnectionLike;
use crate::types::{from_owned_redis_value, FromRedisValue, RedisResult, RedisWrite, ToRedisArgs};

/// Represents redis commands.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    data: Vec<u8>,
    // Each entry is the offset that marks the end of the argument
    args: Vec<usize>,
}

fn countdigits(mut v: usize) -> usize {
    let mut result = 1;
    loop {
        if v < 10 {
            return result;
        }
        if v < 100 {
            return result + 1;
        }
        if v < 1000 {
            return result + 2;
        }
        if v < 10000 {
            return result + 3;
        }

        v /= 10000;
        result += 4;
    }
}

#[inline]
fn bulklen(len: usize) -> usize {
    1 + countdigits(len) + 2 + len + 2
}

fn args_len<'a, I>(args: I) -> usize
where
    I: IntoIterator<Item = &'a [u8]> + ExactSizeIterator,
{
    let mut totlen = 1 + countdigits(args.len()) + 2;
    for item in args {
        totlen += bulklen(item.len());
    }
    totlen
}

fn write_command<'a, I>(cmd: &mut (impl ?Sized + io::Write), args: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a [u8]> + ExactSizeIterator,
{
    let mut buf = ::itoa::Buffer::new();

    cmd.write_all(b"*")?;
    let s = buf.format(args.len());
    cmd.write_all(s.as_bytes())?;
    cmd.write_all(b"\r\n")?;

    for bytes in args {
        cmd.write_all(b"$")?;
        let s = buf.format(bytes.len());
        cmd.write_all(s.as_bytes())?;
        cmd.write_all(b"\r\n")?;

        cmd.write_all(bytes)?;
        cmd.write_all(b"\r\n")?;
    }
    Ok(())
}

impl RedisWrite for Cmd {
    fn write_arg(&mut self, arg: &[u8]) {
        self.data.extend_from_slice(arg);
        self.args.push(self.data.len());
    }

    fn write_arg_fmt(&mut self, arg: impl fmt::Display) {
        self.data.extend_from_slice(arg.to_string().as_bytes());
        self.args.push(self.data.len());
    }
}

/// A command acts as a builder interface to creating encoded redis
/// requests.  This allows you to easiy assemble a packed command
/// by chaining arguments together.
///
/// ```rust
/// let mut cmd = redis_scripting::cmd("EVALSHA");
/// cmd.arg("e0e1f9fabfc9d4800c877a703b823ac0578ff8db").arg(0);
/// assert_eq!(cmd.args_iter().count(), 3);
/// ```
impl Cmd {
    /// Creates a new empty command.
    pub fn new() -> Cmd {
        Cmd {
            data: vec![],
            args: vec![],
        }
    }

    /// Appends an argument to the command.  The argument passed must
    /// be a type that implements `ToRedisArgs`.  Most primitive types as
    /// well as vectors of primitive types implement it.
    #[inline]
    pub fn arg<T: ToRedisArgs>(&mut self, arg: T) -> &mut Cmd {
        arg.write_redis_args(self);
        self
    }

    /// Returns the packed command as a byte vector.
    #[inline]
    pub fn get_packed_command(&self) -> Vec<u8> {
        let mut cmd = Vec::new();
        self.write_packed_command(&mut cmd);
        cmd
    }

    /// Appends the packed command to `cmd`.
    pub fn write_packed_command(&self, cmd: &mut Vec<u8>) {
        cmd.reserve(args_len(self.args_iter()));
        // Writing into a `Vec` cannot fail.
        let _ = write_command(cmd, self.args_iter());
    }

    /// Returns the command name, the first argument, if it is valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        self.args_iter()
            .next()
            .and_then(|name| std::str::from_utf8(name).ok())
    }

    /// Returns an iterator over the arguments in this command (including the command name itself)
    pub fn args_iter(&self) -> impl Clone + ExactSizeIterator<Item = &[u8]> {
        let mut prev = 0;
        self.args.iter().map(move |&end| {
            let arg = &self.data[prev..end];
            prev = end;
            arg
        })
    }

    /// Sends the command as query to the connection and converts the
    /// result to the target redis value.
    #[inline]
    pub async fn query_async<C, T: FromRedisValue>(&self, con: &mut C) -> RedisResult<T>
    where
        C: ConnectionLike,
    {
        let val = con.req_packed_command(self).await?;
        from_owned_redis_value(val.extract_error()?)
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for arg in self.args_iter() {
            list.entry(&String::from_utf8_lossy(arg));
        }
        list.finish()
    }
}

/// Shortcut function to creating a command with a single argument.
///
/// The first argument of a redis command is always the name of the command
/// which needs to be a string.
///
/// ```rust
/// redis_scripting::cmd("SCRIPT").arg("FLUSH");
/// ```
pub fn cmd(name: &str) -> Cmd {
    let mut rv = Cmd::new();
    rv.arg(name);
    rv
}

/// Packs a bunch of arguments into a request frame.
///
/// ```rust
/// let packed = redis_scripting::pack_command(&[b"SCRIPT".to_vec(), b"KILL".to_vec()]);
/// assert_eq!(packed, b"*2\r\n$6\r\nSCRIPT\r\n$4\r\nKILL\r\n".to_vec());
/// ```
pub fn pack_command(args: &[Vec<u8>]) -> Vec<u8> {
    let mut cmd = Vec::new();
    let _ = write_command(&mut cmd, args.iter().map(|x| &x[..]));
    cmd
}
