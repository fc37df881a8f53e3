use crate::cmd::Cmd;
use crate::types::{RedisFuture, Value};

/// The request channel that scripting commands are sent over.
///
/// Implementors own the wire protocol, connection setup and reply
/// correlation. A multiplexed connection implements this on a cheap,
/// cloneable handle, so many tasks may hold their own clone while sharing
/// one socket; replies come back to the task that sent the request.
///
/// Error replies are reported either as `Err` or as
/// [`Value::ServerError`]; both forms are accepted. A `NOSCRIPT` error must
/// keep its code so it can be told apart from other failures.
pub trait ConnectionLike {
    /// Sends an already encoded (packed) command into the TCP socket and
    /// reads the single response from it.
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value>;
}

impl<C> ConnectionLike for &mut C
where
    C: ConnectionLike + ?Sized,
{
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        (**self).req_packed_command(cmd)
    }
}

impl<C> ConnectionLike for Box<C>
where
    C: ConnectionLike + ?Sized,
{
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        (**self).req_packed_command(cmd)
    }
}
