#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::{future, FutureExt};
use redis_scripting::{
    digest, Cmd, ConnectionLike, RedisFuture, RedisResult, ServerError, Value,
};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RuntimeType {
    CurrentThread,
    MultiThread,
}

pub fn current_thread_runtime() -> tokio::runtime::Runtime {
    let mut builder = tokio::runtime::Builder::new_current_thread();

    builder.enable_time();

    builder.build().unwrap()
}

pub fn multi_thread_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_time()
        .build()
        .unwrap()
}

pub fn block_on_all<F, V>(f: F, runtime: RuntimeType) -> F::Output
where
    F: Future<Output = RedisResult<V>>,
{
    match runtime {
        RuntimeType::CurrentThread => current_thread_runtime().block_on(f),
        RuntimeType::MultiThread => multi_thread_runtime().block_on(f),
    }
}

/// Computes a script's reply from its keys and arguments.
pub type ScriptHandler = Arc<dyn Fn(&[Vec<u8>], &[Vec<u8>]) -> Value + Send + Sync>;

#[derive(Default)]
struct ServerState {
    // digest -> body
    scripts: HashMap<String, Vec<u8>>,
    handlers: HashMap<Vec<u8>, ScriptHandler>,
    calls: HashMap<String, usize>,
    script_running: bool,
    hold_requests: bool,
}

/// An in-process stand-in for a server's script cache. It answers `EVAL`,
/// `EVALSHA` and the `SCRIPT` subcommands the way a server does and counts
/// every command it receives.
///
/// Clones share the same state, like handles to one multiplexed connection.
#[derive(Clone, Default)]
pub struct FakeScriptServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeScriptServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reply of `body`. Unregistered scripts reply with nil.
    pub fn register(&self, body: &str, reply: Value) -> &Self {
        self.register_handler(body, move |_, _| reply.clone())
    }

    pub fn register_handler<F>(&self, body: &str, handler: F) -> &Self
    where
        F: Fn(&[Vec<u8>], &[Vec<u8>]) -> Value + Send + Sync + 'static,
    {
        self.state
            .lock()
            .unwrap()
            .handlers
            .insert(body.as_bytes().to_vec(), Arc::new(handler));
        self
    }

    /// Number of times `name` was received. Subcommands are counted as
    /// `"SCRIPT LOAD"`, `"SCRIPT FLUSH"` and so on.
    pub fn calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn is_loaded(&self, body: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .scripts
            .contains_key(&digest(body))
    }

    /// Drops the server side script cache without the client noticing, like
    /// a restart or a flush from another client.
    pub fn forget_all_scripts(&self) {
        self.state.lock().unwrap().scripts.clear();
    }

    pub fn set_script_running(&self, running: bool) {
        self.state.lock().unwrap().script_running = running;
    }

    /// While set, requests never complete.
    pub fn hold_requests(&self, hold: bool) {
        self.state.lock().unwrap().hold_requests = hold;
    }

    fn run(state: &ServerState, body: &[u8], rest: &[Vec<u8>]) -> RedisResult<Value> {
        let (numkeys, rest) = rest.split_first().ok_or_else(|| wrong_args("EVAL"))?;
        let numkeys: usize = std::str::from_utf8(numkeys)?
            .parse()
            .map_err(|_| err("ERR value is not an integer or out of range"))?;
        if numkeys > rest.len() {
            return Err(err(
                "ERR Number of keys can't be greater than number of args",
            ));
        }
        let (keys, args) = rest.split_at(numkeys);
        Ok(match state.handlers.get(body) {
            Some(handler) => handler(keys, args),
            None => Value::Nil,
        })
    }

    fn handle(&self, args: Vec<Vec<u8>>) -> RedisResult<Value> {
        let mut state = self.state.lock().unwrap();
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        let name = if name == "SCRIPT" && args.len() > 1 {
            format!("SCRIPT {}", String::from_utf8_lossy(&args[1]).to_ascii_uppercase())
        } else {
            name
        };
        *state.calls.entry(name.clone()).or_default() += 1;

        match name.as_str() {
            "EVAL" => {
                let body = args.get(1).ok_or_else(|| wrong_args("EVAL"))?;
                let reply = Self::run(&state, body, &args[2..])?;
                state
                    .scripts
                    .insert(digest(body), body.clone());
                Ok(reply)
            }
            "EVALSHA" => {
                let sha = args.get(1).ok_or_else(|| wrong_args("EVALSHA"))?;
                let sha = String::from_utf8_lossy(sha).to_ascii_lowercase();
                match state.scripts.get(&sha) {
                    Some(body) => Self::run(&state, body, &args[2..]),
                    // Some transports hand error replies back as values.
                    None => Ok(Value::ServerError(ServerError::parse(
                        "NOSCRIPT No matching script. Please use EVAL.",
                    ))),
                }
            }
            "SCRIPT LOAD" => {
                let body = args.get(2).ok_or_else(|| wrong_args("SCRIPT LOAD"))?;
                let sha = digest(body);
                state.scripts.insert(sha.clone(), body.clone());
                Ok(Value::BulkString(sha.into_bytes()))
            }
            "SCRIPT EXISTS" => {
                if args.len() < 3 {
                    return Err(wrong_args("SCRIPT EXISTS"));
                }
                let known: HashSet<&String> = state.scripts.keys().collect();
                Ok(Value::Array(
                    args[2..]
                        .iter()
                        .map(|sha| {
                            let sha = String::from_utf8_lossy(sha).to_ascii_lowercase();
                            Value::Int(known.contains(&sha) as i64)
                        })
                        .collect(),
                ))
            }
            "SCRIPT FLUSH" => {
                match args.get(2).map(|mode| mode.as_slice()) {
                    None | Some(b"ASYNC") | Some(b"SYNC") => {}
                    Some(_) => return Err(err("ERR SCRIPT FLUSH only support SYNC|ASYNC option")),
                }
                state.scripts.clear();
                Ok(Value::Okay)
            }
            "SCRIPT KILL" => {
                if state.script_running {
                    state.script_running = false;
                    Ok(Value::Okay)
                } else {
                    Err(err("NOTBUSY No scripts in execution right now."))
                }
            }
            _ => Err(err(&format!("ERR unknown command '{name}'"))),
        }
    }
}

fn err(line: &str) -> redis_scripting::RedisError {
    ServerError::parse(line).into()
}

fn wrong_args(name: &str) -> redis_scripting::RedisError {
    err(&format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

impl ConnectionLike for FakeScriptServer {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        if self.state.lock().unwrap().hold_requests {
            return future::pending().boxed();
        }
        let args = cmd.args_iter().map(<[u8]>::to_vec).collect();
        future::ready(self.handle(args)).boxed()
    }
}
