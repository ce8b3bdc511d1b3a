#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use sessioncrab::protocol::resp::parse_reply;
use sessioncrab::protocol::{Action, Arg, Command, QueryResult, Reply};
use sessioncrab::session::Values;
use sessioncrab::{BackendError, Connection, ConnectionPool, Value};

// -----------------------------------------------------------------------------
// ----- Fake backend ----------------------------------------------------------

/// What the fake backend saw, shared between the pool, its connections and
/// the test.
#[derive(Debug, Default)]
pub struct FakeState {
    next_id: u32,
    pub acquisitions: usize,
    pub refused_acquisitions: usize,
    pub commands: Vec<(u32, Command)>,
    pub closed: Vec<u32>,
    pub released: Vec<u32>,
    pub idle: Vec<u32>,
    pub pool_closed: bool,
    pub kv: HashMap<String, Bytes>,
    pub ttls: HashMap<String, i64>,

    // Scripted failure counters.
    refuse_acquire: usize,
    break_next: usize,
}

impl FakeState {
    pub fn actions(&self) -> Vec<Action> {
        self.commands.iter().map(|(_, c)| c.action()).collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|(_, c)| text_arg(c, 0))
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct FakePool {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` executions fail with `Closed`.
    pub fn break_next(&self, n: usize) {
        self.state.lock().break_next += n;
    }

    /// The next `n` acquisitions fail with a refused connection.
    pub fn refuse_acquire(&self, n: usize) {
        self.state.lock().refuse_acquire += n;
    }

    pub fn seed(&self, key: &str, payload: &[u8]) {
        self.state
            .lock()
            .kv
            .insert(key.to_string(), Bytes::copy_from_slice(payload));
    }
}

#[async_trait]
impl ConnectionPool for FakePool {
    type Conn = FakeConnection;

    async fn acquire(&self) -> Result<FakeConnection, BackendError> {
        let mut state = self.state.lock();
        if state.pool_closed {
            return Err(BackendError::PoolClosed);
        }
        if state.refuse_acquire > 0 {
            state.refuse_acquire -= 1;
            state.refused_acquisitions += 1;
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        if let Some(id) = state.idle.pop() {
            return Ok(FakeConnection {
                id,
                state: Arc::clone(&self.state),
            });
        }

        state.acquisitions += 1;
        state.next_id += 1;
        Ok(FakeConnection {
            id: state.next_id,
            state: Arc::clone(&self.state),
        })
    }

    async fn release(&self, conn: FakeConnection) {
        let mut state = self.state.lock();
        state.released.push(conn.id);
        if state.pool_closed {
            state.closed.push(conn.id);
        } else {
            state.idle.push(conn.id);
        }
    }

    async fn close_all(&self) {
        let mut state = self.state.lock();
        state.pool_closed = true;
        let idle: Vec<u32> = state.idle.drain(..).collect();
        state.closed.extend(idle);
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    pub id: u32,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn execute(&mut self, command: &Command) -> QueryResult {
        let mut state = self.state.lock();
        state.commands.push((self.id, command.clone()));

        if state.break_next > 0 {
            state.break_next -= 1;
            return Err(BackendError::Closed);
        }

        let key = text_arg(command, 0).unwrap_or_default();
        match command.action() {
            Action::Get => match state.kv.get(&key) {
                Some(payload) => Ok(Reply::Bulk(payload.clone())),
                None => Err(BackendError::NotFound),
            },
            Action::SetEx => {
                let ttl = match command.args().get(1) {
                    Some(Arg::Int(ttl)) => *ttl,
                    _ => return Err(BackendError::Server("ERR bad ttl".into())),
                };
                let payload = match command.args().get(2) {
                    Some(Arg::Bytes(payload)) => payload.clone(),
                    _ => return Err(BackendError::Server("ERR bad payload".into())),
                };
                state.ttls.insert(key.clone(), ttl);
                state.kv.insert(key, payload);
                Ok(Reply::Status("OK".into()))
            }
            Action::Del => {
                let removed = state.kv.remove(&key).is_some();
                Ok(Reply::Integer(i64::from(removed)))
            }
            Action::Ping => Ok(Reply::Status("PONG".into())),
            Action::Auth | Action::Select => Ok(Reply::Status("OK".into())),
        }
    }

    async fn close(self) {
        self.state.lock().closed.push(self.id);
    }
}

fn text_arg(command: &Command, idx: usize) -> Option<String> {
    match command.args().get(idx) {
        Some(Arg::Text(text)) => Some(text.clone()),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// ----- Mock RESP server ------------------------------------------------------

#[derive(Debug, Default)]
pub struct MockState {
    pub accepted: usize,
    pub log: Vec<(usize, Vec<String>)>,
    pub kv: HashMap<String, Vec<u8>>,
    pub selected: HashMap<usize, u32>,
    authed: HashSet<usize>,
    password: Option<String>,
    drop_next: bool,
}

impl MockState {
    pub fn commands_on(&self, conn: usize) -> Vec<String> {
        self.log
            .iter()
            .filter(|(c, _)| *c == conn)
            .map(|(_, args)| args.join(" "))
            .collect()
    }

    fn next_conn(&mut self) -> usize {
        self.accepted += 1;
        self.accepted
    }

    fn handle(&mut self, conn: usize, args: &[Vec<u8>]) -> Vec<u8> {
        let words: Vec<String> = args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        self.log.push((conn, words.clone()));

        let mut out = Vec::new();
        let Some(name) = words.first().map(|w| w.to_ascii_uppercase()) else {
            write_error(&mut out, "ERR empty command");
            return out;
        };

        if name == "AUTH" {
            match (&self.password, words.last()) {
                (Some(expected), Some(given)) if words.len() > 1 && expected == given => {
                    self.authed.insert(conn);
                    write_simple(&mut out, "OK");
                }
                _ => write_error(
                    &mut out,
                    "WRONGPASS invalid username-password pair or user is disabled.",
                ),
            }
            return out;
        }

        if self.password.is_some() && !self.authed.contains(&conn) {
            write_error(&mut out, "NOAUTH Authentication required.");
            return out;
        }

        match name.as_str() {
            "PING" => write_simple(&mut out, "PONG"),
            "SELECT" => {
                let db = words.get(1).and_then(|d| d.parse().ok()).unwrap_or(0);
                self.selected.insert(conn, db);
                write_simple(&mut out, "OK");
            }
            "GET" => match self.kv.get(&words[1]) {
                Some(value) => write_bulk(&mut out, value),
                None => write_nil(&mut out),
            },
            "SETEX" => {
                self.kv.insert(words[1].clone(), args[3].clone());
                write_simple(&mut out, "OK");
            }
            "DEL" => {
                let removed = self.kv.remove(&words[1]).is_some();
                write_integer(&mut out, i64::from(removed));
            }
            _ => write_error(&mut out, "ERR unknown command"),
        }
        out
    }
}

pub struct MockRedis {
    pub addr: String,
    pub state: Arc<Mutex<MockState>>,
    handle: JoinHandle<()>,
}

impl MockRedis {
    pub async fn start(password: Option<&str>) -> MockRedis {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let state = Arc::new(Mutex::new(MockState {
            password: password.map(str::to_string),
            ..MockState::default()
        }));

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let conn = accept_state.lock().next_conn();
                tokio::spawn(serve_connection(stream, conn, Arc::clone(&accept_state)));
            }
        });

        MockRedis {
            addr,
            state,
            handle,
        }
    }

    /// Same server, listening on a unix socket at `path`.
    pub async fn start_unix(path: &Path, password: Option<&str>) -> MockRedis {
        let listener = UnixListener::bind(path).expect("bind unix");
        let state = Arc::new(Mutex::new(MockState {
            password: password.map(str::to_string),
            ..MockState::default()
        }));

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let conn = accept_state.lock().next_conn();
                tokio::spawn(serve_connection(stream, conn, Arc::clone(&accept_state)));
            }
        });

        MockRedis {
            addr: path.to_string_lossy().into_owned(),
            state,
            handle,
        }
    }

    /// The next command is logged and then the connection is dropped unanswered.
    pub fn drop_next(&self) {
        self.state.lock().drop_next = true;
    }
}

impl Drop for MockRedis {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection<S>(mut stream: S, conn: usize, state: Arc<Mutex<MockState>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let args: Vec<Vec<u8>> = match parse_reply(&buf) {
            Ok(Some((Reply::Array(items), used))) => {
                buf.advance(used);
                items
                    .into_iter()
                    .map(|item| match item {
                        Reply::Bulk(data) => data.to_vec(),
                        _ => Vec::new(),
                    })
                    .collect()
            }
            Ok(None) => match stream.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            },
            _ => return,
        };

        let reply = {
            let mut state = state.lock();
            let reply = state.handle(conn, &args);
            if state.drop_next {
                state.drop_next = false;
                None
            } else {
                Some(reply)
            }
        };

        match reply {
            Some(bytes) => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }
            None => return,
        }
    }
}

fn write_simple(out: &mut Vec<u8>, msg: &str) {
    out.extend_from_slice(b"+");
    out.extend_from_slice(msg.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_error(out: &mut Vec<u8>, msg: &str) {
    out.extend_from_slice(b"-");
    out.extend_from_slice(msg.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_bulk(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(b"$");
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

fn write_nil(out: &mut Vec<u8>) {
    out.extend_from_slice(b"$-1\r\n");
}

fn write_integer(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(b":");
    out.extend_from_slice(value.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

// -----------------------------------------------------------------------------
// ----- Helpers ---------------------------------------------------------------

/// Fails the test instead of hanging it.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

/// Runs one async case to completion on a fresh runtime, for use inside
/// `proptest!` bodies.
pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(fut)
}

pub fn values_strategy() -> impl Strategy<Value = Values> {
    use proptest::num::f64::{NEGATIVE, NORMAL, POSITIVE, SUBNORMAL, ZERO};

    let value = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (POSITIVE | NEGATIVE | NORMAL | SUBNORMAL | ZERO).prop_map(Value::Float),
        ".{0,24}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(Value::Bytes),
    ];
    prop::collection::hash_map(".{0,12}", value, 0..12)
}
