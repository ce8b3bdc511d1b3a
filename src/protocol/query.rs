use bytes::Bytes;
use smallvec::SmallVec;
use tokio::sync::oneshot;

use crate::errors::BackendError;

use super::resp::Reply;

// -----------------------------------------------------------------------------
// ----- Action ----------------------------------------------------------------

/// Cache commands the store knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    SetEx,
    Del,
    Ping,
    Auth,
    Select,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Get => "GET",
            Action::SetEx => "SETEX",
            Action::Del => "DEL",
            Action::Ping => "PING",
            Action::Auth => "AUTH",
            Action::Select => "SELECT",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Arg -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Text(String),
    Int(i64),
    Bytes(Bytes),
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

// -----------------------------------------------------------------------------
// ----- Command ---------------------------------------------------------------

/// An action plus its positional arguments. No store command takes more than
/// three arguments, so they stay inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    action: Action,
    args: SmallVec<[Arg; 3]>,
}

impl Command {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            args: SmallVec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::new(Action::Get).arg(key.into())
    }

    pub fn setex(key: impl Into<String>, ttl_seconds: i64, payload: Bytes) -> Self {
        Self::new(Action::SetEx)
            .arg(key.into())
            .arg(ttl_seconds)
            .arg(payload)
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self::new(Action::Del).arg(key.into())
    }

    pub fn ping() -> Self {
        Self::new(Action::Ping)
    }

    pub fn auth(username: Option<&str>, password: &str) -> Self {
        let command = Self::new(Action::Auth);
        let command = match username {
            Some(username) => command.arg(username),
            None => command,
        };
        command.arg(password)
    }

    pub fn select(database: u32) -> Self {
        Self::new(Action::Select).arg(i64::from(database))
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

// -----------------------------------------------------------------------------
// ----- Query -----------------------------------------------------------------

pub type QueryResult = Result<Reply, BackendError>;

/// A command travelling to the worker together with the caller's private
/// reply slot. Answering consumes the query, so a slot is written at most once.
#[derive(Debug)]
pub struct Query {
    command: Command,
    reply: oneshot::Sender<QueryResult>,
}

impl Query {
    pub fn new(command: Command) -> (Self, PendingReply) {
        let (reply, rx) = oneshot::channel();
        (Self { command, reply }, PendingReply { rx })
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Returns false when the issuer stopped waiting.
    pub fn respond(self, result: QueryResult) -> bool {
        self.reply.send(result).is_ok()
    }
}

// -----------------------------------------------------------------------------
// ----- PendingReply ----------------------------------------------------------

#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<QueryResult>,
}

impl PendingReply {
    /// Waits for the worker's answer. A query dropped without an answer only
    /// happens when the worker is gone.
    pub async fn wait(self) -> QueryResult {
        self.rx.await.unwrap_or(Err(BackendError::WorkerStopped))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
