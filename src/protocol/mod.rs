//! Messages exchanged with the session worker and the RESP framing used on the
//! cache connection.

pub mod query;
pub mod resp;

pub use query::{Action, Arg, Command, PendingReply, Query, QueryResult};
pub use resp::Reply;
