//! RESP2 framing for the cache connection.
//!
//! Commands go out as arrays of bulk strings. Replies are parsed from whatever
//! has been buffered so far; an incomplete frame yields `Ok(None)` and the
//! caller reads more bytes before trying again.

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr;

use crate::errors::BackendError;

use super::query::{Arg, Command, QueryResult};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const CRLF: &[u8] = b"\r\n";

// Same ceiling the server applies to a single string.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
const MAX_ARRAY_LEN: usize = 1024 * 1024;
const MAX_DEPTH: usize = 32;
const MAX_LINE_LEN: usize = 64 * 1024;

// -----------------------------------------------------------------------------
// ----- Reply -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`, `+PONG`
    Status(String),
    /// `-ERR ...`
    Error(String),
    /// `:42`
    Integer(i64),
    /// `$5\r\nhello`
    Bulk(Bytes),
    /// `$-1` or `*-1`
    Nil,
    /// `*2\r\n...`
    Array(Vec<Reply>),
}

impl Reply {
    /// Lifts error replies and nulls out of the value space: an error reply
    /// becomes `BackendError::Server`, a null becomes `BackendError::NotFound`.
    pub fn into_result(self) -> QueryResult {
        match self {
            Reply::Error(message) => Err(BackendError::Server(message)),
            Reply::Nil => Err(BackendError::NotFound),
            other => Ok(other),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Encoding --------------------------------------------------------------

pub fn encode_command(command: &Command, out: &mut BytesMut) {
    put_header(out, b'*', command.args().len() + 1);
    put_bulk(out, command.action().as_str().as_bytes());

    for arg in command.args() {
        match arg {
            Arg::Text(text) => put_bulk(out, text.as_bytes()),
            Arg::Int(value) => put_bulk(out, value.to_string().as_bytes()),
            Arg::Bytes(data) => put_bulk(out, data),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Parsing ---------------------------------------------------------------

/// Parses one reply from the front of `buf`, returning it with the number of
/// bytes it occupied. Oversized lengths and overly nested arrays are
/// protocol errors rather than reasons to keep buffering.
pub fn parse_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, BackendError> {
    parse_nested(buf, 0)
}

fn parse_nested(buf: &[u8], depth: usize) -> Result<Option<(Reply, usize)>, BackendError> {
    let Some((line, mut cursor)) = read_line(buf)? else {
        return Ok(None);
    };

    let Some((&tag, body)) = line.split_first() else {
        return Err(protocol("empty reply line"));
    };

    let reply = match tag {
        b'+' => Reply::Status(String::from_utf8_lossy(body).into_owned()),
        b'-' => Reply::Error(String::from_utf8_lossy(body).into_owned()),
        b':' => Reply::Integer(parse_i64(body)?),
        b'$' => match parse_len(body, MAX_BULK_LEN, "bulk string")? {
            None => Reply::Nil,
            Some(len) => {
                let start = cursor;
                let end = start + len;
                if buf.len() < end + CRLF.len() {
                    return Ok(None);
                }
                if &buf[end..end + CRLF.len()] != CRLF {
                    return Err(protocol("bulk string not terminated by CRLF"));
                }
                cursor = end + CRLF.len();
                Reply::Bulk(Bytes::copy_from_slice(&buf[start..end]))
            }
        },
        b'*' => match parse_len(body, MAX_ARRAY_LEN, "array")? {
            None => Reply::Nil,
            Some(_) if depth >= MAX_DEPTH => {
                return Err(protocol(format!("arrays nested deeper than {MAX_DEPTH}")));
            }
            Some(len) => {
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    let Some((item, used)) = parse_nested(&buf[cursor..], depth + 1)? else {
                        return Ok(None);
                    };
                    items.push(item);
                    cursor += used;
                }
                Reply::Array(items)
            }
        },
        other => return Err(protocol(format!("unknown reply tag {other:#04x}"))),
    };

    Ok(Some((reply, cursor)))
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

#[inline]
fn put_header(out: &mut BytesMut, tag: u8, len: usize) {
    out.put_u8(tag);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(CRLF);
}

#[inline]
fn put_bulk(out: &mut BytesMut, data: &[u8]) {
    put_header(out, b'$', data.len());
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}

/// Returns the line without its CRLF and the offset just past it.
fn read_line(buf: &[u8]) -> Result<Option<(&[u8], usize)>, BackendError> {
    let Some(lf) = memchr(b'\n', buf) else {
        if buf.len() > MAX_LINE_LEN {
            return Err(protocol(format!("reply line longer than {MAX_LINE_LEN} bytes")));
        }
        return Ok(None);
    };

    if lf == 0 || buf[lf - 1] != b'\r' {
        return Err(protocol("reply line not terminated by CRLF"));
    }

    Ok(Some((&buf[..lf - 1], lf + 1)))
}

/// A negative length is the null reply.
fn parse_len(body: &[u8], max: usize, what: &str) -> Result<Option<usize>, BackendError> {
    let len = parse_i64(body)?;
    if len < 0 {
        return Ok(None);
    }

    match usize::try_from(len) {
        Ok(len) if len <= max => Ok(Some(len)),
        _ => Err(protocol(format!("{what} length {len} exceeds {max}"))),
    }
}

fn parse_i64(data: &[u8]) -> Result<i64, BackendError> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| protocol(format!("invalid integer {:?}", String::from_utf8_lossy(data))))
}

fn protocol(message: impl Into<String>) -> BackendError {
    BackendError::Protocol(message.into())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
