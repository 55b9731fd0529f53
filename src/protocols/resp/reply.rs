//! RESP reply frames.

use bytes::{Bytes, BytesMut};
use std::fmt;

/// A single reply sent back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status line: +PONG\r\n
    Status(String),
    /// Error line: -ERR message\r\n
    Error(String),
    /// Bulk string: $5\r\nhello\r\n
    Bulk(Bytes),
    /// Null bulk string: $-1\r\n
    Null,
}

impl Reply {
    /// Create a status reply
    pub fn status<S: Into<String>>(s: S) -> Reply {
        Reply::Status(s.into())
    }

    /// Create an error reply
    pub fn error<S: Into<String>>(s: S) -> Reply {
        Reply::Error(s.into())
    }

    /// Create a bulk string reply
    pub fn bulk<B: Into<Bytes>>(data: B) -> Reply {
        Reply::Bulk(data.into())
    }

    /// Encode a reply into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Status(s) => {
                buf.extend_from_slice(b"+");
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Error(s) => {
                buf.extend_from_slice(b"-");
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(data) => {
                buf.extend_from_slice(b"$");
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Null => {
                buf.extend_from_slice(b"$-1\r\n");
            }
        }
    }
}

/// Human-readable rendering used by the interactive client.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) | Reply::Error(s) => f.write_str(s),
            Reply::Bulk(data) => f.write_str(&String::from_utf8_lossy(data)),
            Reply::Null => f.write_str("(nil)"),
        }
    }
}
