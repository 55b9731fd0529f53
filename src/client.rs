//! Blocking client for the RESP server.
//!
//! Turns whitespace-separated command lines into request frames and reads
//! reply frames back. Requests can be sent one at a time with
//! [`Client::call`] or batched into a [`Pipeline`] and sent in a single
//! write, in which case exactly one reply is read per queued request.

use crate::protocols::resp::Reply;
use bytes::{Bytes, BytesMut};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use thiserror::Error;

/// Client-side failures. Any of them leaves the connection unusable.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown reply type: {0:#04x}")]
    UnknownReplyType(u8),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Encode a command line as one request frame.
///
/// Returns `None` if the line has no tokens.
pub fn encode_line(line: &str) -> Option<BytesMut> {
    let args: Vec<&str> = line.split_whitespace().collect();
    if args.is_empty() {
        return None;
    }

    let mut buf = BytesMut::new();
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        // Request elements share the bulk string encoding
        Reply::bulk(Bytes::copy_from_slice(arg.as_bytes())).encode_into(&mut buf);
    }
    Some(buf)
}

/// Read exactly one reply frame.
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply, ClientError> {
    let line = read_line(reader)?;
    let Some((&kind, rest)) = line.split_first() else {
        return Err(ClientError::Malformed("empty reply line".to_string()));
    };

    match kind {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(rest).into_owned())),
        b'-' => Ok(Reply::Error(String::from_utf8_lossy(rest).into_owned())),
        b'$' => {
            let text = String::from_utf8_lossy(rest);
            let len: i64 = text
                .parse()
                .map_err(|_| ClientError::Malformed(format!("invalid bulk length '{text}'")))?;
            if len == -1 {
                return Ok(Reply::Null);
            }
            let len = usize::try_from(len)
                .map_err(|_| ClientError::Malformed(format!("invalid bulk length '{text}'")))?;

            // Grow with the bytes that arrive rather than the declared length
            let want = (len as u64).saturating_add(2);
            let mut data = Vec::new();
            reader.by_ref().take(want).read_to_end(&mut data)?;
            if (data.len() as u64) < want {
                return Err(ClientError::Closed);
            }
            if &data[len..] != b"\r\n" {
                return Err(ClientError::Malformed(
                    "bulk string missing trailing CRLF".to_string(),
                ));
            }
            data.truncate(len);
            Ok(Reply::Bulk(Bytes::from(data)))
        }
        other => Err(ClientError::UnknownReplyType(other)),
    }
}

/// Read one CRLF-terminated line, without the terminator.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, ClientError> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(ClientError::Closed);
    }
    if !line.ends_with(b"\n") {
        return Err(ClientError::Closed);
    }
    if !line.ends_with(b"\r\n") {
        return Err(ClientError::Malformed("line not terminated by CRLF".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

/// Requests queued for a single batched write.
#[derive(Debug, Default)]
pub struct Pipeline {
    buffer: BytesMut,
    count: usize,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command line. Returns `false` if the line has no tokens.
    pub fn queue(&mut self, line: &str) -> bool {
        match encode_line(line) {
            Some(frame) => {
                self.buffer.extend_from_slice(&frame);
                self.count += 1;
                true
            }
            None => false,
        }
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A connection to the server.
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send one command line and wait for its reply.
    pub fn call(&mut self, line: &str) -> Result<Reply, ClientError> {
        let frame = encode_line(line).ok_or(ClientError::EmptyCommand)?;
        self.writer.write_all(&frame)?;
        read_reply(&mut self.reader)
    }

    /// Send every queued request in one write, then read one reply per
    /// request, in order.
    pub fn execute(&mut self, pipeline: Pipeline) -> Result<Vec<Reply>, ClientError> {
        self.writer.write_all(&pipeline.buffer)?;
        (0..pipeline.count)
            .map(|_| read_reply(&mut self.reader))
            .collect()
    }
}
