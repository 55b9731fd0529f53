//! RESP (Redis Serialization Protocol) implementation.
//!
//! Only the subset needed here is supported: requests are arrays of bulk
//! strings, replies are status, error, bulk or null frames.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  *1\r\n$4\r\nPING\r\n
//! Response: +PONG\r\n
//!
//! Request:  *2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n
//! Response: $5\r\nhello\r\n
//!
//! Request:  *1\r\n$3\r\nFOO\r\n
//! Response: -ERR unknown command 'FOO'\r\n
//! ```

pub mod command;
pub mod parser;
pub mod reply;

pub use command::dispatch;
pub use parser::{parse, ParseResult, ProtocolError};
pub use reply::Reply;
