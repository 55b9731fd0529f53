//! Command dispatch for decoded requests.
//!
//! Command names are matched case-insensitively against a fixed table.
//! A known name with the wrong number of arguments is treated the same as
//! an unknown name.

use super::reply::Reply;
use bytes::Bytes;

/// A request recognised by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PING with no arguments
    Ping,
    /// ECHO with exactly one argument
    Echo(Bytes),
    /// Anything else, carrying the name as the client sent it
    Unknown(Bytes),
}

impl Command {
    /// Classify an argument vector. Returns `None` for an empty vector.
    pub fn from_args(args: &[Bytes]) -> Option<Command> {
        let (name, rest) = args.split_first()?;

        let command = if name.eq_ignore_ascii_case(b"PING") && rest.is_empty() {
            Command::Ping
        } else if name.eq_ignore_ascii_case(b"ECHO") && rest.len() == 1 {
            Command::Echo(rest[0].clone())
        } else {
            Command::Unknown(name.clone())
        };

        Some(command)
    }

    /// Execute the command and produce its reply
    pub fn execute(self) -> Reply {
        match self {
            Command::Ping => Reply::status("PONG"),
            Command::Echo(value) => Reply::Bulk(value),
            Command::Unknown(name) => Reply::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(&name)
            )),
        }
    }
}

/// Map one request to its reply. An empty request produces no reply.
pub fn dispatch(args: &[Bytes]) -> Option<Reply> {
    Command::from_args(args).map(Command::execute)
}
