//! Single-threaded runtime for serving RESP clients.
//!
//! Readiness-based I/O via mio (epoll on Linux, kqueue on macOS):
//! - `Buffer`: per-connection inbox/outbox
//! - `Connection`: connection state machine and slab registry
//! - `request`: decode/dispatch/encode over a connection's buffers
//! - `Reactor`: the event loop owning the listener and all connections

mod buffer;
mod connection;
pub mod request;
mod reactor;

pub use buffer::Buffer;
pub use connection::{ConnState, Connection, ConnectionRegistry};
pub use reactor::Reactor;
pub use request::{process_requests, ProcessResult};

use crate::config::Config;

/// Bind the listener and run the event loop until a fatal error.
pub fn run(config: &Config) -> std::io::Result<()> {
    let mut reactor = Reactor::bind(config)?;
    reactor.run()
}
