//! resp-loop: a single-threaded RESP ping/echo server
//!
//! One thread multiplexes every client over readiness-based I/O:
//! - `protocols::resp`: request parser, reply encoder and command dispatch
//! - `runtime`: buffers, connection state machine and the event loop
//! - `config`: CLI arguments layered over an optional TOML file
//! - `client`: blocking client with request pipelining

pub mod client;
pub mod config;
pub mod protocols;
pub mod runtime;
