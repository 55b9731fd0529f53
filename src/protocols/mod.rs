//! Protocol implementations.
//!
//! - `resp`: request parser, reply encoder and command dispatch for the
//!   RESP subset spoken by the server and the client.

pub mod resp;
