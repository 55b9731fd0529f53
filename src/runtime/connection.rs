//! Connection state machine for managing TCP connections.
//!
//! Each connection tracks its readiness interest, a sticky close flag, and
//! its inbox/outbox buffers. All I/O is non-blocking and runs until the
//! socket reports would-block, since mio readiness is edge-triggered.

use crate::runtime::buffer::Buffer;
use crate::runtime::request::{process_requests, ProcessResult};
use mio::net::TcpStream;
use mio::Interest;
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, trace, warn};

/// Current state of a connection, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for requests.
    Reading,
    /// Replies pending in the outbox.
    Writing,
    /// Will be torn down at the end of the current iteration.
    Closing,
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    /// Registry slot, also used as the mio token.
    pub id: usize,
    /// Non-blocking socket, owned for the lifetime of the connection.
    pub stream: TcpStream,
    /// Remote address.
    pub peer: SocketAddr,
    pub want_read: bool,
    pub want_write: bool,
    /// Sticky: once set, never cleared.
    pub want_close: bool,
    /// Bytes read but not yet parsed into requests.
    pub inbox: Buffer,
    /// Reply bytes not yet written.
    pub outbox: Buffer,
    /// Interest currently registered with the poller.
    pub registered: Interest,
}

impl Connection {
    /// Create a new connection in initial reading state.
    pub fn new(id: usize, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id,
            stream,
            peer,
            want_read: true,
            want_write: false,
            want_close: false,
            inbox: Buffer::new(),
            outbox: Buffer::new(),
            registered: Interest::READABLE,
        }
    }

    pub fn state(&self) -> ConnState {
        if self.want_close {
            ConnState::Closing
        } else if self.want_write {
            ConnState::Writing
        } else {
            ConnState::Reading
        }
    }

    /// Interest that should be registered for the current flags.
    pub fn interest(&self) -> Interest {
        if self.want_write {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    /// Transition to writing state.
    pub fn start_writing(&mut self) {
        self.want_read = false;
        self.want_write = true;
    }

    /// Transition back to reading state.
    pub fn start_reading(&mut self) {
        self.want_read = true;
        self.want_write = false;
    }

    /// Mark connection for closing.
    pub fn close(&mut self) {
        self.want_close = true;
    }

    /// Handle read readiness.
    ///
    /// Reads until would-block, handing each chunk to request processing so
    /// the inbox only ever holds an incomplete trailing request. If any reply
    /// was produced, switches to write interest and tries to flush at once.
    pub fn on_readable(&mut self, scratch: &mut [u8], max_frame_size: usize) {
        if !self.want_read || self.want_close {
            return;
        }

        loop {
            match self.stream.read(scratch) {
                Ok(0) => {
                    if self.inbox.is_empty() {
                        debug!(conn_id = self.id, peer = %self.peer, "Client closed");
                    } else {
                        debug!(
                            conn_id = self.id,
                            pending = self.inbox.len(),
                            "Unexpected EOF mid-request"
                        );
                    }
                    self.close();
                    return;
                }
                Ok(n) => {
                    self.inbox.append(&scratch[..n]);
                    match process_requests(&mut self.inbox, &mut self.outbox, max_frame_size) {
                        ProcessResult::Drained { replies } => {
                            trace!(conn_id = self.id, read = n, replies, "Processed input");
                        }
                        ProcessResult::Error(e) => {
                            warn!(
                                conn_id = self.id,
                                peer = %self.peer,
                                error = %e,
                                "Protocol error"
                            );
                            self.close();
                            return;
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(conn_id = self.id, error = %e, "Read error");
                    self.close();
                    return;
                }
            }
        }

        if !self.outbox.is_empty() {
            self.start_writing();
            self.on_writable();
        }
    }

    /// Handle write readiness.
    ///
    /// Writes as much of the outbox as the socket accepts and reverts to
    /// read interest once it is empty.
    pub fn on_writable(&mut self) {
        if !self.want_write || self.want_close {
            return;
        }

        while !self.outbox.is_empty() {
            match self.stream.write(self.outbox.as_slice()) {
                Ok(0) => {
                    debug!(conn_id = self.id, "Write returned 0");
                    self.close();
                    return;
                }
                Ok(n) => self.outbox.consume(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(conn_id = self.id, error = %e, "Write error");
                    self.close();
                    return;
                }
            }
        }

        self.start_reading();
    }
}

/// Registry of active connections using slab allocation.
///
/// Slots are stable for the lifetime of a connection, so tokens handed to
/// the poller stay valid while a batch of events is being processed.
pub struct ConnectionRegistry {
    connections: Slab<Connection>,
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Create a new registry with specified maximum capacity.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Slab::with_capacity(max_connections.min(1024)),
            max_connections,
        }
    }

    /// Insert a connection built from its assigned slot id.
    ///
    /// Returns `None` if the registry is at capacity.
    pub fn insert_with(&mut self, build: impl FnOnce(usize) -> Connection) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let entry = self.connections.vacant_entry();
        let id = entry.key();
        entry.insert(build(id));
        Some(id)
    }

    /// Get a mutable reference to a connection.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Remove a connection from the registry.
    pub fn remove(&mut self, id: usize) -> Option<Connection> {
        self.connections.try_remove(id)
    }

    /// Ids of every connection marked for closing.
    pub fn closing(&self) -> Vec<usize> {
        self.connections
            .iter()
            .filter(|(_, conn)| conn.want_close)
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of active connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_connections
    }
}
