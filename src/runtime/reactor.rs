//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready,
//! then we perform non-blocking read/write syscalls.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! One thread owns the listener and every connection. Each iteration:
//! 1. Wait for readiness (retrying on `EINTR`).
//! 2. Accept pending connections until the listener would block.
//! 3. Read/dispatch/flush for each ready connection.
//! 4. Tear down every connection marked for closing.

use crate::config::Config;
use crate::runtime::connection::{Connection, ConnectionRegistry};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Listen backlog passed to `listen(2)`.
const BACKLOG: i32 = 1024;

/// Single-threaded reactor serving RESP clients.
pub struct Reactor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: ConnectionRegistry,
    /// Scratch space for socket reads, shared by all connections.
    scratch: Vec<u8>,
    max_frame_size: usize,
}

impl Reactor {
    /// Bind the listening socket and set up the poller.
    ///
    /// Failure here is fatal: nothing can be served without the listener.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let poll = Poll::new()?;

        let listener = create_listener(config.listen)?;
        let mut listener = TcpListener::from_std(listener);
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity),
            listener,
            local_addr,
            connections: ConnectionRegistry::new(config.max_connections),
            scratch: vec![0u8; config.read_buffer_size],
            max_frame_size: config.max_frame_size,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Run the event loop until a poll failure.
    pub fn run(&mut self) -> io::Result<()> {
        info!(addr = %self.local_addr, "Server listening");
        loop {
            self.turn(None)?;
        }
    }

    /// Run one iteration of the event loop.
    ///
    /// Blocks for at most `timeout` (forever if `None`). An interrupted wait
    /// returns `Ok` so the caller simply polls again.
    pub fn turn(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            error!(error = %e, "Poll failed");
            return Err(e);
        }

        for event in self.events.iter() {
            match event.token() {
                LISTENER_TOKEN => {
                    accept_connections(&self.listener, &self.poll, &mut self.connections);
                }
                Token(conn_id) => {
                    handle_connection_event(
                        conn_id,
                        event,
                        &self.poll,
                        &mut self.connections,
                        &mut self.scratch,
                        self.max_frame_size,
                    );
                }
            }
        }

        for conn_id in self.connections.closing() {
            close_connection(&self.poll, &mut self.connections, conn_id);
        }

        Ok(())
    }
}

fn accept_connections(listener: &TcpListener, poll: &Poll, connections: &mut ConnectionRegistry) {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if connections.is_full() {
                    warn!(peer = %peer_addr, "Connection limit reached");
                    continue;
                }

                let Some(conn_id) =
                    connections.insert_with(|id| Connection::new(id, stream, peer_addr))
                else {
                    continue;
                };

                // Re-borrow after insert
                let Some(conn) = connections.get_mut(conn_id) else {
                    continue;
                };
                if let Err(e) =
                    poll.registry()
                        .register(&mut conn.stream, Token(conn_id), Interest::READABLE)
                {
                    error!(conn_id, error = %e, "Failed to register connection");
                    connections.remove(conn_id);
                    continue;
                }

                debug!(conn_id, peer = %peer_addr, "Accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // No new edge fires for connections already queued, so they
                // wait in the backlog until the next connection attempt
                error!(error = %e, "Accept failed, pending connections left in backlog");
                break;
            }
        }
    }
}

fn handle_connection_event(
    conn_id: usize,
    event: &Event,
    poll: &Poll,
    connections: &mut ConnectionRegistry,
    scratch: &mut [u8],
    max_frame_size: usize,
) {
    let Some(conn) = connections.get_mut(conn_id) else {
        return;
    };

    if event.is_error() {
        debug!(conn_id, "Socket error reported");
        conn.close();
    }

    if event.is_readable() {
        conn.on_readable(scratch, max_frame_size);
    }

    if event.is_writable() {
        conn.on_writable();
    }

    if conn.want_close {
        return;
    }

    let interest = conn.interest();
    if interest != conn.registered {
        match poll
            .registry()
            .reregister(&mut conn.stream, Token(conn_id), interest)
        {
            Ok(()) => conn.registered = interest,
            Err(e) => {
                debug!(conn_id, error = %e, "Failed to update interest");
                conn.close();
            }
        }
    }
}

fn close_connection(poll: &Poll, connections: &mut ConnectionRegistry, conn_id: usize) {
    if let Some(mut conn) = connections.remove(conn_id) {
        let _ = poll.registry().deregister(&mut conn.stream);
        debug!(
            conn_id,
            peer = %conn.peer,
            discarded = conn.outbox.len(),
            "Connection closed"
        );
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
