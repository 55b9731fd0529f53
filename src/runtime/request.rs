//! Request processing for the event loop.
//!
//! Peels complete requests off a connection's inbox, dispatches each one and
//! appends the encoded reply to the outbox. Works on buffers only, so it can
//! be exercised without sockets.

use crate::protocols::resp::{dispatch, parse, ParseResult, ProtocolError};
use crate::runtime::buffer::Buffer;
use tracing::trace;

/// Result of processing an inbox.
#[derive(Debug, PartialEq)]
pub enum ProcessResult {
    /// Every complete request was handled; the inbox holds at most one
    /// incomplete request. `replies` were appended to the outbox.
    Drained { replies: usize },
    /// Malformed input, connection should be closed.
    Error(ProtocolError),
}

/// Process every complete request currently in `inbox`, in arrival order.
///
/// A leftover partial request larger than `max_frame_size` is rejected as
/// `FrameTooLarge`, which bounds inbox growth for peers that never finish a
/// frame.
pub fn process_requests(
    inbox: &mut Buffer,
    outbox: &mut Buffer,
    max_frame_size: usize,
) -> ProcessResult {
    let mut replies = 0;

    loop {
        match parse(inbox.as_slice()) {
            ParseResult::Complete(args, consumed) => {
                trace!(
                    args = ?args.iter().map(|a| String::from_utf8_lossy(a)).collect::<Vec<_>>(),
                    "Processing request"
                );

                if let Some(reply) = dispatch(&args) {
                    reply.encode_into(outbox.as_bytes_mut());
                    replies += 1;
                }

                inbox.consume(consumed);
            }
            ParseResult::Incomplete => break,
            ParseResult::Error(e) => return ProcessResult::Error(e),
        }
    }

    if inbox.len() > max_frame_size {
        return ProcessResult::Error(ProtocolError::FrameTooLarge {
            limit: max_frame_size,
        });
    }

    ProcessResult::Drained { replies }
}
