//! RESP request parser.
//!
//! Requests are arrays of bulk strings:
//!
//! ```text
//! *<count>\r\n
//! $<len>\r\n<len bytes>\r\n     (repeated `count` times)
//! ```
//!
//! The parser is stateless and resumable. It always starts from the front of
//! the buffer and either consumes one whole request or consumes nothing, so a
//! caller can retry after appending more bytes.

use bytes::Bytes;
use thiserror::Error;

/// Malformed request data. The connection cannot be resynchronised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("expected '{expected}' at offset {offset}, found {found:#04x}")]
    UnexpectedByte {
        expected: char,
        found: u8,
        offset: usize,
    },
    #[error("malformed length at offset {0}")]
    InvalidLength(usize),
    #[error("bulk string at offset {0} is missing its trailing CRLF")]
    MissingCrlf(usize),
    #[error("frame exceeds the maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },
}

/// Parse result
#[derive(Debug, PartialEq)]
pub enum ParseResult {
    /// One request's arguments and the number of bytes it occupied
    Complete(Vec<Bytes>, usize),
    /// Need more data
    Incomplete,
    /// Parse error
    Error(ProtocolError),
}

/// Upper bound on the up-front argument allocation; a header can claim any
/// count before its elements have arrived.
const MAX_PREALLOC_ARGS: usize = 64;

/// Parse one request from the front of `buffer`.
pub fn parse(buffer: &[u8]) -> ParseResult {
    if buffer.is_empty() {
        return ParseResult::Incomplete;
    }

    if buffer[0] != b'*' {
        return ParseResult::Error(ProtocolError::UnexpectedByte {
            expected: '*',
            found: buffer[0],
            offset: 0,
        });
    }

    let (count, mut offset) = match parse_length(buffer, 1) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return ParseResult::Incomplete,
        Err(e) => return ParseResult::Error(e),
    };

    // An empty array is a complete request with no arguments
    if count == 0 {
        return ParseResult::Complete(Vec::new(), offset);
    }

    let mut args = Vec::with_capacity(count.min(MAX_PREALLOC_ARGS));

    for _ in 0..count {
        match parse_bulk_string(buffer, offset) {
            Ok(Some((data, next))) => {
                args.push(data);
                offset = next;
            }
            Ok(None) => return ParseResult::Incomplete,
            Err(e) => return ParseResult::Error(e),
        }
    }

    ParseResult::Complete(args, offset)
}

/// Parse a bulk string starting at `start`: `$5\r\nhello\r\n`.
///
/// Returns the payload and the offset just past its trailing CRLF.
fn parse_bulk_string(buffer: &[u8], start: usize) -> Result<Option<(Bytes, usize)>, ProtocolError> {
    let Some(&first) = buffer.get(start) else {
        return Ok(None);
    };

    if first != b'$' {
        return Err(ProtocolError::UnexpectedByte {
            expected: '$',
            found: first,
            offset: start,
        });
    }

    let Some((len, data_start)) = parse_length(buffer, start + 1)? else {
        return Ok(None);
    };

    let data_end = data_start
        .checked_add(len)
        .ok_or(ProtocolError::InvalidLength(start + 1))?;
    let total = data_end
        .checked_add(2)
        .ok_or(ProtocolError::InvalidLength(start + 1))?;

    if buffer.len() < total {
        return Ok(None);
    }

    if &buffer[data_end..total] != b"\r\n" {
        return Err(ProtocolError::MissingCrlf(start));
    }

    Ok(Some((Bytes::copy_from_slice(&buffer[data_start..data_end]), total)))
}

/// Parse an unsigned decimal terminated by CRLF, starting at `start`.
///
/// Returns the value and the offset just past the CRLF, or `None` when the
/// terminator has not arrived yet. Anything but digits is rejected as soon
/// as it is seen, so a sign or stray byte never waits for more input.
fn parse_length(buffer: &[u8], start: usize) -> Result<Option<(usize, usize)>, ProtocolError> {
    let mut value: usize = 0;
    let mut pos = start;

    loop {
        let Some(&byte) = buffer.get(pos) else {
            return Ok(None);
        };

        match byte {
            b'0'..=b'9' => {
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(usize::from(byte - b'0')))
                    .ok_or(ProtocolError::InvalidLength(start))?;
                pos += 1;
            }
            b'\r' if pos > start => {
                return match buffer.get(pos + 1) {
                    None => Ok(None),
                    Some(b'\n') => Ok(Some((value, pos + 2))),
                    Some(_) => Err(ProtocolError::InvalidLength(start)),
                };
            }
            _ => return Err(ProtocolError::InvalidLength(start)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(frames: &[&[u8]]) -> Vec<Bytes> {
        frames.iter().map(|f| Bytes::copy_from_slice(f)).collect()
    }

    #[test]
    fn test_parse_single_arg() {
        let buffer = b"*1\r\n$4\r\nPING\r\n";
        match parse(buffer) {
            ParseResult::Complete(parsed, consumed) => {
                assert_eq!(parsed, args(&[b"PING"]));
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_multiple_args() {
        let buffer = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        match parse(buffer) {
            ParseResult::Complete(parsed, consumed) => {
                assert_eq!(parsed, args(&[b"ECHO", b"hello"]));
                assert_eq!(consumed, 25);
            }
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_consumes_only_first_request() {
        let buffer = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        match parse(buffer) {
            ParseResult::Complete(_, consumed) => assert_eq!(consumed, 14),
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let buffer = b"*2\r\n$4\r\nECHO\r\n$0\r\n\r\n";
        match parse(buffer) {
            ParseResult::Complete(parsed, consumed) => {
                assert_eq!(parsed, args(&[b"ECHO", b""]));
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_binary_payload() {
        let buffer = b"*2\r\n$4\r\nECHO\r\n$4\r\n\r\n\x00\xff\r\n";
        match parse(buffer) {
            ParseResult::Complete(parsed, _) => {
                assert_eq!(&parsed[1][..], b"\r\n\x00\xff");
            }
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_incomplete() {
        let full = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        for end in 0..full.len() {
            assert_eq!(
                parse(&full[..end]),
                ParseResult::Incomplete,
                "prefix of length {end} should be incomplete"
            );
        }
    }

    #[test]
    fn test_partial_frame_resumes() {
        let mut buffer = b"*1\r\n$4\r\npi".to_vec();
        assert_eq!(parse(&buffer), ParseResult::Incomplete);

        buffer.extend_from_slice(b"ng\r\n");
        match parse(&buffer) {
            ParseResult::Complete(parsed, consumed) => {
                assert_eq!(parsed, args(&[b"ping"]));
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected complete request, got {other:?}"),
        }
    }

    #[test]
    fn test_not_an_array() {
        match parse(b"PING\r\n") {
            ParseResult::Error(ProtocolError::UnexpectedByte {
                expected: '*',
                found: b'P',
                offset: 0,
            }) => {}
            other => panic!("Expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_element_not_bulk_string() {
        match parse(b"*1\r\n+PING\r\n") {
            ParseResult::Error(ProtocolError::UnexpectedByte {
                expected: '$',
                offset: 4,
                ..
            }) => {}
            other => panic!("Expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_lengths_rejected() {
        assert_eq!(
            parse(b"*-1\r\n"),
            ParseResult::Error(ProtocolError::InvalidLength(1))
        );
        assert_eq!(
            parse(b"*1\r\n$-1\r\n"),
            ParseResult::Error(ProtocolError::InvalidLength(5))
        );
    }

    #[test]
    fn test_malformed_length_rejected_early() {
        // No CRLF yet, but the header can never become valid
        assert_eq!(parse(b"*x"), ParseResult::Error(ProtocolError::InvalidLength(1)));
        assert_eq!(parse(b"*\r\n"), ParseResult::Error(ProtocolError::InvalidLength(1)));
        assert_eq!(parse(b"*1\rx"), ParseResult::Error(ProtocolError::InvalidLength(1)));
        assert_eq!(
            parse(b"*1\r\n$4x\r\n"),
            ParseResult::Error(ProtocolError::InvalidLength(5))
        );
    }

    #[test]
    fn test_length_overflow_rejected() {
        assert_eq!(
            parse(b"*99999999999999999999999\r\n"),
            ParseResult::Error(ProtocolError::InvalidLength(1))
        );
    }

    #[test]
    fn test_empty_array_is_complete() {
        assert_eq!(parse(b"*0\r\n"), ParseResult::Complete(Vec::new(), 4));
        assert_eq!(
            parse(b"*0\r\n*1\r\n$4\r\nPING\r\n"),
            ParseResult::Complete(Vec::new(), 4)
        );
        assert_eq!(parse(b"*0\r"), ParseResult::Incomplete);
    }

    #[test]
    fn test_missing_trailing_crlf() {
        assert_eq!(
            parse(b"*1\r\n$4\r\nPINGxx"),
            ParseResult::Error(ProtocolError::MissingCrlf(4))
        );
    }

    #[test]
    fn test_large_count_does_not_preallocate() {
        // Header alone is fine; the elements simply have not arrived.
        assert_eq!(parse(b"*1000000000\r\n"), ParseResult::Incomplete);
    }
}
