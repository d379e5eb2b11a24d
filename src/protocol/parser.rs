//! Line Protocol Parser
//!
//! Parsing happens in two steps:
//!
//! 1. **Framing**: [`LineParser::next_line`] looks for the next `\n` in a
//!    read buffer and reports how many bytes make up the line.
//! 2. **Decoding**: [`parse_command`] (server side) or [`parse_response`]
//!    (client side) turn one line into a typed value.
//!
//! Framing returns:
//! - `Ok(Some((line, consumed)))` - a full line, `consumed` includes the `\n`
//! - `Ok(None)` - no `\n` yet, wait for more data
//! - `Err(ParseError::LineTooLong)` - the peer sent too much without a `\n`

use crate::protocol::types::{
    Command, Response, Status, Verb, LF, STATUS_ERROR, STATUS_OK,
};
use thiserror::Error;

/// Errors that can occur while parsing protocol lines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line has fewer than the `<id> <VERB> <key>` fields
    #[error("expected at least 3 fields, found {found}")]
    TooFewFields { found: usize },

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No line terminator within the allowed length
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// A response line whose status is neither OK nor ERROR
    #[error("invalid response status: {0:?}")]
    InvalidStatus(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a single line, terminator excluded (1 MiB)
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Splits a byte stream into lines.
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default [`MAX_LINE_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Attempts to frame one line from the front of `buf`.
    ///
    /// The returned slice excludes the `\n`.
    pub fn next_line<'a>(&self, buf: &'a [u8]) -> ParseResult<Option<(&'a [u8], usize)>> {
        match find_lf(buf) {
            Some(pos) if pos > self.max_line_length => Err(ParseError::LineTooLong {
                size: pos,
                max: self.max_line_length,
            }),
            Some(pos) => Ok(Some((&buf[..pos], pos + 1))),
            None if buf.len() > self.max_line_length => Err(ParseError::LineTooLong {
                size: buf.len(),
                max: self.max_line_length,
            }),
            None => Ok(None),
        }
    }

    /// Position of the next `\n` in `buf`, ignoring the length limit.
    ///
    /// Used to skip the rest of a line that [`LineParser::next_line`]
    /// rejected as too long.
    pub fn line_end(&self, buf: &[u8]) -> Option<usize> {
        find_lf(buf)
    }
}

/// Finds the position of the first `\n` in the buffer.
#[inline]
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == LF)
}

/// Splits off the next whitespace-delimited field.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(pos) => Some((&s[..pos], &s[pos..])),
        None => Some((s, "")),
    }
}

/// Decodes a request line (with or without its terminator).
///
/// The line is split into at most four fields: `id`, `verb`, `key` and,
/// for `SET` only, `value`, which is everything after the key with inner
/// whitespace preserved. A `SET` without a value stores the empty string.
///
/// # Example
///
/// ```
/// use linekv::protocol::{parse_command, Verb};
///
/// let cmd = parse_command(b"1 SET greeting hello world\n").unwrap();
/// assert_eq!(cmd.verb, Verb::Set);
/// assert_eq!(cmd.value.as_deref(), Some("hello world"));
/// ```
pub fn parse_command(line: &[u8]) -> ParseResult<Command> {
    let line = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    let line = line.trim();

    let (id, rest) = next_field(line).ok_or(ParseError::TooFewFields { found: 0 })?;
    let (verb, rest) = next_field(rest).ok_or(ParseError::TooFewFields { found: 1 })?;
    let (key, rest) = next_field(rest).ok_or(ParseError::TooFewFields { found: 2 })?;

    let verb = Verb::from_wire(verb);
    let value = match verb {
        Verb::Set => Some(rest.trim_start().to_string()),
        _ => None,
    };

    Ok(Command {
        id: id.to_string(),
        verb,
        key: key.to_string(),
        value,
    })
}

/// Decodes a response line (with or without its terminator).
///
/// Fields are separated by single spaces exactly as the server writes them,
/// so `2 OK \n` yields an empty value rather than no value.
pub fn parse_response(line: &[u8]) -> ParseResult<Response> {
    let line = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    let line = line.trim_end_matches(['\n', '\r']);

    if line == STATUS_ERROR {
        return Ok(Response::malformed());
    }

    let (id, rest) = line
        .split_once(' ')
        .ok_or(ParseError::TooFewFields { found: 1 })?;
    let (status, detail) = match rest.split_once(' ') {
        Some((status, detail)) => (status, Some(detail.to_string())),
        None => (rest, None),
    };

    let status = match status {
        STATUS_OK => Status::Ok,
        STATUS_ERROR => Status::Error,
        other => return Err(ParseError::InvalidStatus(other.to_string())),
    };

    Ok(Response {
        id: Some(id.to_string()),
        status,
        detail,
    })
}
