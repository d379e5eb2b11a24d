//! Line Protocol Data Types
//!
//! Every request and every response is a single line of space-separated
//! text terminated by `\n`.
//!
//! ## Protocol Format
//!
//! ```text
//! request:  <id> <VERB> <key> [value]
//! response: <id> OK [value]
//!           <id> ERROR [reason]
//!           ERROR
//! ```
//!
//! The `id` is chosen by the client and echoed back unchanged. The bare
//! `ERROR` reply is used only when the request line is too broken to yield
//! an id.
//!
//! ## Examples
//!
//! ```text
//! 1 SET a hello      ->  1 OK
//! 2 GET a            ->  2 OK hello
//! 3 GET missing      ->  3 ERROR NOT FOUND
//! 4 DEL a            ->  4 OK
//! 5 FOO a            ->  5 ERROR UNKNOWN COMMAND
//! 6 GET              ->  ERROR
//! ```

use std::fmt;

/// Line terminator
pub const LF: u8 = b'\n';

/// Status word for a successful response
pub const STATUS_OK: &str = "OK";

/// Status word for a failed response
pub const STATUS_ERROR: &str = "ERROR";

/// Error detail for a GET that found nothing
pub const NOT_FOUND: &str = "NOT FOUND";

/// Error detail for a verb the server does not understand
pub const UNKNOWN_COMMAND: &str = "UNKNOWN COMMAND";

/// The operation a request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Set,
    Get,
    Del,
    /// Anything else, kept verbatim for logging
    Unknown(String),
}

impl Verb {
    /// Maps a wire verb to a `Verb`. Matching is case-sensitive.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "SET" => Verb::Set,
            "GET" => Verb::Get,
            "DEL" => Verb::Del,
            other => Verb::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verb::Set => "SET",
            Verb::Get => "GET",
            Verb::Del => "DEL",
            Verb::Unknown(s) => s,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Correlation token, echoed in the response
    pub id: String,
    pub verb: Verb,
    pub key: String,
    /// Only populated for `SET`
    pub value: Option<String>,
}

impl Command {
    pub fn set(id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verb: Verb::Set,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn get(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verb: Verb::Get,
            key: key.into(),
            value: None,
        }
    }

    pub fn del(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verb: Verb::Del,
            key: key.into(),
            value: None,
        }
    }

    /// Serializes the command to its wire form, including the trailing `\n`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut line = format!("{} {} {}", self.id, self.verb, self.key);
        if let Some(value) = &self.value {
            line.push(' ');
            line.push_str(value);
        }
        line.push(LF as char);
        line.into_bytes()
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => STATUS_OK,
            Status::Error => STATUS_ERROR,
        }
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Echoed request id; `None` only for the bare `ERROR` reply
    pub id: Option<String>,
    pub status: Status,
    /// GET value on success, or an error reason
    pub detail: Option<String>,
}

impl Response {
    /// `<id> OK`
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Status::Ok,
            detail: None,
        }
    }

    /// `<id> OK <value>`
    pub fn value(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Status::Ok,
            detail: Some(value.into()),
        }
    }

    /// `<id> ERROR <reason>`
    pub fn error(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Status::Error,
            detail: Some(reason.into()),
        }
    }

    /// `<id> ERROR NOT FOUND`
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::error(id, NOT_FOUND)
    }

    /// `<id> ERROR UNKNOWN COMMAND`
    pub fn unknown_command(id: impl Into<String>) -> Self {
        Self::error(id, UNKNOWN_COMMAND)
    }

    /// Bare `ERROR`, for lines that could not be parsed at all.
    pub fn malformed() -> Self {
        Self {
            id: None,
            status: Status::Error,
            detail: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// True for `ERROR NOT FOUND`.
    pub fn is_not_found(&self) -> bool {
        self.is_error() && self.detail.as_deref() == Some(NOT_FOUND)
    }

    /// The value carried by a successful GET.
    pub fn as_value(&self) -> Option<&str> {
        match self.status {
            Status::Ok => self.detail.as_deref(),
            Status::Error => None,
        }
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        if let Some(id) = &self.id {
            buf.extend_from_slice(id.as_bytes());
            buf.push(b' ');
        }
        buf.extend_from_slice(self.status.as_str().as_bytes());
        if let Some(detail) = &self.detail {
            buf.push(b' ');
            buf.extend_from_slice(detail.as_bytes());
        }
        buf.push(LF);
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "{} ", id)?;
        }
        f.write_str(self.status.as_str())?;
        if let Some(detail) = &self.detail {
            write!(f, " {}", detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_serialize() {
        assert_eq!(Response::ok("1").serialize(), b"1 OK\n");
    }

    #[test]
    fn test_value_serialize() {
        assert_eq!(Response::value("2", "hello").serialize(), b"2 OK hello\n");
    }

    #[test]
    fn test_empty_value_keeps_separator() {
        assert_eq!(Response::value("2", "").serialize(), b"2 OK \n");
    }

    #[test]
    fn test_not_found_serialize() {
        assert_eq!(
            Response::not_found("3").serialize(),
            b"3 ERROR NOT FOUND\n"
        );
    }

    #[test]
    fn test_unknown_command_serialize() {
        assert_eq!(
            Response::unknown_command("5").serialize(),
            b"5 ERROR UNKNOWN COMMAND\n"
        );
    }

    #[test]
    fn test_malformed_serialize() {
        assert_eq!(Response::malformed().serialize(), b"ERROR\n");
    }

    #[test]
    fn test_command_serialize() {
        assert_eq!(
            Command::set("7", "greeting", "hello world").serialize(),
            b"7 SET greeting hello world\n"
        );
        assert_eq!(Command::get("8", "greeting").serialize(), b"8 GET greeting\n");
        assert_eq!(Command::del("9", "greeting").serialize(), b"9 DEL greeting\n");
    }

    #[test]
    fn test_verb_is_case_sensitive() {
        assert_eq!(Verb::from_wire("GET"), Verb::Get);
        assert_eq!(Verb::from_wire("get"), Verb::Unknown("get".to_string()));
    }

    #[test]
    fn test_response_accessors() {
        let hit = Response::value("1", "v");
        assert!(hit.is_ok());
        assert_eq!(hit.as_value(), Some("v"));

        let miss = Response::not_found("1");
        assert!(miss.is_not_found());
        assert_eq!(miss.as_value(), None);
        assert!(!Response::unknown_command("1").is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(Response::value("2", "hello").to_string(), "2 OK hello");
        assert_eq!(Response::malformed().to_string(), "ERROR");
    }
}
