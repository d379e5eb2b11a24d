//! Line Protocol Implementation
//!
//! linekv speaks a plain-text protocol: one command per line, fields
//! separated by whitespace, every request answered by exactly one line.
//!
//! ## Modules
//!
//! - `types`: `Command`, `Response` and their serialization
//! - `parser`: line framing and decoding of requests and responses
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_command, Response};
//!
//! let cmd = parse_command(b"1 GET name\n").unwrap();
//! assert_eq!(cmd.key, "name");
//!
//! let reply = Response::value(cmd.id, "Ariz");
//! assert_eq!(reply.serialize(), b"1 OK Ariz\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{
    parse_command, parse_response, LineParser, ParseError, ParseResult, MAX_LINE_LENGTH,
};
pub use types::{Command, Response, Status, Verb};
