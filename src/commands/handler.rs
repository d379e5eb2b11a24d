//! Command Handler
//!
//! Turns one request line into one response by applying it to the
//! storage engine.
//!
//! | verb        | engine call        | success            | failure                      |
//! |-------------|--------------------|--------------------|------------------------------|
//! | SET         | `set(key, value)`  | `<id> OK`          |                              |
//! | GET         | `get(key)`         | `<id> OK <value>`  | `<id> ERROR NOT FOUND`       |
//! | DEL         | `delete(key)`      | `<id> OK`          |                              |
//! | other       |                    |                    | `<id> ERROR UNKNOWN COMMAND` |
//! | unparseable |                    |                    | `ERROR`                      |

use crate::protocol::{parse_command, Command, Response, Verb};
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::{debug, trace};

/// Executes commands against a shared storage engine.
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Decodes and executes one raw request line.
    ///
    /// Never fails: protocol errors become `ERROR` responses.
    pub fn handle_line(&self, line: &[u8]) -> Response {
        match parse_command(line) {
            Ok(command) => self.execute(command),
            Err(e) => {
                debug!(error = %e, "Malformed request line");
                Response::malformed()
            }
        }
    }

    /// Executes a decoded command and returns the response.
    pub fn execute(&self, command: Command) -> Response {
        let Command {
            id,
            verb,
            key,
            value,
        } = command;

        trace!(id = %id, verb = %verb, key = %key, "Executing command");

        match verb {
            Verb::Set => {
                self.storage.set(key, value.unwrap_or_default());
                Response::ok(id)
            }
            Verb::Get => match self.storage.get(&key) {
                Some(value) => Response::value(id, value),
                None => Response::not_found(id),
            },
            Verb::Del => {
                self.storage.delete(&key);
                Response::ok(id)
            }
            Verb::Unknown(name) => {
                debug!(id = %id, verb = %name, "Unknown command");
                Response::unknown_command(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handler() -> CommandHandler {
        CommandHandler::new(Arc::new(StorageEngine::new(Duration::from_secs(60))))
    }

    fn run(handler: &CommandHandler, line: &str) -> Vec<u8> {
        handler.handle_line(line.as_bytes()).serialize()
    }

    #[test]
    fn test_protocol_scenario() {
        let handler = handler();

        assert_eq!(run(&handler, "1 SET a hello\n"), b"1 OK\n");
        assert_eq!(run(&handler, "2 GET a\n"), b"2 OK hello\n");
        assert_eq!(run(&handler, "3 GET missing\n"), b"3 ERROR NOT FOUND\n");
        assert_eq!(run(&handler, "4 DEL a\n"), b"4 OK\n");
        assert_eq!(run(&handler, "5 FOO a\n"), b"5 ERROR UNKNOWN COMMAND\n");
        assert_eq!(run(&handler, "6 GET\n"), b"ERROR\n");
    }

    #[test]
    fn test_get_after_del_is_not_found() {
        let handler = handler();

        run(&handler, "1 SET a hello\n");
        run(&handler, "2 DEL a\n");
        assert_eq!(run(&handler, "3 GET a\n"), b"3 ERROR NOT FOUND\n");
    }

    #[test]
    fn test_del_missing_key_is_ok() {
        let handler = handler();
        assert_eq!(run(&handler, "1 DEL nothing\n"), b"1 OK\n");
    }

    #[test]
    fn test_value_with_spaces() {
        let handler = handler();

        run(&handler, "1 SET greeting Hello, World!\n");
        assert_eq!(run(&handler, "2 GET greeting\n"), b"2 OK Hello, World!\n");
    }

    #[test]
    fn test_id_echoed_verbatim() {
        let handler = handler();
        assert_eq!(run(&handler, "req-abc SET k v\n"), b"req-abc OK\n");
    }

    #[test]
    fn test_expired_value_not_found() {
        let handler = CommandHandler::new(Arc::new(StorageEngine::new(Duration::from_millis(10))));

        run(&handler, "1 SET k v\n");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(run(&handler, "2 GET k\n"), b"2 ERROR NOT FOUND\n");
    }

    #[test]
    fn test_lowercase_verb_is_unknown() {
        let handler = handler();
        assert_eq!(run(&handler, "1 set k v\n"), b"1 ERROR UNKNOWN COMMAND\n");
    }
}
