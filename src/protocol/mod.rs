//! Text Line Protocol
//!
//! This module implements the request and reply side of the kvdb wire format.
//!
//! ## Overview
//!
//! Clients send newline-terminated UTF-8 lines of the form
//! `<KEYWORD> [arg1] [arg2]`. Arguments may be wrapped in double quotes to
//! embed spaces. Every request produces one or more reply lines.
//!
//! ## Modules
//!
//! - `types`: The tagged `Value` stored under each key
//! - `command`: The `Command` structure and its validation
//! - `parser`: Tokenizer for raw request lines
//! - `reply`: Rendering of results into reply lines
//!
//! ## Example
//!
//! ```
//! use kvdb::protocol::{parse_line, Value};
//!
//! let command = parse_line("set \"multi word key\" value").unwrap();
//! assert_eq!(command.keyword(), "SET");
//! assert_eq!(command.key(), Some("multi word key"));
//! assert_eq!(command.value(), Some(&Value::string("value")));
//! ```

pub mod command;
pub mod parser;
pub mod reply;
pub mod types;

// Re-export commonly used types for convenience
pub use command::{Command, CommandError, Keyword, Request};
pub use parser::{parse_line, ParseError, ParseResult};
pub use reply::render;
pub use types::{Value, ValueKind};
