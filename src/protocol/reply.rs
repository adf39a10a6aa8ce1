//! Reply Rendering
//!
//! Turns structured results into the text lines sent back to clients.
//!
//! ## Single Results
//!
//! The first matching rule wins:
//!
//! | Result carries          | Rendered as                  |
//! |-------------------------|------------------------------|
//! | reply token             | `(<kind>) <token>` / `<token>` |
//! | error                   | `(error) ERR <message>`      |
//! | value                   | `(<kind>) <value>` / `"text"` / `42` |
//! | nothing                 | `(nil)`                      |
//!
//! ## Sequences
//!
//! ```text
//! 1) OK
//! 2) (integer) 6
//! 3) 1) SET a 6
//!    2) SET b "x"
//! ```
//!
//! Each element is prefixed with its 1-based index. Continuation lines of a
//! nested sequence are aligned under the first one. An empty sequence is
//! `(empty array)`.

use crate::commands::result::{CommandResult, Reply, NIL};
use crate::protocol::types::Value;
use std::fmt;

/// Rendered form of a sequence with no elements.
pub const EMPTY_ARRAY: &str = "(empty array)";

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reply) = &self.reply {
            return match self.kind {
                Some(kind) => write!(f, "({}) {}", kind, reply),
                None => f.write_str(reply),
            };
        }

        if let Some(error) = &self.error {
            return write!(f, "(error) ERR {}", error);
        }

        match (&self.value, self.kind) {
            (Some(value), Some(kind)) => write!(f, "({}) {}", kind, value),
            (Some(Value::Str(s)), None) => write!(f, "\"{}\"", s),
            (Some(Value::Int(n)), None) => write!(f, "{}", n),
            (None, _) => f.write_str(NIL),
        }
    }
}

/// Renders a reply as newline-terminated lines.
pub fn render(reply: &Reply) -> String {
    let mut out = String::new();
    for line in lines(reply) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn lines(reply: &Reply) -> Vec<String> {
    match reply {
        Reply::Single(result) => vec![result.to_string()],
        Reply::Sequence(items) if items.is_empty() => vec![EMPTY_ARRAY.to_string()],
        Reply::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let prefix = format!("{}) ", i + 1);
                let pad = " ".repeat(prefix.len());
                for (n, line) in lines(item).into_iter().enumerate() {
                    let lead = if n == 0 { &prefix } else { &pad };
                    out.push(format!("{}{}", lead, line));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::result::ExecError;
    use crate::protocol::types::ValueKind;
    use crate::storage::StorageError;

    #[test]
    fn test_render_tokens() {
        assert_eq!(CommandResult::ok().to_string(), "OK");
        assert_eq!(CommandResult::queued().to_string(), "QUEUED");
        assert_eq!(
            CommandResult::token("1")
                .with_kind(ValueKind::Integer)
                .to_string(),
            "(integer) 1"
        );
    }

    #[test]
    fn test_render_values() {
        assert_eq!(
            CommandResult::value(Value::string("hello world")).to_string(),
            "\"hello world\""
        );
        assert_eq!(CommandResult::value(Value::Int(7)).to_string(), "7");
        assert_eq!(CommandResult::integer(11).to_string(), "(integer) 11");
        assert_eq!(CommandResult::default().to_string(), "(nil)");
    }

    #[test]
    fn test_render_errors() {
        let err = CommandResult::error(StorageError::ValueNotInteger);
        assert_eq!(err.to_string(), "(error) ERR value is not an integer");

        let err = CommandResult::error(ExecError::without_multi("EXEC"));
        assert_eq!(err.to_string(), "(error) ERR EXEC without MULTI");
    }

    #[test]
    fn test_reply_token_wins_over_error() {
        let missing = CommandResult::error(StorageError::KeyNotFound("k".to_string()));
        assert_eq!(missing.clone().with_reply(NIL).to_string(), "(nil)");
        assert_eq!(
            missing
                .with_kind(ValueKind::Integer)
                .with_reply("0")
                .to_string(),
            "(integer) 0"
        );
    }

    #[test]
    fn test_render_single_line() {
        assert_eq!(render(&Reply::ok()), "OK\n");
    }

    #[test]
    fn test_render_sequence() {
        let reply = Reply::Sequence(vec![
            Reply::ok(),
            CommandResult::integer(6).into(),
            CommandResult::integer(11).into(),
        ]);
        assert_eq!(render(&reply), "1) OK\n2) (integer) 6\n3) (integer) 11\n");
    }

    #[test]
    fn test_render_empty_sequence() {
        assert_eq!(render(&Reply::Sequence(vec![])), "(empty array)\n");
    }

    #[test]
    fn test_render_nested_sequence() {
        let reply = Reply::Sequence(vec![
            Reply::ok(),
            Reply::Sequence(vec![
                CommandResult::token("SET a 6").into(),
                CommandResult::token("SET b \"x\"").into(),
            ]),
            Reply::Sequence(vec![]),
        ]);
        assert_eq!(
            render(&reply),
            "1) OK\n2) 1) SET a 6\n   2) SET b \"x\"\n3) (empty array)\n"
        );
    }
}
