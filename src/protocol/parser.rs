//! Request Line Parser
//!
//! Turns one raw request line into a [`Command`].
//!
//! ## Grammar
//!
//! ```text
//! <KEYWORD> [arg1] [arg2]
//! ```
//!
//! The line is trimmed and split on single spaces. The first token is the
//! keyword (upper-cased by the command constructor). Every following token is
//! either a bare argument or part of a double-quoted argument:
//!
//! - A token starting with `"` opens a quoted argument. Following tokens are
//!   appended with the space the split removed, until a token ending in `"`
//!   closes it. Empty tokens (runs of spaces) contribute one space each, so
//!   the interior spacing survives exactly as typed. Whitespace at the edges
//!   of the closed argument is trimmed.
//! - Outside quotes, empty tokens are skipped and anything else is taken
//!   verbatim.
//!
//! Arity is not checked here, only that there are at most two arguments.
//!
//! ## Example
//!
//! ```
//! use kvdb::protocol::parser::parse_line;
//!
//! let cmd = parse_line(r#"set "multi  word key" value"#).unwrap();
//! assert_eq!(cmd.keyword(), "SET");
//! assert_eq!(cmd.key(), Some("multi  word key"));
//! ```

use crate::protocol::command::Command;
use crate::protocol::types::Value;
use thiserror::Error;

/// Maximum number of positional arguments a line may carry.
pub const MAX_ARGUMENTS: usize = 2;

const QUOTE: char = '"';

/// Errors that make a line unparseable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line ended while a quoted argument was still open
    #[error("Syntax error: arguments has no closing quote")]
    UnclosedQuote,

    /// More than two positional arguments
    #[error("Syntax error")]
    TooManyArguments,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a request line into a command.
pub fn parse_line(line: &str) -> ParseResult<Command> {
    let mut tokens = line.trim().split(' ');
    let keyword = tokens.next().unwrap_or_default();

    let mut args: Vec<Value> = Vec::with_capacity(MAX_ARGUMENTS);
    let mut open: Option<String> = None;

    for token in tokens {
        if let Some(mut quoted) = open.take() {
            quoted.push(' ');
            match token.strip_suffix(QUOTE) {
                Some(last) => {
                    quoted.push_str(last);
                    args.push(Value::string(quoted.trim()));
                }
                None => {
                    quoted.push_str(token);
                    open = Some(quoted);
                }
            }
            continue;
        }

        if token.is_empty() {
            continue;
        }

        match token.strip_prefix(QUOTE) {
            // `"word"` opens and closes in a single token
            Some(rest) if rest.ends_with(QUOTE) => {
                args.push(Value::string(rest[..rest.len() - 1].trim()));
            }
            Some(rest) => open = Some(rest.to_string()),
            None => args.push(Value::string(token)),
        }
    }

    if open.is_some() {
        return Err(ParseError::UnclosedQuote);
    }

    if args.len() > MAX_ARGUMENTS {
        return Err(ParseError::TooManyArguments);
    }

    Ok(Command::new(keyword, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> (String, Option<String>, Option<Value>) {
        let cmd = parse_line(line).unwrap();
        (
            cmd.keyword().to_string(),
            cmd.key().map(str::to_string),
            cmd.value().cloned(),
        )
    }

    #[test]
    fn test_one_word_value() {
        let (keyword, key, value) = parsed("SET key value");
        assert_eq!(keyword, "SET");
        assert_eq!(key.as_deref(), Some("key"));
        assert_eq!(value, Some(Value::string("value")));
    }

    #[test]
    fn test_extra_spaces_between_arguments() {
        let (keyword, key, value) = parsed(" SET  key  value ");
        assert_eq!(keyword, "SET");
        assert_eq!(key.as_deref(), Some("key"));
        assert_eq!(value, Some(Value::string("value")));
    }

    #[test]
    fn test_lowercase_keyword() {
        let (keyword, key, value) = parsed(" get key");
        assert_eq!(keyword, "GET");
        assert_eq!(key.as_deref(), Some("key"));
        assert_eq!(value, None);
    }

    #[test]
    fn test_keyword_alone() {
        let (keyword, key, value) = parsed("multi");
        assert_eq!(keyword, "MULTI");
        assert_eq!(key, None);
        assert_eq!(value, None);
    }

    #[test]
    fn test_quoted_multiword_key() {
        let (_, key, _) = parsed("GET \"multi key\"");
        assert_eq!(key.as_deref(), Some("multi key"));
    }

    #[test]
    fn test_quoted_key_keeps_interior_spaces() {
        let (_, key, _) = parsed("GET \"multi  key\"");
        assert_eq!(key.as_deref(), Some("multi  key"));

        let (_, key, _) = parsed("GET \"one two  three four  key\"");
        assert_eq!(key.as_deref(), Some("one two  three four  key"));
    }

    #[test]
    fn test_quoted_key_and_value() {
        let (_, key, value) = parsed("SET \"multi word key\" \"multi word value\"");
        assert_eq!(key.as_deref(), Some("multi word key"));
        assert_eq!(value, Some(Value::string("multi word value")));
    }

    #[test]
    fn test_single_token_quotes() {
        let (keyword, key, value) = parsed("SET \"key\" \"5\"");
        assert_eq!(keyword, "SET");
        assert_eq!(key.as_deref(), Some("key"));
        assert_eq!(value, Some(Value::string("5")));

        let (_, key, _) = parsed("GET \"\"");
        assert_eq!(key.as_deref(), Some(""));
    }

    #[test]
    fn test_quoted_argument_edges_are_trimmed() {
        let (_, key, value) = parsed("SET \" a\" v");
        assert_eq!(key.as_deref(), Some("a"));
        assert_eq!(value, Some(Value::string("v")));

        let (_, key, _) = parsed("SET \"a \" v");
        assert_eq!(key.as_deref(), Some("a"));

        let (_, key, _) = parsed("SET \" \" v");
        assert_eq!(key.as_deref(), Some(""));

        let (_, key, _) = parsed("SET \"a  \" v");
        assert_eq!(key.as_deref(), Some("a"));

        let (_, key, value) = parsed("SET \"  multi  key \" \" two  words \"");
        assert_eq!(key.as_deref(), Some("multi  key"));
        assert_eq!(value, Some(Value::string("two  words")));
    }

    #[test]
    fn test_no_closing_quote() {
        assert_eq!(
            parse_line("SET \"multi word key\" \"multi word value"),
            Err(ParseError::UnclosedQuote)
        );
        assert_eq!(
            ParseError::UnclosedQuote.to_string(),
            "Syntax error: arguments has no closing quote"
        );
    }

    #[test]
    fn test_too_many_arguments() {
        assert_eq!(
            parse_line("SET key value1 value2"),
            Err(ParseError::TooManyArguments)
        );
        assert_eq!(
            parse_line("SET \"multi word key\" \"multi word value1\" \"multi word value2\""),
            Err(ParseError::TooManyArguments)
        );
        assert_eq!(ParseError::TooManyArguments.to_string(), "Syntax error");
    }

    #[test]
    fn test_empty_line() {
        let (keyword, key, value) = parsed("   ");
        assert_eq!(keyword, "");
        assert_eq!(key, None);
        assert_eq!(value, None);
    }
}
