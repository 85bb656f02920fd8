//! Error types for every failure mode the crate exposes (spec §7).

use std::fmt;

use crate::span::Position;

/// Every way an RSD operation can fail.
#[derive(Debug, Clone)]
pub enum RsdError {
    /// A file could not be opened or read.
    Io { path: String, op: &'static str, message: String },
    /// The tokenizer could not produce a valid token.
    Token { source: String, position: Position, message: String },
    /// The grammar rejected the token stream.
    Parse { source: String, position: Position, description: String },
    /// Misuse of the value API: name collision, wrong container kind, missing key.
    Value { message: String },
    /// `as_<T>` was called on a value that does not resolve to the requested kind.
    Conversion { message: String },
}

impl RsdError {
    pub fn value(message: impl Into<String>) -> Self {
        RsdError::Value { message: message.into() }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        RsdError::Conversion { message: message.into() }
    }

    pub fn token(source: impl Into<String>, position: Position, message: impl Into<String>) -> Self {
        RsdError::Token { source: source.into(), position, message: message.into() }
    }

    pub fn parse(source: impl Into<String>, position: Position, description: impl Into<String>) -> Self {
        RsdError::Parse { source: source.into(), position, description: description.into() }
    }

    /// Re-wraps a token-level error as a parse-level error, as spec §4.2 requires
    /// at the parser boundary.
    pub fn into_parse(self) -> RsdError {
        match self {
            RsdError::Token { source, position, message } => {
                RsdError::Parse { source, position, description: message }
            }
            other => other,
        }
    }
}

impl fmt::Display for RsdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RsdError::Io { path, op, message } => {
                write!(f, "{path}: could not be {op}: {message}")
            }
            RsdError::Token { source, position, message } => {
                write!(f, "{source}:{}:{}: {message}", position.line, position.column)
            }
            RsdError::Parse { source, position, description } => {
                write!(f, "{source}:{}:{}: {description}", position.line, position.column)
            }
            RsdError::Value { message } => write!(f, "{message}"),
            RsdError::Conversion { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for RsdError {}

pub type RsdResult<T> = Result<T, RsdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_source_line_column_shape() {
        let err = RsdError::parse("scene.rsd", Position::new(1, 3, 7), "unexpected token");
        assert_eq!(err.to_string(), "scene.rsd:3:7: unexpected token");
    }

    #[test]
    fn token_error_promotes_into_parse_error() {
        let err = RsdError::token("scene.rsd", Position::new(1, 1, 1), "unterminated string");
        let promoted = err.into_parse();
        assert!(matches!(promoted, RsdError::Parse { .. }));
    }

    #[test]
    fn value_and_conversion_errors_render_bare_message() {
        assert_eq!(RsdError::value("duplicate name 'x'").to_string(), "duplicate name 'x'");
        assert_eq!(
            RsdError::conversion("expected Integer, found Array").to_string(),
            "expected Integer, found Array"
        );
    }
}
