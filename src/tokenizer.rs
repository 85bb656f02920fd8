//! Converts a character buffer into a lazy sequence of [`Token`]s (spec §4.1).
//!
//! Scanning is byte-indexed (the grammar is ASCII-punctuation-driven; UTF-8
//! continuation bytes never collide with a token-starting byte), in the
//! style of the teacher's own `LineLexer` (`src/lexer.rs`): a cursor walked
//! by hand over `&[u8]`, with small `read_*` helpers per token family.
//! Unlike the teacher's indentation-sensitive lexer, RSD's grammar is
//! brace/semicolon delimited, so there is no indent-stack to track.

use crate::error::{RsdError, RsdResult};
use crate::span::Position;
use crate::token::{Token, TokenKind};

pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    file: usize,
    source_name: String,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, file: usize, source_name: impl Into<String>) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            file,
            source_name: source_name.into(),
            done: false,
        }
    }

    /// Tokenizes the whole buffer eagerly. Stops at the first token error.
    pub fn tokenize(mut self) -> RsdResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position::new(self.file, self.line, self.column)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produces the next significant token, skipping whitespace and `//` line
    /// comments first (spec §4.1: the tokenizer reports these as the
    /// whitespace kind and the parser discards them; since nothing in this
    /// crate ever consumes a standalone whitespace token, the skip happens
    /// here instead of round-tripping through a token the parser would
    /// immediately throw away).
    pub fn next_token(&mut self) -> RsdResult<Token> {
        self.skip_whitespace_and_comments();
        let start = self.position();

        let b = match self.peek_byte() {
            None => return Ok(Token::new(TokenKind::Eof, start)),
            Some(b) => b,
        };

        match b {
            b'=' => {
                self.advance();
                Ok(Token::new(TokenKind::Assign, start))
            }
            b':' => {
                self.advance();
                Ok(Token::new(TokenKind::Colon, start))
            }
            b'@' => {
                self.advance();
                Ok(Token::new(TokenKind::At, start))
            }
            b';' => {
                self.advance();
                Ok(Token::new(TokenKind::Semicolon, start))
            }
            b',' => {
                self.advance();
                Ok(Token::new(TokenKind::Comma, start))
            }
            b'(' => {
                self.advance();
                Ok(Token::new(TokenKind::LParen, start))
            }
            b')' => {
                self.advance();
                Ok(Token::new(TokenKind::RParen, start))
            }
            b'{' => {
                self.advance();
                Ok(Token::new(TokenKind::LBrace, start))
            }
            b'}' => {
                self.advance();
                Ok(Token::new(TokenKind::RBrace, start))
            }
            b'[' => {
                self.advance();
                Ok(Token::new(TokenKind::LBracket, start))
            }
            b']' => {
                self.advance();
                Ok(Token::new(TokenKind::RBracket, start))
            }
            b'"' => self.read_string(start),
            b'.' if !matches!(self.peek_byte_at(1), Some(d) if d.is_ascii_digit()) => {
                self.advance();
                Ok(Token::new(TokenKind::Dot, start))
            }
            b'-' | b'0'..=b'9' | b'.' => self.read_number(start),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => Ok(self.read_identifier(start)),
            other => Err(RsdError::token(
                self.source_name.clone(),
                start,
                format!("unexpected character '{}'", other as char),
            )),
        }
    }

    fn read_identifier(&mut self, start: Position) -> Token {
        let byte_start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[byte_start..self.pos];
        let kind = match text {
            "include" => TokenKind::Include,
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            _ => TokenKind::Identifier(text.to_string()),
        };
        Token::new(kind, start)
    }

    fn read_string(&mut self, start: Position) -> RsdResult<Token> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None => {
                    return Err(RsdError::token(
                        self.source_name.clone(),
                        start,
                        "unterminated string literal",
                    ))
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b'r') => value.push('\r'),
                        Some(b't') => value.push('\t'),
                        Some(other) => value.push(other as char),
                        None => {
                            return Err(RsdError::token(
                                self.source_name.clone(),
                                start,
                                "unterminated string literal",
                            ))
                        }
                    }
                }
                Some(_) => {
                    let byte_start = self.pos;
                    // Advance by one UTF-8 scalar, not necessarily one byte.
                    let ch = self.source[byte_start..].chars().next().unwrap();
                    for _ in 0..ch.len_utf8() {
                        self.advance();
                    }
                    value.push(ch);
                }
            }
        }
        Ok(Token::new(TokenKind::String(value), start))
    }

    /// Consumes a `('e'|'E') [sign] digit+` exponent if one is present at the
    /// cursor, reporting whether it did.
    fn read_exponent(&mut self) -> bool {
        if !matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            return false;
        }
        let mut lookahead = 1;
        if matches!(self.peek_byte_at(1), Some(b'+') | Some(b'-')) {
            lookahead = 2;
        }
        if !matches!(self.peek_byte_at(lookahead), Some(d) if d.is_ascii_digit()) {
            return false;
        }
        self.advance();
        if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
            self.advance();
        }
        while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
            self.advance();
        }
        true
    }

    fn read_number(&mut self, start: Position) -> RsdResult<Token> {
        let byte_start = self.pos;
        let negative = self.peek_byte() == Some(b'-');
        if negative {
            self.advance();
        }

        // A leading `.` (always followed by a digit here — `next_token`'s
        // `Dot` arm routes any other `.` to the accessor token instead)
        // starts a fractional literal with no integer part, e.g. `.5` ==
        // `0.5` (the original tokenizer accepts this; see `Tokenizer.cpp`).
        if self.peek_byte() == Some(b'.') {
            self.advance();
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.advance();
            }
            self.read_exponent();
            let text = &self.source[byte_start..self.pos];
            let value: f64 = text.parse().map_err(|_| {
                RsdError::token(self.source_name.clone(), start, format!("invalid float literal '{text}'"))
            })?;
            return Ok(Token::new(TokenKind::Float(value), start));
        }

        let radix;
        let digits_start;
        if self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'b') | Some(b'B'))
        {
            self.advance();
            self.advance();
            radix = 2;
            digits_start = self.pos;
        } else if self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'x') | Some(b'X'))
        {
            self.advance();
            self.advance();
            radix = 16;
            digits_start = self.pos;
        } else if self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'0'..=b'7'))
        {
            self.advance();
            radix = 8;
            digits_start = self.pos;
        } else {
            radix = 10;
            digits_start = self.pos;
        }

        let is_radix_digit = |b: u8| match radix {
            2 => matches!(b, b'0' | b'1'),
            8 => matches!(b, b'0'..=b'7'),
            16 => b.is_ascii_hexdigit(),
            _ => b.is_ascii_digit(),
        };

        while let Some(b) = self.peek_byte() {
            if is_radix_digit(b) {
                self.advance();
            } else if radix != 10 && b.is_ascii_alphanumeric() {
                // Invalid digit for an explicitly-prefixed radix (0b/0o/0x).
                // Plain decimal mode has no prefix to misread, so a trailing
                // letter simply ends the number instead of erroring.
                return Err(RsdError::token(
                    self.source_name.clone(),
                    start,
                    format!("invalid digit for base-{radix} integer literal"),
                ));
            } else {
                break;
            }
        }
        if self.pos == digits_start {
            return Err(RsdError::token(
                self.source_name.clone(),
                start,
                "expected digits after numeric prefix",
            ));
        }

        let mut is_float = false;
        if radix == 10 {
            if self.peek_byte() == Some(b'.')
                && matches!(self.peek_byte_at(1), Some(d) if d.is_ascii_digit())
            {
                is_float = true;
                self.advance();
                while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                    self.advance();
                }
            }
            if self.read_exponent() {
                is_float = true;
            }
        }

        let text = &self.source[byte_start..self.pos];
        if is_float {
            let value: f64 = text.parse().map_err(|_| {
                RsdError::token(self.source_name.clone(), start, format!("invalid float literal '{text}'"))
            })?;
            Ok(Token::new(TokenKind::Float(value), start))
        } else {
            let digits = &self.source[digits_start..self.pos];
            let magnitude = i64::from_str_radix(digits, radix).map_err(|_| {
                RsdError::token(self.source_name.clone(), start, format!("invalid integer literal '{text}'"))
            })?;
            let value = if negative { -magnitude } else { magnitude };
            Ok(Token::new(TokenKind::Integer(value), start))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Tokenizer::new(src, 0, "test.rsd")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_assignment() {
        assert_eq!(
            kinds("x = 3;"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Integer(3),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reserved_identifiers_become_keywords() {
        assert_eq!(
            kinds("include true false"),
            vec![TokenKind::Include, TokenKind::Boolean(true), TokenKind::Boolean(false), TokenKind::Eof]
        );
    }

    #[test]
    fn negative_float_with_exponent() {
        assert_eq!(kinds("-1.5e-2"), vec![TokenKind::Float(-1.5e-2), TokenKind::Eof]);
    }

    #[test]
    fn leading_dot_float_has_no_integer_part() {
        assert_eq!(kinds(".5"), vec![TokenKind::Float(0.5), TokenKind::Eof]);
        assert_eq!(kinds("-.5"), vec![TokenKind::Float(-0.5), TokenKind::Eof]);
        assert_eq!(kinds(".5e1"), vec![TokenKind::Float(5.0), TokenKind::Eof]);
    }

    #[test]
    fn hex_and_binary_and_octal_integers() {
        assert_eq!(
            kinds("0xFF 0b101 0o_is_not_octal_017"),
            vec![
                TokenKind::Integer(255),
                TokenKind::Integer(5),
                TokenKind::Integer(0),
                TokenKind::Identifier("o_is_not_octal_017".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lone_dot_is_accessor_not_number() {
        assert_eq!(kinds("a.b"), vec![
            TokenKind::Identifier("a".into()),
            TokenKind::Dot,
            TokenKind::Identifier("b".into()),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\nb\tc\qd""#), vec![TokenKind::String("a\nb\tc\u{71}d".into()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_is_token_error() {
        let err = Tokenizer::new("\"abc", 0, "test.rsd").tokenize().unwrap_err();
        assert!(matches!(err, RsdError::Token { .. }));
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(
            kinds("x = 1; // trailing comment\ny = 2;"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Integer(1),
                TokenKind::Semicolon,
                TokenKind::Identifier("y".into()),
                TokenKind::Assign,
                TokenKind::Integer(2),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn token_positions_track_line_and_column() {
        let tokens = Tokenizer::new("x\n  = 1;", 0, "test.rsd").tokenize().unwrap();
        assert_eq!(tokens[0].position.line, 1);
        assert_eq!(tokens[1].position.line, 2);
        assert_eq!(tokens[1].position.column, 3);
    }
}
