//! Recursive-descent parser for both grammar entry points (spec §4.2): the
//! **document** grammar (a full `.rsd` file) and the **reference** grammar
//! (the inner text of a `${...}` expansion, or a programmatic
//! `Reference::from_str`).
//!
//! Grounded on the teacher's `src/parser/mod.rs` recursive-descent shape
//! (one struct walking a flat token vector by index, small `parse_*`
//! helpers per production). The teacher's `ParserCheckpoint`/`ParserGuard`
//! backtracking machinery is deliberately **not** ported: this grammar
//! resolves every ambiguity (macro vs. reference, block vs. reference) on
//! one token of lookahead, so nothing here ever needs to rewind.

use indexmap::IndexMap;

use crate::error::{RsdError, RsdResult};
use crate::macro_invocation::MacroInvocation;
use crate::reference::{Reference, ReferencePart};
use crate::span::Position;
use crate::token::{Token, TokenKind};
use crate::tokenizer::Tokenizer;
use crate::typename::TypeName;
use crate::value::Value;

/// Parses a full document, returning its root `Block`.
pub fn parse_document(source: &str, file: usize, source_name: impl Into<String>) -> RsdResult<Value> {
    let source_name = source_name.into();
    let tokens = Tokenizer::new(source, file, source_name.clone())
        .tokenize()
        .map_err(RsdError::into_parse)?;
    Parser::new(tokens, source_name).parse_document_root()
}

/// Parses the reference grammar alone — used for `${...}` expansion bodies
/// and `Reference::from_str`-style programmatic construction.
pub fn parse_reference(source: &str, file: usize, source_name: impl Into<String>) -> RsdResult<Reference> {
    let source_name = source_name.into();
    let tokens = Tokenizer::new(source, file, source_name.clone())
        .tokenize()
        .map_err(RsdError::into_parse)?;
    let mut parser = Parser::new(tokens, source_name);
    let parts = parser.parse_reference_parts()?;
    parser.expect_eof()?;
    Ok(Reference::new(parts))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source_name: String,
}

impl Parser {
    fn new(tokens: Vec<Token>, source_name: String) -> Self {
        Parser { tokens, pos: 0, source_name }
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn position(&self) -> Position {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error_at_current(&self, message: impl Into<String>) -> RsdError {
        RsdError::parse(self.source_name.clone(), self.position(), message)
    }

    fn wrap_value_error(&self, err: RsdError, position: Position) -> RsdError {
        match err {
            RsdError::Value { message } => RsdError::parse(self.source_name.clone(), position, message),
            other => other,
        }
    }

    fn expect_eof(&self) -> RsdResult<()> {
        match self.peek_kind() {
            TokenKind::Eof => Ok(()),
            other => Err(self.error_at_current(format!("expected end of input, found {}", other.label()))),
        }
    }

    fn expect_punct(&mut self, kind: TokenKind) -> RsdResult<Position> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(&kind) {
            Ok(self.advance().position)
        } else {
            Err(self.error_at_current(format!("expected {}, found {}", kind.label(), self.peek_kind().label())))
        }
    }

    fn expect_semicolon(&mut self) -> RsdResult<()> {
        self.expect_punct(TokenKind::Semicolon).map(|_| ())
    }

    fn expect_identifier(&mut self) -> RsdResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_at_current(format!("expected identifier, found {}", other.label()))),
        }
    }

    fn expect_string(&mut self, what: &str) -> RsdResult<String> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error_at_current(format!("expected {what}, found {}", other.label()))),
        }
    }

    fn expect_integer(&mut self) -> RsdResult<i64> {
        match self.peek_kind().clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(self.error_at_current(format!("expected integer literal, found {}", other.label()))),
        }
    }

    fn expect_float(&mut self) -> RsdResult<f64> {
        match self.peek_kind().clone() {
            TokenKind::Float(v) => {
                self.advance();
                Ok(v)
            }
            other => Err(self.error_at_current(format!("expected float literal, found {}", other.label()))),
        }
    }

    fn expect_boolean(&mut self) -> RsdResult<bool> {
        match self.peek_kind().clone() {
            TokenKind::Boolean(b) => {
                self.advance();
                Ok(b)
            }
            other => Err(self.error_at_current(format!("expected boolean literal, found {}", other.label()))),
        }
    }

    /// Parses `[ item { "," item } ]` with no trailing comma (spec §8:
    /// "trailing comma in array/macro args is a parse error").
    fn parse_comma_list<T>(
        &mut self,
        is_close: impl Fn(&TokenKind) -> bool,
        mut parse_item: impl FnMut(&mut Self) -> RsdResult<T>,
    ) -> RsdResult<Vec<T>> {
        let mut items = Vec::new();
        if is_close(self.peek_kind()) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                if is_close(self.peek_kind()) {
                    return Err(self.error_at_current("trailing comma is not allowed"));
                }
                continue;
            }
            break;
        }
        Ok(items)
    }

    // ---- document grammar ----

    fn parse_document_root(&mut self) -> RsdResult<Value> {
        let start = self.position();
        let root = Value::block();
        root.set_provenance(start);
        self.parse_node_list_into(&root)?;
        self.expect_eof()?;
        Ok(root)
    }

    fn parse_node_list_into(&mut self, container: &Value) -> RsdResult<()> {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RBrace => break,
                _ => self.parse_node(container)?,
            }
        }
        Ok(())
    }

    fn parse_node(&mut self, container: &Value) -> RsdResult<()> {
        if matches!(self.peek_kind(), TokenKind::Include) {
            let include_pos = self.advance().position;
            let filename = self.expect_string("include path")?;
            self.expect_semicolon()?;
            let placeholder = Value::block();
            placeholder.set_type_name(TypeName::include());
            placeholder.set_provenance(include_pos);
            container
                .append_named(filename, placeholder)
                .map_err(|e| self.wrap_value_error(e, include_pos))?;
            return Ok(());
        }

        let name = self.parse_node_name()?;
        self.expect_punct(TokenKind::Assign)?;
        let value = self.parse_node_value()?;
        self.expect_semicolon()?;
        let pos = value.provenance().unwrap_or_else(|| self.position());
        container.append_named(name, value).map_err(|e| self.wrap_value_error(e, pos))?;
        Ok(())
    }

    fn parse_node_name(&mut self) -> RsdResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::String(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_at_current(format!("expected a name, found {}", other.label()))),
        }
    }

    fn parse_node_value(&mut self) -> RsdResult<Value> {
        let type_name = self.parse_optional_type()?;
        let value = self.parse_value()?;
        if !type_name.is_empty() {
            value.set_type_name(type_name);
        }
        Ok(value)
    }

    fn parse_optional_type(&mut self) -> RsdResult<TypeName> {
        if !matches!(self.peek_kind(), TokenKind::At) {
            return Ok(TypeName::empty());
        }
        self.advance();
        let mut segments = vec![self.parse_node_name()?];
        while matches!(self.peek_kind(), TokenKind::Dot) {
            self.advance();
            segments.push(self.parse_node_name()?);
        }
        Ok(TypeName::from_segments(segments))
    }

    fn parse_value(&mut self) -> RsdResult<Value> {
        match self.peek_kind().clone() {
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Colon | TokenKind::LBrace => self.parse_block(),
            TokenKind::Integer(_) => {
                let pos = self.position();
                let n = self.expect_integer()?;
                let v = Value::integer(n);
                v.set_provenance(pos);
                Ok(v)
            }
            TokenKind::Float(_) => {
                let pos = self.position();
                let f = self.expect_float()?;
                let v = Value::float(f);
                v.set_provenance(pos);
                Ok(v)
            }
            TokenKind::String(_) => {
                let pos = self.position();
                let s = self.expect_string("string literal")?;
                let v = Value::string(s);
                v.set_provenance(pos);
                Ok(v)
            }
            TokenKind::Boolean(_) => {
                let pos = self.position();
                let b = self.expect_boolean()?;
                let v = Value::boolean(b);
                v.set_provenance(pos);
                Ok(v)
            }
            TokenKind::Identifier(_) => {
                if matches!(self.peek_kind_at(1), Some(TokenKind::LParen)) {
                    self.parse_macro()
                } else {
                    self.parse_reference_value()
                }
            }
            other => Err(self.error_at_current(format!("expected a value, found {}", other.label()))),
        }
    }

    fn parse_array(&mut self) -> RsdResult<Value> {
        let start = self.expect_punct(TokenKind::LBracket)?;
        let items = self.parse_comma_list(|k| matches!(k, TokenKind::RBracket), |p| p.parse_node_value())?;
        self.expect_punct(TokenKind::RBracket)?;
        let value = Value::array(items);
        value.set_provenance(start);
        Ok(value)
    }

    fn parse_block(&mut self) -> RsdResult<Value> {
        let inherits = if matches!(self.peek_kind(), TokenKind::Colon) {
            self.advance();
            let parts = self.parse_reference_parts()?;
            Some(Value::reference(Reference::new(parts)))
        } else {
            None
        };
        let start = self.expect_punct(TokenKind::LBrace)?;
        let block = Value::block();
        if inherits.is_some() {
            block.set_inherits(inherits).expect("freshly constructed block");
        }
        self.parse_node_list_into(&block)?;
        self.expect_punct(TokenKind::RBrace)?;
        block.set_provenance(start);
        Ok(block)
    }

    fn parse_macro(&mut self) -> RsdResult<Value> {
        let start = self.position();
        let name = self.expect_identifier()?;
        self.expect_punct(TokenKind::LParen)?;
        let args =
            self.parse_comma_list(|k| matches!(k, TokenKind::RParen), |p| p.parse_kw_arg())?;
        self.expect_punct(TokenKind::RParen)?;

        let mut map = IndexMap::new();
        for (key, value) in args {
            if map.contains_key(&key) {
                return Err(RsdError::parse(
                    self.source_name.clone(),
                    start,
                    format!("duplicate macro argument '{key}'"),
                ));
            }
            map.insert(key, value);
        }

        let value = Value::macro_invocation(MacroInvocation::new(name, map));
        value.set_provenance(start);
        Ok(value)
    }

    fn parse_kw_arg(&mut self) -> RsdResult<(String, Value)> {
        let name = self.expect_identifier()?;
        self.expect_punct(TokenKind::Colon)?;
        let value = self.parse_node_value()?;
        Ok((name, value))
    }

    fn parse_reference_value(&mut self) -> RsdResult<Value> {
        let start = self.position();
        let parts = self.parse_reference_parts()?;
        let value = Value::reference(Reference::new(parts));
        value.set_provenance(start);
        Ok(value)
    }

    // ---- reference grammar (shared with `: reference` and subscripts) ----

    fn parse_reference_parts(&mut self) -> RsdResult<Vec<ReferencePart>> {
        let mut parts = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            parts.push(ReferencePart::Identifier(name));
            while matches!(self.peek_kind(), TokenKind::LBracket) {
                self.advance();
                let sub = self.parse_subscript_value()?;
                self.expect_punct(TokenKind::RBracket)?;
                parts.push(ReferencePart::Subscript(sub));
            }
            if matches!(self.peek_kind(), TokenKind::Dot) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(parts)
    }

    fn parse_subscript_value(&mut self) -> RsdResult<Value> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(_) => {
                if matches!(self.peek_kind_at(1), Some(TokenKind::LParen)) {
                    self.parse_macro()
                } else {
                    self.parse_reference_value()
                }
            }
            TokenKind::Integer(_) => {
                let pos = self.position();
                let n = self.expect_integer()?;
                let v = Value::integer(n);
                v.set_provenance(pos);
                Ok(v)
            }
            TokenKind::String(_) => {
                let pos = self.position();
                let s = self.expect_string("string literal")?;
                let v = Value::string(s);
                v.set_provenance(pos);
                Ok(v)
            }
            other => Err(self.error_at_current(format!("expected a subscript value, found {}", other.label()))),
        }
    }
}
