//! Tokenizer module
//!
//! Turns markup text into a finite token sequence. Tokenization never
//! aborts: malformed constructs produce [`TokenKind::Error`] tokens and
//! scanning always continues to end of input.

pub mod tokens;

use tokens::*;

use crate::util::span::{Position, Span};
use std::collections::VecDeque;

/// Tokenize markup source
///
/// The returned sequence always ends with an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    for token in &mut tokenizer {
        tokens.push(token);
    }

    let end = tokenizer.current_position();
    tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
    tokens
}

/// Lazy, non-restartable token stream over markup source
pub struct Tokenizer<'a> {
    source: &'a str,
    /// Byte offset into `source`
    pos: usize,
    line: usize,
    column: usize,
    start: Position,
    /// One scan step may produce several tokens
    queue: VecDeque<Token>,
    /// Inside an element tag (between `<`/`</` and `>`/`/>`)
    in_tag: bool,
    /// The next tag-mode token is the tag name
    expect_tag_name: bool,
    /// Set once the first element or non-whitespace content is consumed;
    /// directives are only recognized before that point
    seen_markup: bool,
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(token);
            }
            if self.at_end() {
                return None;
            }
            if self.in_tag {
                self.scan_tag();
            } else {
                self.scan_content();
            }
        }
    }
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            start: Position::new(1, 1, 0),
            queue: VecDeque::new(),
            in_tag: false,
            expect_tag_name: false,
            seen_markup: false,
        }
    }

    // not named `position`: `Iterator::position` would win method
    // resolution on an `&mut self` receiver
    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn span(&self) -> Span {
        Span::new(self.start, self.current_position())
    }

    fn mark_start(&mut self) {
        self.start = self.current_position();
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    #[inline]
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `s` if the remaining input starts with it
    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            for _ in s.chars() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn emit(&mut self, kind: TokenKind) {
        let span = self.span();
        self.queue.push_back(Token::new(kind, span));
    }

    fn emit_error(&mut self, message: impl Into<String>) {
        self.emit(TokenKind::Error(message.into()));
    }

    // ---- content mode ----

    fn scan_content(&mut self) {
        if !self.seen_markup && self.try_scan_directive() {
            return;
        }

        self.mark_start();

        if self.rest().starts_with("<!--") {
            self.scan_comment();
        } else if self.rest().starts_with("</") {
            self.eat("</");
            self.emit(TokenKind::CloseTagBegin);
            self.in_tag = true;
            self.expect_tag_name = true;
            self.seen_markup = true;
        } else if self.peek() == Some('<') {
            if self.rest()[1..].starts_with(is_name_start) {
                self.advance();
                self.emit(TokenKind::OpenTagBegin);
                self.in_tag = true;
                self.expect_tag_name = true;
                self.seen_markup = true;
            } else {
                self.advance();
                self.emit_error("unexpected '<' without a tag name");
            }
        } else if self.rest().starts_with("{{") {
            self.scan_inline_binding();
        } else {
            self.scan_text();
        }
    }

    /// Recognize a root directive line `@name value`, allowing leading
    /// whitespace. Returns false without consuming anything otherwise.
    fn try_scan_directive(&mut self) -> bool {
        let ws = self
            .rest()
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| i)
            .unwrap_or_else(|| self.rest().len());
        if !self.rest()[ws..].starts_with('@') {
            return false;
        }
        for _ in self.rest()[..ws].chars() {
            self.advance();
        }

        self.mark_start();
        self.advance(); // '@'

        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            name.push(c);
            self.advance();
        }

        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            value.push(c);
            self.advance();
        }
        self.advance(); // consume the newline, if any

        if name.is_empty() {
            self.emit_error("directive is missing a name");
        } else {
            self.emit(TokenKind::Directive {
                name,
                value: value.trim().to_string(),
            });
        }
        true
    }

    fn scan_comment(&mut self) {
        self.eat("<!--");
        loop {
            if self.at_end() {
                // comment is dropped, but the defect is kept
                self.emit_error("unterminated comment");
                return;
            }
            if self.eat("-->") {
                return;
            }
            self.advance();
        }
    }

    fn scan_inline_binding(&mut self) {
        self.eat("{{");
        let mut body = String::new();
        loop {
            if self.at_end() {
                self.emit_error("unterminated binding expression");
                return;
            }
            if self.eat("}}") {
                break;
            }
            body.push(self.advance().unwrap_or_default());
        }
        match parse_binding_body(&body) {
            Some((kind, expression)) => {
                self.seen_markup = true;
                self.emit(TokenKind::BindingExpression { kind, expression });
            }
            None => self.emit_error(format!("malformed binding expression '{{{{{}}}}}'", body)),
        }
    }

    fn scan_text(&mut self) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '<' || self.rest().starts_with("{{") {
                break;
            }
            text.push(c);
            self.advance();
        }
        if !text.trim().is_empty() {
            self.seen_markup = true;
        }
        if !text.is_empty() {
            self.emit(TokenKind::Text(text));
        }
    }

    // ---- tag mode ----

    fn scan_tag(&mut self) {
        self.skip_tag_whitespace();
        self.mark_start();

        if self.at_end() {
            self.emit_error("unterminated tag");
            self.in_tag = false;
            return;
        }

        if self.expect_tag_name {
            self.expect_tag_name = false;
            self.scan_tag_name();
            return;
        }

        if self.eat("/>") {
            self.emit(TokenKind::SelfCloseTagEnd);
            self.in_tag = false;
        } else if self.eat(">") {
            self.emit(TokenKind::TagEnd);
            self.in_tag = false;
        } else if self.peek().map(is_name_start).unwrap_or(false) {
            self.scan_attribute();
        } else {
            let c = self.advance().unwrap_or_default();
            self.emit_error(format!("unexpected character '{}' in tag", c));
        }
    }

    fn scan_tag_name(&mut self) {
        if !self.peek().map(is_name_start).unwrap_or(false) {
            self.emit_error("expected tag name");
            self.recover_to_tag_end();
            return;
        }

        let raw = self.scan_name(true);
        let (prefix, name) = match raw.split_once(':') {
            Some((p, n)) => (Some(p.to_string()), n.to_string()),
            None => (None, raw),
        };
        self.emit(TokenKind::TagName { prefix, name });
    }

    fn scan_attribute(&mut self) {
        let name = self.scan_name(false);
        self.emit(TokenKind::AttributeName(name));

        self.skip_tag_whitespace();
        if self.peek() != Some('=') {
            return; // valueless attribute
        }
        self.mark_start();
        self.advance();
        self.emit(TokenKind::Equals);

        self.skip_tag_whitespace();
        self.mark_start();
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.advance();
                self.scan_quoted_value(q);
            }
            Some(_) => self.scan_unquoted_value(),
            None => {
                self.emit_error("unterminated tag");
                self.in_tag = false;
            }
        }
    }

    fn scan_quoted_value(&mut self, quote: char) {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.emit_error("unterminated attribute value");
                    self.in_tag = false;
                    return;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('>') if value.contains('\n') => {
                    // runaway quote across lines; close at tag end
                    self.emit_error("unterminated attribute value");
                    return;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        self.emit_attribute_value(value);
    }

    fn scan_unquoted_value(&mut self) {
        let mut value = String::new();
        if self.peek() == Some('{') {
            // binding value without quotes
            let mut depth = 0usize;
            while let Some(c) = self.peek() {
                value.push(c);
                self.advance();
                if c == '{' {
                    depth += 1;
                } else if c == '}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c.is_whitespace() || c == '>' || c == '/' {
                    break;
                }
                value.push(c);
                self.advance();
            }
        }
        self.emit_attribute_value(value);
    }

    fn emit_attribute_value(&mut self, value: String) {
        let trimmed = value.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.len() >= 2 {
            let body = &trimmed[1..trimmed.len() - 1];
            match parse_binding_body(body) {
                Some((kind, expression)) => {
                    self.emit(TokenKind::BindingExpression { kind, expression })
                }
                None => self.emit_error(format!("malformed binding expression '{}'", trimmed)),
            }
        } else {
            self.emit(TokenKind::AttributeValue(value));
        }
    }

    fn scan_name(&mut self, allow_colon: bool) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_name_char(c) || (allow_colon && c == ':' && !name.contains(':')) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn skip_tag_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn recover_to_tag_end(&mut self) {
        while let Some(c) = self.peek() {
            if c == '>' {
                self.mark_start();
                self.advance();
                self.emit(TokenKind::TagEnd);
                break;
            }
            self.advance();
        }
        self.in_tag = false;
    }
}

/// Split a binding body `kind: expression` into its parts
fn parse_binding_body(body: &str) -> Option<(String, String)> {
    let (kind, expression) = body.split_once(':')?;
    let kind = kind.trim();
    let expression = expression.trim();
    if kind.is_empty() || expression.is_empty() || !kind.chars().all(is_name_char) {
        return None;
    }
    Some((kind.to_string(), expression.to_string()))
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}
