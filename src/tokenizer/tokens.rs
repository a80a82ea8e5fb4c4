//! Token types

use crate::util::span::Span;

/// Token kind
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `<` opening an element tag
    OpenTagBegin,
    /// `</` opening a close tag
    CloseTagBegin,
    /// `>` ending a tag
    TagEnd,
    /// `/>` ending a self-closing tag
    SelfCloseTagEnd,
    /// Tag name, with optional registration prefix (`prefix:Name`)
    TagName {
        prefix: Option<String>,
        name: String,
    },
    /// Attribute name inside a tag
    AttributeName(String),
    /// `=` between an attribute name and its value
    Equals,
    /// Literal attribute value (quotes stripped)
    AttributeValue(String),
    /// Binding marker `{kind: expression}` in an attribute value, or
    /// `{{kind: expression}}` inline in text
    BindingExpression { kind: String, expression: String },
    /// Free text between tags
    Text(String),
    /// Root-level directive line `@name value`
    Directive { name: String, value: String },
    /// Lexical error; the remainder of the construct is consumed
    Error(String),

    Eof,
}

/// Token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[inline]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }
}
