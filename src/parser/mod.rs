//! Parser module
//!
//! Builds the raw node tree from the token stream in a single pass with an
//! explicit open-element stack, so deeply nested markup cannot overflow the
//! call stack. The parser is total: any token sequence produces a tree, and
//! defects become node diagnostics instead of lost subtrees.

pub mod ast;

use crate::tokenizer::tokens::{Token, TokenKind};
use crate::util::diag::Diagnostic;
use crate::util::span::Span;
use ast::*;

/// HTML elements that never have content and close immediately
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse tokens into a raw markup tree
///
/// The full tree, diagnostics included, is always returned.
pub fn parse(tokens: &[Token]) -> RawTree {
    Parser::new(tokens).run()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Open elements, innermost last
    stack: Vec<RawElement>,
    tree: RawTree,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            stack: Vec::new(),
            tree: RawTree::default(),
        }
    }

    #[inline]
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    fn bump(&mut self) {
        self.pos += 1;
    }

    fn run(mut self) -> RawTree {
        while let Some(token) = self.current() {
            match &token.kind {
                TokenKind::Eof => break,
                TokenKind::Text(text) => {
                    let node = RawNode::Literal(RawLiteral {
                        text: text.clone(),
                        span: token.span,
                    });
                    self.bump();
                    self.attach(node);
                }
                TokenKind::BindingExpression { kind, expression } => {
                    let node = RawNode::Binding(RawBinding {
                        kind: kind.clone(),
                        expression: expression.clone(),
                        span: token.span,
                    });
                    self.bump();
                    self.attach(node);
                }
                TokenKind::Directive { name, value } => {
                    let directive = RawDirective {
                        name: name.clone(),
                        value: value.clone(),
                        span: token.span,
                    };
                    let span = token.span;
                    self.bump();
                    if self.stack.is_empty() && self.tree.roots.is_empty() {
                        self.tree.directives.push(directive);
                    } else {
                        self.report(Diagnostic::error(
                            format!("directive '@{}' must appear at the top of the file", directive.name),
                            span,
                        ));
                    }
                }
                TokenKind::OpenTagBegin => {
                    let open_span = token.span;
                    self.bump();
                    self.parse_element(open_span);
                }
                TokenKind::CloseTagBegin => {
                    let close_span = token.span;
                    self.bump();
                    self.parse_close_tag(close_span);
                }
                TokenKind::Error(message) => {
                    let diagnostic = Diagnostic::error(message.clone(), token.span);
                    self.bump();
                    self.report(diagnostic);
                }
                // stray tag-mode tokens outside any tag
                other => {
                    let diagnostic =
                        Diagnostic::error(format!("unexpected token {:?}", other), token.span);
                    self.bump();
                    self.report(diagnostic);
                }
            }
        }

        // unclosed elements at end of input
        while let Some(mut element) = self.stack.pop() {
            element.diagnostics.push(Diagnostic::error(
                format!("element <{}> is never closed", element.full_name()),
                element.span,
            ));
            self.attach_popped(element);
        }

        self.tree
    }

    /// Attach a node to the innermost open element, or to the root
    fn attach(&mut self, node: RawNode) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        } else {
            self.tree.roots.push(node);
        }
    }

    fn attach_popped(&mut self, element: RawElement) {
        self.attach(RawNode::Element(element));
    }

    /// Attach a diagnostic to the innermost open element, or to the tree
    fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(top) = self.stack.last_mut() {
            top.diagnostics.push(diagnostic);
        } else {
            self.tree.diagnostics.push(diagnostic);
        }
    }

    /// Parse an element after its `<` token
    fn parse_element(&mut self, open_span: Span) {
        let mut element = match self.current() {
            Some(Token {
                kind: TokenKind::TagName { prefix, name },
                span,
            }) => {
                let element_span = open_span.merge(*span);
                let element = RawElement::new(prefix.clone(), name.clone(), element_span);
                self.bump();
                element
            }
            _ => {
                // tokenizer guarantees a name or an error token here
                self.report(Diagnostic::error("expected tag name", open_span));
                return;
            }
        };

        // attributes until the tag ends
        loop {
            match self.current().map(|t| (&t.kind, t.span)) {
                Some((TokenKind::AttributeName(name), span)) => {
                    let name = name.clone();
                    self.bump();
                    let value = self.parse_attribute_value(&mut element);
                    element.attributes.push(RawAttribute { name, value, span });
                }
                Some((TokenKind::TagEnd, span)) => {
                    self.bump();
                    element.span = element.span.merge(span);
                    if element.prefix.is_none()
                        && VOID_ELEMENTS.contains(&element.name.to_ascii_lowercase().as_str())
                    {
                        self.attach_popped(element);
                    } else {
                        self.stack.push(element);
                    }
                    return;
                }
                Some((TokenKind::SelfCloseTagEnd, span)) => {
                    self.bump();
                    element.span = element.span.merge(span);
                    element.self_closing = true;
                    self.attach_popped(element);
                    return;
                }
                Some((TokenKind::Error(message), span)) => {
                    element
                        .diagnostics
                        .push(Diagnostic::error(message.clone(), span));
                    self.bump();
                    // an unterminated tag leaves tag mode; close the element
                    self.attach_popped(element);
                    return;
                }
                Some((TokenKind::Eof, _)) | None => {
                    element.diagnostics.push(Diagnostic::error(
                        format!("element <{}> is never closed", element.full_name()),
                        element.span,
                    ));
                    self.attach_popped(element);
                    return;
                }
                Some((other, span)) => {
                    element.diagnostics.push(Diagnostic::error(
                        format!("unexpected token {:?} in tag", other),
                        span,
                    ));
                    self.bump();
                }
            }
        }
    }

    /// Parse the `= value` part after an attribute name, if present
    fn parse_attribute_value(&mut self, element: &mut RawElement) -> RawAttributeValue {
        if !matches!(self.current().map(|t| &t.kind), Some(TokenKind::Equals)) {
            return RawAttributeValue::Empty;
        }
        self.bump();

        match self.current().map(|t| (&t.kind, t.span)) {
            Some((TokenKind::AttributeValue(value), _)) => {
                let value = value.clone();
                self.bump();
                RawAttributeValue::Literal(value)
            }
            Some((TokenKind::BindingExpression { kind, expression }, _)) => {
                let value = RawAttributeValue::Binding {
                    kind: kind.clone(),
                    expression: expression.clone(),
                };
                self.bump();
                value
            }
            Some((TokenKind::Error(message), span)) => {
                element
                    .diagnostics
                    .push(Diagnostic::error(message.clone(), span));
                self.bump();
                RawAttributeValue::Empty
            }
            _ => {
                element.diagnostics.push(Diagnostic::error(
                    "attribute is missing its value",
                    element.span,
                ));
                RawAttributeValue::Empty
            }
        }
    }

    /// Parse a close tag after its `</` token
    fn parse_close_tag(&mut self, close_span: Span) {
        let (prefix, name, span) = match self.current() {
            Some(Token {
                kind: TokenKind::TagName { prefix, name },
                span,
            }) => {
                let parts = (prefix.clone(), name.clone(), close_span.merge(*span));
                self.bump();
                parts
            }
            _ => {
                self.report(Diagnostic::error("expected tag name after '</'", close_span));
                self.skip_to_tag_end();
                return;
            }
        };
        self.skip_to_tag_end();

        // best match: the innermost open element with the same tag
        let matched = self
            .stack
            .iter()
            .rposition(|e| e.matches_tag(prefix.as_deref(), &name));

        match matched {
            Some(index) => {
                // implicitly close anything opened inside the matched element
                while self.stack.len() > index + 1 {
                    let Some(mut unclosed) = self.stack.pop() else { break };
                    unclosed.diagnostics.push(Diagnostic::error(
                        format!(
                            "element <{}> implicitly closed by </{}>",
                            unclosed.full_name(),
                            match &prefix {
                                Some(p) => format!("{}:{}", p, name),
                                None => name.clone(),
                            }
                        ),
                        span,
                    ));
                    self.attach_popped(unclosed);
                }
                if let Some(mut element) = self.stack.pop() {
                    element.span = element.span.merge(span);
                    self.attach_popped(element);
                }
            }
            None => {
                // no match anywhere: record and leave the stack unchanged
                self.report(Diagnostic::error(
                    format!(
                        "close tag </{}> has no matching open tag",
                        match &prefix {
                            Some(p) => format!("{}:{}", p, name),
                            None => name.clone(),
                        }
                    ),
                    span,
                ));
            }
        }
    }

    /// Consume tokens up to and including the next tag end
    fn skip_to_tag_end(&mut self) {
        while let Some(token) = self.current() {
            match &token.kind {
                TokenKind::TagEnd | TokenKind::SelfCloseTagEnd => {
                    self.bump();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Error(message) => {
                    let diagnostic = Diagnostic::error(message.clone(), token.span);
                    self.bump();
                    self.report(diagnostic);
                    return;
                }
                _ => self.bump(),
            }
        }
    }
}

#[cfg(test)]
mod tests;
