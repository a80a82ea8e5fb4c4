//! Raw markup tree
//!
//! The parser output: an error-tolerant tree of untyped nodes. Nodes carry
//! their own diagnostics; a defective construct is kept in the tree rather
//! than dropped. Type resolution happens later against the metadata
//! registry.

use smallvec::SmallVec;

use crate::util::diag::Diagnostic;
use crate::util::span::Span;

/// A whole parsed markup file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTree {
    /// Root-level directives (`@name value`)
    pub directives: Vec<RawDirective>,
    /// Top-level content nodes
    pub roots: Vec<RawNode>,
    /// Diagnostics not attributable to a single node
    pub diagnostics: Vec<Diagnostic>,
}

impl RawTree {
    /// Find a directive by name (first occurrence wins)
    pub fn directive(&self, name: &str) -> Option<&RawDirective> {
        self.directives.iter().find(|d| d.name == name)
    }

    /// Collect all diagnostics in the tree, including node-level ones
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = self.diagnostics.clone();
        for node in &self.roots {
            collect_node_diagnostics(node, &mut out);
        }
        out
    }

    /// True if the input had lexical or structural defects
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
            || self.roots.iter().any(node_has_errors)
    }
}

fn collect_node_diagnostics(node: &RawNode, out: &mut Vec<Diagnostic>) {
    if let RawNode::Element(element) = node {
        out.extend(element.diagnostics.iter().cloned());
        for child in &element.children {
            collect_node_diagnostics(child, out);
        }
    }
}

fn node_has_errors(node: &RawNode) -> bool {
    match node {
        RawNode::Element(element) => {
            element.diagnostics.iter().any(Diagnostic::is_error)
                || element.children.iter().any(node_has_errors)
        }
        _ => false,
    }
}

/// Raw tree node
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    Element(RawElement),
    Literal(RawLiteral),
    Binding(RawBinding),
}

impl RawNode {
    pub fn span(&self) -> Span {
        match self {
            RawNode::Element(e) => e.span,
            RawNode::Literal(l) => l.span,
            RawNode::Binding(b) => b.span,
        }
    }

    /// Whitespace-only literals count as empty content
    pub fn is_whitespace(&self) -> bool {
        match self {
            RawNode::Literal(l) => l.text.trim().is_empty(),
            _ => false,
        }
    }
}

/// Element node `<prefix:Name attr=...>...</prefix:Name>`
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<RawAttribute>,
    pub children: Vec<RawNode>,
    pub self_closing: bool,
    pub span: Span,
    pub diagnostics: SmallVec<[Diagnostic; 1]>,
}

impl RawElement {
    pub fn new(prefix: Option<String>, name: String, span: Span) -> Self {
        Self {
            prefix,
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            span,
            diagnostics: SmallVec::new(),
        }
    }

    /// Tag name including prefix, as written in markup
    pub fn full_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    pub fn matches_tag(&self, prefix: Option<&str>, name: &str) -> bool {
        self.prefix.as_deref() == prefix && self.name == name
    }
}

/// Free text node
#[derive(Debug, Clone, PartialEq)]
pub struct RawLiteral {
    pub text: String,
    pub span: Span,
}

/// Inline binding node `{{kind: expression}}`
#[derive(Debug, Clone, PartialEq)]
pub struct RawBinding {
    pub kind: String,
    pub expression: String,
    pub span: Span,
}

/// Root directive `@name value`
#[derive(Debug, Clone, PartialEq)]
pub struct RawDirective {
    pub name: String,
    pub value: String,
    pub span: Span,
}

/// Attribute on an element
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub value: RawAttributeValue,
    pub span: Span,
}

/// Attribute value: literal text or a binding marker
#[derive(Debug, Clone, PartialEq)]
pub enum RawAttributeValue {
    Literal(String),
    Binding { kind: String, expression: String },
    /// Attribute written without a value
    Empty,
}
