//! Resolved (semantic) control tree

use std::sync::Arc;

use indexmap::IndexMap;

use crate::metadata::{ControlMetadata, ValueType};
use crate::parser::ast::RawDirective;
use crate::util::span::Span;

/// A fully resolved markup file
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTree {
    /// Root wrapper control
    pub root: ResolvedControlNode,
    /// Directives as written, for hosting layers that care
    pub directives: Vec<RawDirective>,
    /// Virtual path of the referenced master page, if any
    pub master_page: Option<String>,
    /// Imports declared by `@import` directives
    pub imports: Vec<String>,
    /// Identity of the compiled file
    pub origin: String,
}

/// One node of the semantic tree
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedControlNode {
    pub metadata: Arc<ControlMetadata>,
    /// Property assignments by property name, in markup order
    pub assignments: IndexMap<String, ResolvedValue>,
    /// Passthrough HTML attributes, for controls that accept them
    pub html_attributes: IndexMap<String, ResolvedValue>,
    pub children: Vec<ResolvedControlNode>,
    /// Data-context type in scope at this node
    pub data_context: Option<String>,
    /// Unique id within the compiled tree
    pub id: String,
    pub span: Span,
}

impl ResolvedControlNode {
    pub fn new(metadata: Arc<ControlMetadata>, id: String, span: Span) -> Self {
        Self {
            metadata,
            assignments: IndexMap::new(),
            html_attributes: IndexMap::new(),
            children: Vec::new(),
            data_context: None,
            id,
            span,
        }
    }

    /// Visit this node and all descendants, including nodes nested inside
    /// property values, depth-first
    pub fn walk(&self, visit: &mut impl FnMut(&ResolvedControlNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
        for value in self.assignments.values() {
            match value {
                ResolvedValue::Control(node) => node.walk(visit),
                ResolvedValue::Template(nodes) | ResolvedValue::Collection(nodes) => {
                    for node in nodes {
                        node.walk(visit);
                    }
                }
                _ => {}
            }
        }
    }
}

/// A resolved property value
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Literal converted to the declared type
    Literal(TypedValue),
    /// Binding kept verbatim for a later evaluator
    Binding { kind: String, expression: String },
    /// A single child control
    Control(Box<ResolvedControlNode>),
    /// Deferred template body
    Template(Vec<ResolvedControlNode>),
    /// Accumulated collection items
    Collection(Vec<ResolvedControlNode>),
}

/// A literal value converted to its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl TypedValue {
    /// Convert markup text to the declared value type
    pub fn convert(text: &str, target: ValueType) -> Result<TypedValue, String> {
        match target {
            ValueType::String => Ok(TypedValue::String(text.to_string())),
            ValueType::Int => text
                .trim()
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|_| format!("'{}' is not an integer", text)),
            // non-finite values are rejected: NaN never compares equal to
            // itself, which would break tree equality downstream
            ValueType::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(TypedValue::Float)
                .ok_or_else(|| format!("'{}' is not a finite number", text)),
            ValueType::Bool => match text.trim() {
                "true" | "True" => Ok(TypedValue::Bool(true)),
                "false" | "False" => Ok(TypedValue::Bool(false)),
                other => Err(format!("'{}' is not a boolean", other)),
            },
            ValueType::Control | ValueType::Template => {
                Err("control and template values cannot be written as text".to_string())
            }
        }
    }

    /// True when the value matches the declared scalar type
    pub fn matches(&self, target: ValueType) -> bool {
        matches!(
            (self, target),
            (TypedValue::String(_), ValueType::String)
                | (TypedValue::Int(_), ValueType::Int)
                | (TypedValue::Float(_), ValueType::Float)
                | (TypedValue::Bool(_), ValueType::Bool)
        )
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedValue::String(s) => write!(f, "{}", s),
            TypedValue::Int(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Bool(b) => write!(f, "{}", b),
        }
    }
}
