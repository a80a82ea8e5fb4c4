//! Post-resolution tree passes
//!
//! Two passes run after the tree is built: a pure rewriting normalization
//! pass, then a validation pass that collects every semantic error it finds.

use std::collections::HashSet;

use crate::metadata::{builtin, ControlRegistry, MappingMode, ValueType};
use crate::resolver::tree::{ResolvedControlNode, ResolvedValue, TypedValue};
use crate::resolver::ResolveError;

/// Normalization: merge adjacent literal text nodes and drop the ones left
/// with only whitespace. Post-order, so nested literals are merged before
/// their parents rewrite their own child lists.
pub fn normalize(node: &mut ResolvedControlNode) {
    for child in &mut node.children {
        normalize(child);
    }
    for value in node.assignments.values_mut() {
        match value {
            ResolvedValue::Control(inner) => normalize(inner),
            ResolvedValue::Template(nodes) | ResolvedValue::Collection(nodes) => {
                for inner in nodes.iter_mut() {
                    normalize(inner);
                }
            }
            _ => {}
        }
    }

    merge_literal_runs(&mut node.children);
    node.children
        .retain(|child| literal_text(child).map(|t| t.trim().is_empty()) != Some(true));
}

fn merge_literal_runs(children: &mut Vec<ResolvedControlNode>) {
    let mut index = 0;
    while index + 1 < children.len() {
        let next_text = literal_text(&children[index + 1]).map(str::to_string);
        match (literal_text(&children[index]).is_some(), next_text) {
            (true, Some(next)) => {
                let next_span = children[index + 1].span;
                let current = &mut children[index];
                if let Some(ResolvedValue::Literal(TypedValue::String(text))) =
                    current.assignments.get_mut("Text")
                {
                    text.push_str(&next);
                }
                current.span = current.span.merge(next_span);
                children.remove(index + 1);
            }
            _ => index += 1,
        }
    }
}

/// Text of a plain literal node; bindings and non-literal controls yield None
fn literal_text(node: &ResolvedControlNode) -> Option<&str> {
    if node.metadata.type_name != builtin::LITERAL {
        return None;
    }
    match node.assignments.get("Text") {
        Some(ResolvedValue::Literal(TypedValue::String(text))) => Some(text),
        _ => None,
    }
}

/// Validation: every assignment must match the declared shape of its
/// property, and node ids must be unique. All findings are collected.
pub fn validate(
    root: &ResolvedControlNode,
    registry: &ControlRegistry,
    errors: &mut Vec<ResolveError>,
) {
    let mut seen_ids = HashSet::new();
    root.walk(&mut |node| {
        if !seen_ids.insert(node.id.clone()) {
            errors.push(ResolveError::InvalidAssignment {
                property: node.metadata.type_name.clone(),
                detail: format!("duplicate control id '{}'", node.id),
                span: node.span,
            });
        }
        validate_node(node, registry, errors);
    });
}

fn validate_node(
    node: &ResolvedControlNode,
    registry: &ControlRegistry,
    errors: &mut Vec<ResolveError>,
) {
    for (name, value) in &node.assignments {
        let Some(descriptor) = registry.find_property(&node.metadata, name) else {
            errors.push(ResolveError::UnknownProperty {
                control: node.metadata.type_name.clone(),
                attribute: name.clone(),
                span: node.span,
            });
            continue;
        };

        let mismatch = |detail: &str| ResolveError::InvalidAssignment {
            property: descriptor.qualified_id.clone(),
            detail: detail.to_string(),
            span: node.span,
        };

        if descriptor.mapping_mode == MappingMode::Excluded {
            errors.push(mismatch("property is excluded from markup"));
            continue;
        }

        if descriptor.is_collection {
            if !matches!(value, ResolvedValue::Collection(_)) {
                errors.push(mismatch("collection property requires element content"));
            }
            continue;
        }

        match descriptor.value_type {
            ValueType::Template => {
                if !matches!(value, ResolvedValue::Template(_)) {
                    errors.push(mismatch("template property requires a template body"));
                }
            }
            ValueType::Control => {
                if !matches!(value, ResolvedValue::Control(_)) {
                    errors.push(mismatch("control property requires a child element"));
                }
            }
            scalar => match value {
                ResolvedValue::Literal(literal) if !literal.matches(scalar) => {
                    errors.push(mismatch("literal does not match the declared type"));
                }
                ResolvedValue::Literal(_) | ResolvedValue::Binding { .. } => {}
                _ => errors.push(mismatch("scalar property requires a literal or binding")),
            },
        }
    }
}
