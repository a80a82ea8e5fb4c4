//! View emitters
//!
//! Two backends consume the resolved tree: the interpreted emitter builds a
//! live control-instance graph directly, and the compiled emitter lowers the
//! tree into builder routines that can be stored, rendered as source, and
//! executed later. Both observe the same tree and, for the same input,
//! produce the same instance graph.

pub mod compiled;
pub mod interpreted;

use crate::metadata::ValueType;
use crate::resolver::tree::{ResolvedControlNode, ResolvedTree, ResolvedValue};
use crate::util::span::Span;

/// Emission error
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmitError {
    #[error("builder routine '{name}' is not part of this artifact")]
    MissingRoutine { name: String },
    #[error("builder routine '{name}' is malformed: {detail}")]
    MalformedRoutine { name: String, detail: String },
    #[error("property {property} does not support this value shape at {span}")]
    UnsupportedValue { property: String, span: Span },
}

/// Shape check at emission time, deliberately redundant with resolver
/// validation: an artifact is never produced from an assignment the target
/// property cannot hold.
fn ensure_assignable(
    node: &ResolvedControlNode,
    name: &str,
    value: &ResolvedValue,
) -> Result<(), EmitError> {
    // attached properties were validated against the registry
    let Some(descriptor) = node.metadata.properties.get(name) else {
        return Ok(());
    };
    let supported = if descriptor.is_collection {
        matches!(value, ResolvedValue::Collection(_))
    } else {
        match descriptor.value_type {
            ValueType::Template => matches!(value, ResolvedValue::Template(_)),
            ValueType::Control => matches!(value, ResolvedValue::Control(_)),
            _ => matches!(
                value,
                ResolvedValue::Literal(_) | ResolvedValue::Binding { .. }
            ),
        }
    };
    if supported {
        Ok(())
    } else {
        Err(EmitError::UnsupportedValue {
            property: descriptor.qualified_id.clone(),
            span: node.span,
        })
    }
}

/// A backend that turns a resolved tree into an artifact
pub trait ViewEmitter {
    type Artifact;

    fn emit(&mut self, tree: &ResolvedTree) -> Result<Self::Artifact, EmitError>;
}

#[cfg(test)]
mod tests;
