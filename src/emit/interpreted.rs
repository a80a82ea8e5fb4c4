//! Interpreted emitter
//!
//! Walks the resolved tree and materializes the control-instance graph in
//! one pass. This is the path a host takes when it wants a live view
//! immediately and does not care about persisting an artifact.

use indexmap::IndexMap;

use crate::resolver::tree::{ResolvedControlNode, ResolvedTree, ResolvedValue, TypedValue};

use super::{ensure_assignable, EmitError, ViewEmitter};

/// A materialized control
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInstance {
    pub type_name: String,
    pub id: String,
    pub data_context: Option<String>,
    pub properties: IndexMap<String, InstanceValue>,
    pub html_attributes: IndexMap<String, InstanceValue>,
    pub children: Vec<ControlInstance>,
}

impl ControlInstance {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            data_context: None,
            properties: IndexMap::new(),
            html_attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Total number of controls in this subtree, templates included
    pub fn control_count(&self) -> usize {
        let mut count = 1;
        for child in &self.children {
            count += child.control_count();
        }
        for value in self.properties.values() {
            match value {
                InstanceValue::Control(inner) => count += inner.control_count(),
                InstanceValue::Collection(items) => {
                    count += items.iter().map(ControlInstance::control_count).sum::<usize>()
                }
                InstanceValue::Template(template) => {
                    count += template
                        .controls
                        .iter()
                        .map(ControlInstance::control_count)
                        .sum::<usize>()
                }
                _ => {}
            }
        }
        count
    }
}

/// A property value on a materialized control
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceValue {
    Value(TypedValue),
    /// Unevaluated binding, for the host's binding engine
    Binding { kind: String, expression: String },
    Control(Box<ControlInstance>),
    Template(TemplateInstance),
    Collection(Vec<ControlInstance>),
}

/// A deferred template body, instantiated but not attached to the tree
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateInstance {
    pub controls: Vec<ControlInstance>,
}

/// Direct tree-to-instances emitter
#[derive(Debug, Default)]
pub struct InterpretedEmitter;

impl InterpretedEmitter {
    pub fn new() -> Self {
        Self
    }

    fn instantiate_node(&self, node: &ResolvedControlNode) -> Result<ControlInstance, EmitError> {
        let mut instance = ControlInstance::new(&node.metadata.type_name, &node.id);
        instance.data_context = node.data_context.clone();

        for (name, value) in &node.assignments {
            ensure_assignable(node, name, value)?;
            instance
                .properties
                .insert(name.clone(), self.instantiate_value(value)?);
        }
        for (name, value) in &node.html_attributes {
            instance
                .html_attributes
                .insert(name.clone(), self.instantiate_value(value)?);
        }
        for child in &node.children {
            instance.children.push(self.instantiate_node(child)?);
        }
        Ok(instance)
    }

    fn instantiate_value(&self, value: &ResolvedValue) -> Result<InstanceValue, EmitError> {
        Ok(match value {
            ResolvedValue::Literal(literal) => InstanceValue::Value(literal.clone()),
            ResolvedValue::Binding { kind, expression } => InstanceValue::Binding {
                kind: kind.clone(),
                expression: expression.clone(),
            },
            ResolvedValue::Control(node) => {
                InstanceValue::Control(Box::new(self.instantiate_node(node)?))
            }
            ResolvedValue::Template(nodes) => InstanceValue::Template(TemplateInstance {
                controls: nodes
                    .iter()
                    .map(|n| self.instantiate_node(n))
                    .collect::<Result<_, _>>()?,
            }),
            ResolvedValue::Collection(nodes) => InstanceValue::Collection(
                nodes
                    .iter()
                    .map(|n| self.instantiate_node(n))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl ViewEmitter for InterpretedEmitter {
    type Artifact = ControlInstance;

    fn emit(&mut self, tree: &ResolvedTree) -> Result<ControlInstance, EmitError> {
        self.instantiate_node(&tree.root)
    }
}
