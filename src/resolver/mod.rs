//! Control tree resolver
//!
//! Turns the raw node tree into the typed semantic tree by resolving every
//! element against the metadata registry: property routing, literal
//! conversion, binding-kind lookup, data-context propagation, and the
//! normalization and validation passes.
//!
//! Structural violations (unknown control, unknown binding kind, invalid
//! base type) fail fast. Semantic violations are accumulated so a single
//! compile reports every defect in the file; any of them still fails
//! resolution as a whole, surfacing the first and retaining the rest as
//! diagnostics.

pub mod passes;
pub mod tree;

use std::sync::Arc;

use tracing::debug;

use crate::metadata::{
    builtin, ControlMetadata, ControlRegistry, MappingMode, MetadataError, PropertyDescriptor,
    ValueType,
};
use crate::parser::ast::{RawAttribute, RawAttributeValue, RawElement, RawNode, RawTree};
use crate::util::diag::Diagnostic;
use crate::util::span::Span;
use tree::{ResolvedControlNode, ResolvedTree, ResolvedValue, TypedValue};

/// Directive names understood by the resolver
pub mod directives {
    pub const BASE_TYPE: &str = "baseType";
    pub const MASTER_PAGE: &str = "masterPage";
    pub const VIEW_MODEL: &str = "viewModel";
    pub const IMPORT: &str = "import";
}

/// Resolution error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("{source} at {span}")]
    Metadata {
        #[source]
        source: MetadataError,
        span: Span,
    },

    #[error("'{type_name}' cannot be used as a base type at {span}")]
    InvalidBaseType { type_name: String, span: Span },

    #[error("content is not allowed inside <{control}> at {span}")]
    ContentNotAllowed { control: String, span: Span },

    #[error("cannot convert '{value}' for property {property} at {span}: {detail}")]
    ValueConversion {
        property: String,
        value: String,
        detail: String,
        span: Span,
    },

    #[error("control {control} does not have a property '{attribute}' at {span}")]
    UnknownProperty {
        control: String,
        attribute: String,
        span: Span,
    },

    #[error("property {property} accepts a single child element at {span}")]
    SingleChildExpected { property: String, span: Span },

    #[error("property {property} is assigned more than once at {span}")]
    DuplicateAssignment { property: String, span: Span },

    #[error("invalid assignment to {property} at {span}: {detail}")]
    InvalidAssignment {
        property: String,
        detail: String,
        span: Span,
    },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::Metadata { span, .. }
            | ResolveError::InvalidBaseType { span, .. }
            | ResolveError::ContentNotAllowed { span, .. }
            | ResolveError::ValueConversion { span, .. }
            | ResolveError::UnknownProperty { span, .. }
            | ResolveError::SingleChildExpected { span, .. }
            | ResolveError::DuplicateAssignment { span, .. }
            | ResolveError::InvalidAssignment { span, .. } => *span,
        }
    }
}

/// Resolve a raw tree against a registry
///
/// Convenience wrapper around [`Resolver`] for callers that do not need the
/// accumulated diagnostics.
pub fn resolve(
    tree: &RawTree,
    registry: &ControlRegistry,
    origin: &str,
) -> Result<ResolvedTree, ResolveError> {
    Resolver::new(registry, origin).resolve(tree)
}

/// Control tree resolver for one compilation pass
pub struct Resolver<'a> {
    registry: &'a ControlRegistry,
    origin: String,
    /// Semantic errors collected during resolution and validation
    errors: Vec<ResolveError>,
    diagnostics: Vec<Diagnostic>,
    next_id: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ControlRegistry, origin: impl Into<String>) -> Self {
        Self {
            registry,
            origin: origin.into(),
            errors: Vec::new(),
            diagnostics: Vec::new(),
            next_id: 0,
        }
    }

    /// Diagnostics accumulated so far, including one entry per semantic
    /// error when resolution failed
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Resolve the whole tree. Consumable once per raw tree; the raw tree
    /// itself is left untouched and can be discarded by the caller.
    pub fn resolve(&mut self, tree: &RawTree) -> Result<ResolvedTree, ResolveError> {
        let wrapper = self.resolve_wrapper_type(tree)?;
        debug!(origin = %self.origin, wrapper = %wrapper.type_name, "resolving control tree");

        let data_context = tree
            .directive(directives::VIEW_MODEL)
            .map(|d| d.value.clone());

        let mut root = self.new_node(wrapper, Span::dummy());
        root.data_context = data_context.clone();
        self.resolve_control_content(&mut root, &tree.roots, data_context.as_deref())?;

        passes::normalize(&mut root);
        passes::validate(&root, self.registry, &mut self.errors);

        if !self.errors.is_empty() {
            let first = self.errors[0].clone();
            for error in self.errors.drain(..) {
                let span = error.span();
                self.diagnostics.push(Diagnostic::error(error.to_string(), span));
            }
            return Err(first);
        }

        Ok(ResolvedTree {
            root,
            directives: tree.directives.clone(),
            master_page: tree
                .directive(directives::MASTER_PAGE)
                .map(|d| d.value.clone()),
            imports: tree
                .directives
                .iter()
                .filter(|d| d.name == directives::IMPORT)
                .map(|d| d.value.clone())
                .collect(),
            origin: self.origin.clone(),
        })
    }

    /// Determine the root wrapper type from the `@baseType` directive.
    /// The type must carry the markup-control base capability.
    fn resolve_wrapper_type(&mut self, tree: &RawTree) -> Result<Arc<ControlMetadata>, ResolveError> {
        let Some(directive) = tree.directive(directives::BASE_TYPE) else {
            return Ok(self.registry.root_type());
        };
        match self.registry.resolve_type(&directive.value) {
            Some(metadata) if metadata.markup_control_base => Ok(metadata),
            _ => Err(ResolveError::InvalidBaseType {
                type_name: directive.value.clone(),
                span: directive.span,
            }),
        }
    }

    fn new_node(&mut self, metadata: Arc<ControlMetadata>, span: Span) -> ResolvedControlNode {
        let id = format!("c{}", self.next_id);
        self.next_id += 1;
        ResolvedControlNode::new(metadata, id, span)
    }

    fn error(&mut self, error: ResolveError) {
        self.errors.push(error);
    }

    /// Resolve one element into a control node
    fn resolve_element(
        &mut self,
        element: &RawElement,
        context: Option<&str>,
    ) -> Result<ResolvedControlNode, ResolveError> {
        let metadata = self
            .registry
            .resolve_control(element.prefix.as_deref(), &element.name)
            .map_err(|source| ResolveError::Metadata {
                source,
                span: element.span,
            })?;

        let mut node = self.new_node(metadata, element.span);
        node.data_context = context.map(str::to_string);

        for attribute in &element.attributes {
            self.resolve_attribute(&mut node, attribute)?;
        }

        // children inherit the context unless this control changes it
        let child_context = self.child_context(&node, context);
        self.resolve_control_content(&mut node, &element.children, child_context.as_deref())?;

        Ok(node)
    }

    /// Data context for children: the element type of the bound collection
    /// when the control declares a context change, otherwise inherited.
    fn child_context(
        &self,
        node: &ResolvedControlNode,
        context: Option<&str>,
    ) -> Option<String> {
        if let Some(change) = node.metadata.context_change.as_ref() {
            if let Some(ResolvedValue::Binding { expression, .. }) =
                node.assignments.get(&change.source_property)
            {
                return self.registry.element_type_of(context, expression);
            }
        }
        context.map(str::to_string)
    }

    /// Resolve one attribute into a property assignment or an HTML
    /// passthrough attribute
    fn resolve_attribute(
        &mut self,
        node: &mut ResolvedControlNode,
        attribute: &RawAttribute,
    ) -> Result<(), ResolveError> {
        let metadata = node.metadata.clone();
        match self.registry.find_property(&metadata, &attribute.name) {
            Some(descriptor) => {
                let descriptor = descriptor.clone();
                if descriptor.mapping_mode == MappingMode::Excluded {
                    self.error(ResolveError::InvalidAssignment {
                        property: descriptor.qualified_id.clone(),
                        detail: "property is excluded from markup".into(),
                        span: attribute.span,
                    });
                    return Ok(());
                }
                if node.assignments.contains_key(&descriptor.name) {
                    self.error(ResolveError::DuplicateAssignment {
                        property: descriptor.qualified_id.clone(),
                        span: attribute.span,
                    });
                    return Ok(());
                }
                if let Some(value) = self.resolve_attribute_value(&descriptor, attribute)? {
                    node.assignments.insert(descriptor.name.clone(), value);
                }
            }
            None if metadata.html_attributes => {
                let value = match &attribute.value {
                    RawAttributeValue::Literal(text) => {
                        ResolvedValue::Literal(TypedValue::String(text.clone()))
                    }
                    RawAttributeValue::Binding { kind, expression } => {
                        self.resolve_binding(kind, expression, attribute.span)?
                    }
                    RawAttributeValue::Empty => {
                        ResolvedValue::Literal(TypedValue::String(String::new()))
                    }
                };
                if node
                    .html_attributes
                    .insert(attribute.name.clone(), value)
                    .is_some()
                {
                    self.diagnostics.push(Diagnostic::warning(
                        format!("duplicate HTML attribute '{}'", attribute.name),
                        attribute.span,
                    ));
                }
            }
            None => self.error(ResolveError::UnknownProperty {
                control: metadata.type_name.clone(),
                attribute: attribute.name.clone(),
                span: attribute.span,
            }),
        }
        Ok(())
    }

    fn resolve_attribute_value(
        &mut self,
        descriptor: &PropertyDescriptor,
        attribute: &RawAttribute,
    ) -> Result<Option<ResolvedValue>, ResolveError> {
        match &attribute.value {
            RawAttributeValue::Binding { kind, expression } => {
                Ok(Some(self.resolve_binding(kind, expression, attribute.span)?))
            }
            RawAttributeValue::Literal(text) => {
                match TypedValue::convert(text, descriptor.value_type) {
                    Ok(value) => Ok(Some(ResolvedValue::Literal(value))),
                    Err(detail) => {
                        self.error(ResolveError::ValueConversion {
                            property: descriptor.qualified_id.clone(),
                            value: text.clone(),
                            detail,
                            span: attribute.span,
                        });
                        Ok(None)
                    }
                }
            }
            RawAttributeValue::Empty => {
                // HTML-style boolean attribute
                if descriptor.value_type == ValueType::Bool {
                    Ok(Some(ResolvedValue::Literal(TypedValue::Bool(true))))
                } else {
                    self.error(ResolveError::InvalidAssignment {
                        property: descriptor.qualified_id.clone(),
                        detail: "attribute is missing its value".into(),
                        span: attribute.span,
                    });
                    Ok(None)
                }
            }
        }
    }

    /// Binding markers keep their expression text verbatim; only the kind is
    /// resolved, and an unknown kind is a fatal compile error.
    fn resolve_binding(
        &mut self,
        kind: &str,
        expression: &str,
        span: Span,
    ) -> Result<ResolvedValue, ResolveError> {
        let kind = self
            .registry
            .resolve_binding_kind(kind)
            .map_err(|source| ResolveError::Metadata { source, span })?;
        Ok(ResolvedValue::Binding {
            kind: kind.name.clone(),
            expression: expression.to_string(),
        })
    }

    /// Route element content: leading prefix-less child elements that match
    /// a declared inner-element property become property values; everything
    /// from the first ordinary content node on is regular content.
    fn resolve_control_content(
        &mut self,
        node: &mut ResolvedControlNode,
        children: &[RawNode],
        context: Option<&str>,
    ) -> Result<(), ResolveError> {
        let metadata = node.metadata.clone();
        let mut properties_phase = true;
        let mut content: Vec<&RawNode> = Vec::new();

        for child in children {
            if properties_phase {
                match child {
                    RawNode::Element(element) if element.prefix.is_none() => {
                        let descriptor = self
                            .registry
                            .find_property(&metadata, &element.name)
                            .filter(|d| d.mapping_mode == MappingMode::InnerElement)
                            .cloned();
                        if let Some(descriptor) = descriptor {
                            // leading whitespace between property elements
                            content.clear();
                            self.resolve_property_nodes(
                                node,
                                &descriptor,
                                &element.children.iter().collect::<Vec<_>>(),
                                context,
                                element.span,
                            )?;
                            continue;
                        }
                        properties_phase = false;
                    }
                    RawNode::Element(_) => properties_phase = false,
                    other if !other.is_whitespace() => properties_phase = false,
                    _ => {}
                }
            }
            content.push(child);
        }

        let has_content = content.iter().any(|n| !n.is_whitespace());
        if !has_content {
            return Ok(());
        }

        if let Some(default_property) = metadata.default_content_property.clone() {
            let descriptor = self
                .registry
                .find_property(&metadata, &default_property)
                .cloned();
            let span = node.span;
            match descriptor {
                Some(descriptor) => {
                    self.resolve_property_nodes(node, &descriptor, &content, context, span)?
                }
                None => self.error(ResolveError::UnknownProperty {
                    control: metadata.type_name.clone(),
                    attribute: default_property,
                    span: node.span,
                }),
            }
            return Ok(());
        }

        if !metadata.content_allowed {
            let span = content
                .iter()
                .find(|n| !n.is_whitespace())
                .map(|n| n.span())
                .unwrap_or(node.span);
            self.error(ResolveError::ContentNotAllowed {
                control: metadata.type_name.clone(),
                span,
            });
            // keep resolving so later defects are still reported
        }

        self.resolve_ordinary_children(node, &content, context)
    }

    /// Ordinary content: elements become child controls, text and inline
    /// bindings become literal controls.
    fn resolve_ordinary_children(
        &mut self,
        node: &mut ResolvedControlNode,
        content: &[&RawNode],
        context: Option<&str>,
    ) -> Result<(), ResolveError> {
        for child in content {
            let resolved = self.resolve_content_node(child, context)?;
            node.children.push(resolved);
        }
        Ok(())
    }

    fn resolve_content_node(
        &mut self,
        raw: &RawNode,
        context: Option<&str>,
    ) -> Result<ResolvedControlNode, ResolveError> {
        match raw {
            RawNode::Element(element) => self.resolve_element(element, context),
            RawNode::Literal(literal) => {
                let mut node = self.literal_node(literal.span, context)?;
                node.assignments.insert(
                    "Text".to_string(),
                    ResolvedValue::Literal(TypedValue::String(literal.text.clone())),
                );
                Ok(node)
            }
            RawNode::Binding(binding) => {
                let value = self.resolve_binding(&binding.kind, &binding.expression, binding.span)?;
                let mut node = self.literal_node(binding.span, context)?;
                node.assignments.insert("Text".to_string(), value);
                Ok(node)
            }
        }
    }

    fn literal_node(
        &mut self,
        span: Span,
        context: Option<&str>,
    ) -> Result<ResolvedControlNode, ResolveError> {
        let metadata = self
            .registry
            .resolve_type(builtin::LITERAL)
            .unwrap_or_else(|| Arc::new(builtin::literal()));
        let mut node = self.new_node(metadata, span);
        node.data_context = context.map(str::to_string);
        Ok(node)
    }

    /// Resolve the content of an inner-element property (or the default
    /// content property) into the right `ResolvedValue` shape.
    fn resolve_property_nodes(
        &mut self,
        node: &mut ResolvedControlNode,
        descriptor: &PropertyDescriptor,
        content: &[&RawNode],
        context: Option<&str>,
        span: Span,
    ) -> Result<(), ResolveError> {
        if node.assignments.contains_key(&descriptor.name) {
            self.error(ResolveError::DuplicateAssignment {
                property: descriptor.qualified_id.clone(),
                span,
            });
            return Ok(());
        }

        if descriptor.value_type == ValueType::Template {
            // independently scoped nested tree, rendering deferred
            let mut body = Vec::new();
            for child in content {
                if child.is_whitespace() {
                    continue;
                }
                body.push(self.resolve_content_node(child, context)?);
            }
            node.assignments
                .insert(descriptor.name.clone(), ResolvedValue::Template(body));
            return Ok(());
        }

        if descriptor.is_collection {
            let mut items = Vec::new();
            for child in content {
                match child {
                    RawNode::Element(element) => {
                        items.push(self.resolve_element(element, context)?)
                    }
                    node if node.is_whitespace() => {}
                    other => self.error(ResolveError::InvalidAssignment {
                        property: descriptor.qualified_id.clone(),
                        detail: "only elements are allowed inside a collection property".into(),
                        span: other.span(),
                    }),
                }
            }
            node.assignments
                .insert(descriptor.name.clone(), ResolvedValue::Collection(items));
            return Ok(());
        }

        if descriptor.value_type == ValueType::Control {
            let mut elements: Vec<&RawElement> = Vec::new();
            for child in content {
                match child {
                    RawNode::Element(element) => elements.push(element),
                    node if node.is_whitespace() => {}
                    other => self.error(ResolveError::InvalidAssignment {
                        property: descriptor.qualified_id.clone(),
                        detail: "only an element is allowed inside a control property".into(),
                        span: other.span(),
                    }),
                }
            }
            if elements.len() > 1 {
                self.error(ResolveError::SingleChildExpected {
                    property: descriptor.qualified_id.clone(),
                    span,
                });
                return Ok(());
            }
            if let Some(element) = elements.first().copied() {
                let child = self.resolve_element(element, context)?;
                node.assignments
                    .insert(descriptor.name.clone(), ResolvedValue::Control(Box::new(child)));
            }
            return Ok(());
        }

        // scalar property written as an inner element: a single binding, or
        // concatenated literal text
        let mut text = String::new();
        let mut binding = None;
        for child in content {
            match child {
                RawNode::Literal(literal) => text.push_str(&literal.text),
                RawNode::Binding(raw) if binding.is_none() && text.trim().is_empty() => {
                    binding =
                        Some(self.resolve_binding(&raw.kind, &raw.expression, raw.span)?);
                }
                other => {
                    self.error(ResolveError::InvalidAssignment {
                        property: descriptor.qualified_id.clone(),
                        detail: "value property allows only text or a single binding".into(),
                        span: other.span(),
                    });
                    return Ok(());
                }
            }
        }

        let value = match binding {
            Some(binding) if text.trim().is_empty() => Some(binding),
            Some(_) => {
                self.error(ResolveError::InvalidAssignment {
                    property: descriptor.qualified_id.clone(),
                    detail: "cannot mix text and bindings in a value property".into(),
                    span,
                });
                None
            }
            None => match TypedValue::convert(text.trim(), descriptor.value_type) {
                Ok(converted) => Some(ResolvedValue::Literal(converted)),
                Err(detail) => {
                    self.error(ResolveError::ValueConversion {
                        property: descriptor.qualified_id.clone(),
                        value: text,
                        detail,
                        span,
                    });
                    None
                }
            },
        };
        if let Some(value) = value {
            node.assignments.insert(descriptor.name.clone(), value);
        }
        Ok(())
    }
}
