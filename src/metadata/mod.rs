//! Metadata registry
//!
//! Control type descriptions, property descriptors and binding kinds, keyed
//! by tag prefix and name. A registry is built once per configuration
//! identity by an external registration step ([`RegistryBuilder`]) and is
//! read-only afterwards; compilations only query it.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Registry lookup error
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    #[error("unknown control <{tag}>")]
    UnknownControl { tag: String },
    #[error("unknown binding kind '{name}'")]
    UnknownBinding { name: String },
}

/// How a property is written in markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// `Name="value"` on the element tag
    #[default]
    Attribute,
    /// `<Name>...</Name>` child element
    InnerElement,
    /// Not settable from markup
    Excluded,
}

/// Declared value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    /// A single child control
    Control,
    /// A deferred template body
    Template,
}

/// Property descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub mapping_mode: MappingMode,
    pub is_collection: bool,
    /// `OwnerType.PropertyName`
    pub qualified_id: String,
}

impl PropertyDescriptor {
    pub fn new(owner: &str, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            qualified_id: format!("{}.{}", owner, name),
            name,
            value_type,
            mapping_mode: MappingMode::Attribute,
            is_collection: false,
        }
    }

    pub fn inner_element(mut self) -> Self {
        self.mapping_mode = MappingMode::InnerElement;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.mapping_mode = MappingMode::Excluded;
        self
    }

    pub fn collection(mut self) -> Self {
        self.is_collection = true;
        self.mapping_mode = MappingMode::InnerElement;
        self
    }
}

/// Declares that a control changes the data context of its children: they
/// receive the element type of the collection bound to `source_property`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChange {
    pub source_property: String,
}

/// Control type description
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMetadata {
    /// Type identity
    pub type_name: String,
    /// Declared properties, in registration order
    pub properties: IndexMap<String, PropertyDescriptor>,
    /// Property that receives ordinary child content, when declared
    pub default_content_property: Option<String>,
    /// Whether ordinary (non-property) content is allowed
    pub content_allowed: bool,
    /// Unmatched attributes pass through as HTML attributes
    pub html_attributes: bool,
    /// Virtual path of the markup file this control is built from, for
    /// controls defined in markup rather than code
    pub markup_builder: Option<String>,
    /// Data-context change declared by this control
    pub context_change: Option<ContextChange>,
    /// May serve as the root wrapper type of a markup file
    pub markup_control_base: bool,
}

impl ControlMetadata {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: IndexMap::new(),
            default_content_property: None,
            content_allowed: true,
            html_attributes: false,
            markup_builder: None,
            context_change: None,
            markup_control_base: false,
        }
    }

    pub fn with_property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn no_content(mut self) -> Self {
        self.content_allowed = false;
        self
    }

    pub fn with_html_attributes(mut self) -> Self {
        self.html_attributes = true;
        self
    }

    /// Declare this control as defined by its own markup file
    pub fn from_markup(mut self, virtual_path: impl Into<String>) -> Self {
        self.markup_builder = Some(virtual_path.into());
        self
    }
}

/// Binding kind (e.g. `value`, `command`, `resource`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingKind {
    pub name: String,
}

/// Property of a data type, for context propagation
#[derive(Debug, Clone, PartialEq)]
pub struct DataPropertyDescriptor {
    pub type_name: String,
    pub is_collection: bool,
    /// Element type when `is_collection`
    pub element_type: Option<String>,
}

/// Data (view model) type description
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTypeDescriptor {
    pub name: String,
    pub properties: HashMap<String, DataPropertyDescriptor>,
}

/// Key for control lookup: (tag prefix, tag name)
type TagKey = (Option<String>, String);

/// The read-only metadata registry
#[derive(Debug, Default)]
pub struct ControlRegistry {
    controls: HashMap<TagKey, Arc<ControlMetadata>>,
    by_type: HashMap<String, Arc<ControlMetadata>>,
    attached: HashMap<String, PropertyDescriptor>,
    bindings: HashMap<String, BindingKind>,
    data_types: HashMap<String, DataTypeDescriptor>,
}

impl ControlRegistry {
    /// Resolve a control by tag prefix and name
    pub fn resolve_control(
        &self,
        prefix: Option<&str>,
        name: &str,
    ) -> Result<Arc<ControlMetadata>, MetadataError> {
        self.controls
            .get(&(prefix.map(str::to_string), name.to_string()))
            .cloned()
            .ok_or_else(|| MetadataError::UnknownControl {
                tag: match prefix {
                    Some(p) => format!("{}:{}", p, name),
                    None => name.to_string(),
                },
            })
    }

    /// Resolve a binding kind by its marker name
    pub fn resolve_binding_kind(&self, name: &str) -> Result<&BindingKind, MetadataError> {
        self.bindings
            .get(name)
            .ok_or_else(|| MetadataError::UnknownBinding {
                name: name.to_string(),
            })
    }

    /// Find a property declared on the control, falling back to the global
    /// attached-property table
    pub fn find_property<'a>(
        &'a self,
        metadata: &'a ControlMetadata,
        name: &str,
    ) -> Option<&'a PropertyDescriptor> {
        metadata
            .properties
            .get(name)
            .or_else(|| self.attached.get(name))
    }

    /// Look up a control type by its type name (for `@baseType`)
    pub fn resolve_type(&self, type_name: &str) -> Option<Arc<ControlMetadata>> {
        self.by_type.get(type_name).cloned()
    }

    /// Look up a data type for context propagation
    pub fn data_type(&self, name: &str) -> Option<&DataTypeDescriptor> {
        self.data_types.get(name)
    }

    /// The standard root wrapper type
    pub fn root_type(&self) -> Arc<ControlMetadata> {
        self.by_type
            .get(builtin::VIEW)
            .cloned()
            .unwrap_or_else(|| Arc::new(builtin::view()))
    }

    /// Element type of the collection a binding expression refers to, given
    /// the current data-context type. Only the leading segment of the
    /// expression is considered.
    pub fn element_type_of(&self, context: Option<&str>, expression: &str) -> Option<String> {
        let data_type = self.data_types.get(context?)?;
        let segment = expression
            .split(|c: char| c == '.' || c.is_whitespace())
            .next()?;
        let property = data_type.properties.get(segment)?;
        if property.is_collection {
            property.element_type.clone()
        } else {
            None
        }
    }
}

/// Built-in control types every registry carries
pub mod builtin {
    use super::*;

    pub const VIEW: &str = "View";
    pub const LITERAL: &str = "Literal";

    /// Standard root wrapper
    pub fn view() -> ControlMetadata {
        let mut meta = ControlMetadata::new(VIEW);
        meta.markup_control_base = true;
        meta
    }

    /// Text content wrapper
    pub fn literal() -> ControlMetadata {
        ControlMetadata::new(LITERAL)
            .with_property(PropertyDescriptor::new(LITERAL, "Text", ValueType::String))
            .no_content()
    }
}

/// Fluent registry construction, run once per configuration by external
/// configuration loading.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: ControlRegistry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            registry: ControlRegistry::default(),
        };
        builder.register_type(builtin::view());
        builder.register_type(builtin::literal());
        builder.register_binding_kind("value");
        builder
    }

    /// Register a control under a tag
    pub fn register_control(
        &mut self,
        prefix: Option<&str>,
        tag_name: &str,
        metadata: ControlMetadata,
    ) -> &mut Self {
        let shared = Arc::new(metadata);
        self.registry
            .by_type
            .insert(shared.type_name.clone(), shared.clone());
        self.registry
            .controls
            .insert((prefix.map(str::to_string), tag_name.to_string()), shared);
        self
    }

    /// Register a control type not addressable by tag (base types, builtins)
    pub fn register_type(&mut self, metadata: ControlMetadata) -> &mut Self {
        let shared = Arc::new(metadata);
        self.registry
            .by_type
            .insert(shared.type_name.clone(), shared);
        self
    }

    /// Register an attached property, findable by name across all types
    pub fn register_attached_property(&mut self, descriptor: PropertyDescriptor) -> &mut Self {
        self.registry
            .attached
            .insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn register_binding_kind(&mut self, name: &str) -> &mut Self {
        self.registry.bindings.insert(
            name.to_string(),
            BindingKind {
                name: name.to_string(),
            },
        );
        self
    }

    pub fn register_data_type(&mut self, descriptor: DataTypeDescriptor) -> &mut Self {
        self.registry
            .data_types
            .insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn build(self) -> ControlRegistry {
        self.registry
    }
}

/// Registries shared per configuration identity
static REGISTRY_CACHE: Lazy<RwLock<HashMap<String, Arc<ControlRegistry>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Get the registry for a configuration identity, building it at most once
/// per process. Subsequent calls with the same identity return the shared
/// instance without invoking `build`.
pub fn shared_registry(
    id: &str,
    build: impl FnOnce() -> ControlRegistry,
) -> Arc<ControlRegistry> {
    if let Some(registry) = REGISTRY_CACHE.read().get(id) {
        return registry.clone();
    }
    let mut cache = REGISTRY_CACHE.write();
    cache
        .entry(id.to_string())
        .or_insert_with(|| Arc::new(build()))
        .clone()
}
