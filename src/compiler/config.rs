//! Compiler configuration
//!
//! A declarative description of the control set, binding kinds, and data
//! types a host exposes to markup. Hosts ship it as JSON; the compiler
//! turns it into a metadata registry once per configuration name.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metadata::{
    ContextChange, ControlMetadata, ControlRegistry, DataPropertyDescriptor, DataTypeDescriptor,
    MappingMode, PropertyDescriptor, RegistryBuilder, ValueType,
};

/// Configuration failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

/// Top-level compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkupConfig {
    /// Identity under which the built registry is shared
    pub name: String,
    pub controls: Vec<ControlConfig>,
    pub attached_properties: Vec<PropertyConfig>,
    pub binding_kinds: Vec<String>,
    pub data_types: Vec<DataTypeConfig>,
}

/// One control registration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlConfig {
    /// Tag prefix, empty for prefix-less tags
    pub prefix: Option<String>,
    /// Tag name; defaults to the type name
    pub tag: Option<String>,
    pub type_name: String,
    pub properties: Vec<PropertyConfig>,
    pub default_content_property: Option<String>,
    /// Ordinary child content allowed (default true)
    pub content_allowed: Option<bool>,
    pub html_attributes: bool,
    /// Property whose bound collection changes the children's data context
    pub context_source: Option<String>,
    /// Markup file defining this control, compiled as a dependency
    pub markup: Option<String>,
    /// Usable as a `@baseType` target
    pub markup_control_base: bool,
}

/// One property registration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyConfig {
    pub name: String,
    /// Owner type; only meaningful for attached properties
    pub owner: Option<String>,
    pub value_type: ValueType,
    pub mapping: Option<MappingMode>,
    pub collection: bool,
}

/// One data (view model) type registration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DataTypeConfig {
    pub name: String,
    pub properties: Vec<DataPropertyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DataPropertyConfig {
    pub name: String,
    pub type_name: String,
    pub collection: bool,
    pub element_type: Option<String>,
}

impl MarkupConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Build the registry this configuration describes
    pub fn build_registry(&self) -> ControlRegistry {
        let mut builder = RegistryBuilder::new();
        for control in &self.controls {
            let metadata = control.to_metadata();
            let tag = control.tag.as_deref().unwrap_or(&control.type_name);
            builder.register_control(control.prefix.as_deref(), tag, metadata);
        }
        for property in &self.attached_properties {
            let owner = property.owner.as_deref().unwrap_or("Attached");
            builder.register_attached_property(property.to_descriptor(owner));
        }
        for kind in &self.binding_kinds {
            builder.register_binding_kind(kind);
        }
        for data_type in &self.data_types {
            builder.register_data_type(DataTypeDescriptor {
                name: data_type.name.clone(),
                properties: data_type
                    .properties
                    .iter()
                    .map(|p| {
                        (
                            p.name.clone(),
                            DataPropertyDescriptor {
                                type_name: p.type_name.clone(),
                                is_collection: p.collection,
                                element_type: p.element_type.clone(),
                            },
                        )
                    })
                    .collect(),
            });
        }
        builder.build()
    }
}

impl ControlConfig {
    fn to_metadata(&self) -> ControlMetadata {
        let mut metadata = ControlMetadata::new(&self.type_name);
        for property in &self.properties {
            metadata
                .properties
                .insert(property.name.clone(), property.to_descriptor(&self.type_name));
        }
        metadata.default_content_property = self.default_content_property.clone();
        metadata.content_allowed = self.content_allowed.unwrap_or(true);
        metadata.html_attributes = self.html_attributes;
        metadata.context_change = self.context_source.clone().map(|source_property| {
            ContextChange { source_property }
        });
        metadata.markup_builder = self.markup.clone();
        metadata.markup_control_base = self.markup_control_base;
        metadata
    }
}

impl PropertyConfig {
    fn to_descriptor(&self, owner: &str) -> PropertyDescriptor {
        let owner = self.owner.as_deref().unwrap_or(owner);
        let mut descriptor = PropertyDescriptor::new(owner, &self.name, self.value_type);
        if let Some(mapping) = self.mapping {
            descriptor.mapping_mode = mapping;
        }
        if self.collection {
            descriptor = descriptor.collection();
        }
        descriptor
    }
}
