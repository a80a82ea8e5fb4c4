//! Emitter unit tests
#![allow(unused_imports)]
use crate::emit::compiled::{CompiledEmitter, Instruction};
use crate::emit::interpreted::{InstanceValue, InterpretedEmitter};
use crate::emit::{EmitError, ViewEmitter};
use crate::metadata::{
    ControlMetadata, ControlRegistry, PropertyDescriptor, RegistryBuilder, ValueType,
};
use crate::resolver::tree::{ResolvedTree, TypedValue};
use crate::{parser, resolver, tokenizer};

fn test_registry() -> ControlRegistry {
    let mut builder = RegistryBuilder::new();
    builder.register_control(
        None,
        "Panel",
        ControlMetadata::new("Panel").with_html_attributes(),
    );
    builder.register_control(
        None,
        "TextBox",
        ControlMetadata::new("TextBox")
            .with_property(PropertyDescriptor::new("TextBox", "Text", ValueType::String))
            .no_content(),
    );
    builder.register_control(
        None,
        "List",
        ControlMetadata::new("List")
            .with_property(
                PropertyDescriptor::new("List", "Items", ValueType::Control).collection(),
            )
            .with_property(
                PropertyDescriptor::new("List", "ItemTemplate", ValueType::Template)
                    .inner_element(),
            ),
    );
    builder.register_control(None, "Item", ControlMetadata::new("Item"));
    builder.register_control(
        None,
        "Border",
        ControlMetadata::new("Border").with_property(
            PropertyDescriptor::new("Border", "Header", ValueType::Control).inner_element(),
        ),
    );
    builder.register_attached_property(PropertyDescriptor::new("Layout", "Row", ValueType::Int));
    builder.build()
}

fn resolve_markup(source: &str) -> ResolvedTree {
    let registry = test_registry();
    let tree = parser::parse(&tokenizer::tokenize(source));
    resolver::resolve(&tree, &registry, "test.vhtml").unwrap()
}

const SAMPLE: &str = r#"<Panel class="wide">
  intro {{value: Title}}
  <TextBox Text="{value: Name}" />
  <List>
    <Items><Item /><Item /></Items>
    <ItemTemplate><TextBox Text="row" /></ItemTemplate>
  </List>
</Panel>"#;

#[cfg(test)]
mod equivalence_tests {
    use super::*;

    #[test]
    fn test_modes_produce_equal_graphs() {
        let tree = resolve_markup(SAMPLE);
        let interpreted = InterpretedEmitter::new().emit(&tree).unwrap();
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        assert_eq!(artifact.instantiate().unwrap(), interpreted);
    }

    #[test]
    fn test_modes_equal_on_trivial_input() {
        let tree = resolve_markup("<TextBox />");
        let interpreted = InterpretedEmitter::new().emit(&tree).unwrap();
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        assert_eq!(artifact.instantiate().unwrap(), interpreted);
    }

    #[test]
    fn test_modes_equal_on_empty_property_shapes() {
        for source in [
            "<List><Items></Items></List>",
            "<List><ItemTemplate></ItemTemplate></List>",
            "<Border><Header></Header></Border>",
        ] {
            let tree = resolve_markup(source);
            let interpreted = InterpretedEmitter::new().emit(&tree).unwrap();
            let artifact = CompiledEmitter::new().emit(&tree).unwrap();
            assert_eq!(artifact.instantiate().unwrap(), interpreted, "for {:?}", source);
        }
    }

    #[test]
    fn test_empty_collection_survives_compiled_mode() {
        let tree = resolve_markup("<List><Items></Items></List>");
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        let root = artifact.instantiate().unwrap();
        let list = &root.children[0];
        assert_eq!(
            list.properties["Items"],
            InstanceValue::Collection(Vec::new())
        );
    }
}

#[cfg(test)]
mod interpreted_tests {
    use super::*;

    #[test]
    fn test_instance_graph_shape() {
        let tree = resolve_markup(SAMPLE);
        let root = InterpretedEmitter::new().emit(&tree).unwrap();
        assert_eq!(root.type_name, "View");
        let panel = &root.children[0];
        assert_eq!(panel.type_name, "Panel");
        assert_eq!(
            panel.html_attributes["class"],
            InstanceValue::Value(TypedValue::String("wide".into()))
        );
        // literal, binding literal, TextBox, List
        assert_eq!(panel.children.len(), 4);
        let list = &panel.children[3];
        match &list.properties["Items"] {
            InstanceValue::Collection(items) => assert_eq!(items.len(), 2),
            other => panic!("expected collection, got {:?}", other),
        }
        match &list.properties["ItemTemplate"] {
            InstanceValue::Template(template) => {
                assert_eq!(template.controls[0].type_name, "TextBox")
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_control_count() {
        let tree = resolve_markup(SAMPLE);
        let root = InterpretedEmitter::new().emit(&tree).unwrap();
        // View, Panel, 2 literals, TextBox, List, 2 items, template TextBox
        assert_eq!(root.control_count(), 9);
    }
}

#[cfg(test)]
mod compiled_tests {
    use super::*;

    #[test]
    fn test_template_gets_own_routine() {
        let tree = resolve_markup(SAMPLE);
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        assert_eq!(artifact.routines.len(), 2);
        assert!(artifact.routines.contains_key("build_view"));
        assert!(artifact.routines.contains_key("build_template_0"));
        let uses_template = artifact.routines["build_view"]
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::SetTemplate { routine, .. } if routine == "build_template_0"));
        assert!(uses_template);
    }

    #[test]
    fn test_generated_source_mentions_controls() {
        let tree = resolve_markup(SAMPLE);
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        let source = artifact.generate_source();
        assert!(source.contains("pub fn build_view"));
        assert!(source.contains("pub fn build_template_0"));
        assert!(source.contains("f.create(\"Panel\")"));
        assert!(source.contains("f.binding(\"value\", \"Name\")"));
    }

    #[test]
    fn test_attached_property_instruction() {
        let tree = resolve_markup(r#"<Item Row="2" />"#);
        let artifact = CompiledEmitter::new().emit(&tree).unwrap();
        let attached = artifact.routines["build_view"]
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::SetAttachedProperty { name, .. } if name == "Row"));
        assert!(attached);

        let interpreted = InterpretedEmitter::new().emit(&tree).unwrap();
        assert_eq!(artifact.instantiate().unwrap(), interpreted);
    }

    #[test]
    fn test_unsupported_value_shape_rejected() {
        use crate::resolver::tree::{ResolvedControlNode, ResolvedTree, ResolvedValue};
        use crate::util::span::Span;
        use std::sync::Arc;

        // a literal crammed into a template property never reaches an
        // artifact, even though the resolver would normally catch it first
        let metadata = Arc::new(
            ControlMetadata::new("List").with_property(
                PropertyDescriptor::new("List", "ItemTemplate", ValueType::Template)
                    .inner_element(),
            ),
        );
        let mut root = ResolvedControlNode::new(metadata, "c0".into(), Span::dummy());
        root.assignments.insert(
            "ItemTemplate".into(),
            ResolvedValue::Literal(TypedValue::String("nope".into())),
        );
        let tree = ResolvedTree {
            root,
            directives: Vec::new(),
            master_page: None,
            imports: Vec::new(),
            origin: "test.vhtml".into(),
        };

        assert!(matches!(
            InterpretedEmitter::new().emit(&tree),
            Err(EmitError::UnsupportedValue { .. })
        ));
        assert!(matches!(
            CompiledEmitter::new().emit(&tree),
            Err(EmitError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_missing_routine_error() {
        let tree = resolve_markup("<TextBox />");
        let mut artifact = CompiledEmitter::new().emit(&tree).unwrap();
        artifact.entry = "nope".into();
        assert!(matches!(
            artifact.instantiate(),
            Err(EmitError::MissingRoutine { .. })
        ));
    }
}
