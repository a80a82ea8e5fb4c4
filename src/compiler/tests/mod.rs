//! Compiler unit tests
#![allow(unused_imports)]
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::compiler::config::MarkupConfig;
use crate::compiler::loader::{InMemoryLoader, MarkupLoader};
use crate::compiler::{instantiate_source, CompileErrorKind, MarkupCompiler};
use crate::metadata::{
    builtin, ControlMetadata, ControlRegistry, PropertyDescriptor, RegistryBuilder, ValueType,
};

fn test_registry() -> Arc<ControlRegistry> {
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
    Arc::new(builder.build())
}

fn compiler_with(files: &[(&str, &str)]) -> (MarkupCompiler, Arc<InMemoryLoader>) {
    let loader = Arc::new(InMemoryLoader::new());
    for (path, source) in files {
        loader.insert(*path, *source);
    }
    let compiler = MarkupCompiler::new(test_registry(), loader.clone());
    (compiler, loader)
}

#[cfg(test)]
mod compile_tests {
    use super::*;

    #[test]
    fn test_compile_simple_page() {
        let (compiler, _) =
            compiler_with(&[("index.vhtml", r#"<Panel><TextBox Text="hi" /></Panel>"#)]);
        let page = compiler.compile_file("index.vhtml").unwrap();
        assert_eq!(page.tree.root.metadata.type_name, builtin::VIEW);
        let root = page.instantiate().unwrap();
        assert_eq!(root.children[0].type_name, "Panel");
    }

    #[test]
    fn test_missing_file() {
        let (compiler, _) = compiler_with(&[]);
        let err = compiler.compile_file("gone.vhtml").unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::Load(_)));
    }

    #[test]
    fn test_markup_errors_reported_together() {
        let (compiler, _) =
            compiler_with(&[("bad.vhtml", "<Panel><TextBox></Panel>")]);
        let err = compiler.compile_file("bad.vhtml").unwrap_err();
        match err.kind {
            CompileErrorKind::Markup(diagnostics) => assert!(diagnostics.has_errors()),
            other => panic!("expected markup error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_error_carries_diagnostics() {
        let (compiler, _) = compiler_with(&[("bad.vhtml", "<TextBox>content</TextBox>")]);
        let err = compiler.compile_file("bad.vhtml").unwrap_err();
        match &err.kind {
            CompileErrorKind::Resolve { diagnostics, .. } => {
                assert!(diagnostics.has_errors())
            }
            other => panic!("expected resolve error, got {:?}", other),
        }
    }

    #[test]
    fn test_instantiate_source_one_shot() {
        let registry = test_registry();
        let root =
            instantiate_source("<Panel>hello</Panel>", &registry, "inline").unwrap();
        assert_eq!(root.children[0].type_name, "Panel");
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn test_unchanged_file_served_from_cache() {
        let (compiler, _) = compiler_with(&[("index.vhtml", "<Panel />")]);
        let first = compiler.compile_file("index.vhtml").unwrap();
        let second = compiler.compile_file("index.vhtml").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_file_recompiled() {
        let (compiler, loader) = compiler_with(&[("index.vhtml", "<Panel />")]);
        let first = compiler.compile_file("index.vhtml").unwrap();

        let later = SystemTime::now() + Duration::from_secs(5);
        loader.insert_with_time("index.vhtml", r#"<Panel class="v2" />"#, later);

        let second = compiler.compile_file("index.vhtml").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        let root = second.instantiate().unwrap();
        assert_eq!(root.children[0].html_attributes.len(), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (compiler, loader) = compiler_with(&[("index.vhtml", "<Nonsense />")]);
        let modified = SystemTime::now();
        loader.insert_with_time("index.vhtml", "<Nonsense />", modified);
        assert!(compiler.compile_file("index.vhtml").is_err());

        // same identity, fixed content: the empty cell is populated now
        loader.insert_with_time("index.vhtml", "<Panel />", modified);
        assert!(compiler.compile_file("index.vhtml").is_ok());
    }
}

#[cfg(test)]
mod master_page_tests {
    use super::*;

    #[test]
    fn test_master_page_compiled_and_attached() {
        let (compiler, _) = compiler_with(&[
            ("page.vhtml", "@masterPage layout.vhtml\n<Panel>content</Panel>"),
            ("layout.vhtml", "<Panel>chrome</Panel>"),
        ]);
        let page = compiler.compile_file("page.vhtml").unwrap();
        let master = page.master.as_ref().unwrap();
        assert_eq!(master.identity.virtual_path, "layout.vhtml");
        assert!(master.master.is_none());
    }

    #[test]
    fn test_master_page_shared_between_pages() {
        let (compiler, _) = compiler_with(&[
            ("a.vhtml", "@masterPage layout.vhtml\n<Panel />"),
            ("b.vhtml", "@masterPage layout.vhtml\n<Panel />"),
            ("layout.vhtml", "<Panel />"),
        ]);
        let a = compiler.compile_file("a.vhtml").unwrap();
        let b = compiler.compile_file("b.vhtml").unwrap();
        assert!(Arc::ptr_eq(
            a.master.as_ref().unwrap(),
            b.master.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_cyclic_master_pages() {
        let (compiler, _) = compiler_with(&[
            ("a.vhtml", "@masterPage b.vhtml\n<Panel />"),
            ("b.vhtml", "@masterPage a.vhtml\n<Panel />"),
        ]);
        let err = compiler.compile_file("a.vhtml").unwrap_err();
        match err.kind {
            CompileErrorKind::CyclicMasterPage { chain } => {
                assert_eq!(chain, vec!["a.vhtml", "b.vhtml", "a.vhtml"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_cycle_compiles_from_both_ends() {
        // one thread starts at each end of the cycle; both must come back
        // with the cycle error instead of blocking on each other's cell
        let (compiler, _) = compiler_with(&[
            ("a.vhtml", "@masterPage b.vhtml\n<Panel />"),
            ("b.vhtml", "@masterPage a.vhtml\n<Panel />"),
        ]);
        std::thread::scope(|scope| {
            let from_a = scope.spawn(|| compiler.compile_file("a.vhtml"));
            let from_b = scope.spawn(|| compiler.compile_file("b.vhtml"));
            for handle in [from_a, from_b] {
                let err = handle.join().unwrap().unwrap_err();
                assert!(matches!(
                    err.kind,
                    CompileErrorKind::CyclicMasterPage { .. }
                ));
            }
        });
    }

    #[test]
    fn test_self_referencing_master_page() {
        let (compiler, _) =
            compiler_with(&[("a.vhtml", "@masterPage a.vhtml\n<Panel />")]);
        let err = compiler.compile_file("a.vhtml").unwrap_err();
        assert!(matches!(
            err.kind,
            CompileErrorKind::CyclicMasterPage { .. }
        ));
    }
}

#[cfg(test)]
mod markup_control_tests {
    use super::*;

    fn registry_with_card() -> Arc<ControlRegistry> {
        let mut builder = RegistryBuilder::new();
        builder.register_control(
            None,
            "Panel",
            ControlMetadata::new("Panel").with_html_attributes(),
        );
        builder.register_control(
            None,
            "Card",
            ControlMetadata::new("Card")
                .with_property(PropertyDescriptor::new("Card", "Title", ValueType::String))
                .from_markup("card.vhtml"),
        );
        Arc::new(builder.build())
    }

    #[test]
    fn test_markup_control_compiled_as_dependency() {
        let loader = Arc::new(InMemoryLoader::new());
        loader.insert("card.vhtml", "<Panel>card body</Panel>");
        loader.insert(
            "page.vhtml",
            r#"<Panel><Card Title="a" /><Card Title="b" /></Panel>"#,
        );
        let compiler = MarkupCompiler::new(registry_with_card(), loader);

        let page = compiler.compile_file("page.vhtml").unwrap();
        // one dependency entry per distinct file, not per use
        assert_eq!(page.dependencies.len(), 1);
        assert_eq!(page.dependencies[0].identity.virtual_path, "card.vhtml");
    }

    #[test]
    fn test_markup_control_shared_between_pages() {
        let loader = Arc::new(InMemoryLoader::new());
        loader.insert("card.vhtml", "<Panel />");
        loader.insert("a.vhtml", "<Card />");
        loader.insert("b.vhtml", "<Card />");
        let compiler = MarkupCompiler::new(registry_with_card(), loader);

        let a = compiler.compile_file("a.vhtml").unwrap();
        let b = compiler.compile_file("b.vhtml").unwrap();
        assert!(Arc::ptr_eq(&a.dependencies[0], &b.dependencies[0]));
    }

    #[test]
    fn test_markup_control_cycle() {
        // the card's own markup uses a card
        let loader = Arc::new(InMemoryLoader::new());
        loader.insert("card.vhtml", "<Card />");
        let compiler = MarkupCompiler::new(registry_with_card(), loader);

        let err = compiler.compile_file("card.vhtml").unwrap_err();
        assert!(matches!(
            err.kind,
            CompileErrorKind::CyclicMasterPage { .. }
        ));
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_registry_from_json() {
        let config = MarkupConfig::from_json(
            r#"{
                "name": "app",
                "controls": [
                    {
                        "typeName": "Badge",
                        "properties": [
                            { "name": "Count", "valueType": "int" }
                        ],
                        "htmlAttributes": true
                    },
                    {
                        "prefix": "ui",
                        "tag": "Grid",
                        "typeName": "DataGrid",
                        "contentAllowed": false
                    }
                ],
                "bindingKinds": ["command"],
                "dataTypes": [
                    {
                        "name": "Cart",
                        "properties": [
                            {
                                "name": "Lines",
                                "typeName": "Vec<CartLine>",
                                "collection": true,
                                "elementType": "CartLine"
                            }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        let registry = config.build_registry();

        let badge = registry.resolve_control(None, "Badge").unwrap();
        assert_eq!(badge.properties["Count"].value_type, ValueType::Int);
        assert!(badge.html_attributes);

        let grid = registry.resolve_control(Some("ui"), "Grid").unwrap();
        assert_eq!(grid.type_name, "DataGrid");
        assert!(!grid.content_allowed);

        assert!(registry.resolve_binding_kind("command").is_ok());
        assert_eq!(
            registry.element_type_of(Some("Cart"), "Lines"),
            Some("CartLine".into())
        );
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(MarkupConfig::from_json("{ nope").is_err());
    }
}
