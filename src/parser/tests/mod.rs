//! Parser unit tests
#![allow(unused_imports)]
use crate::parser::ast::*;
use crate::parser::parse;
use crate::tokenizer::tokenize;

fn parse_source(source: &str) -> RawTree {
    parse(&tokenize(source))
}

fn element(node: &RawNode) -> &RawElement {
    match node {
        RawNode::Element(e) => e,
        other => panic!("expected element, got {:?}", other),
    }
}

#[cfg(test)]
mod structure_tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let tree = parse_source("");
        assert!(tree.roots.is_empty());
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_single_element() {
        let tree = parse_source("<div></div>");
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(element(&tree.roots[0]).name, "div");
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_nested_elements() {
        let tree = parse_source("<a><b><c/></b></a>");
        let a = element(&tree.roots[0]);
        let b = element(&a.children[0]);
        let c = element(&b.children[0]);
        assert_eq!((a.name.as_str(), b.name.as_str(), c.name.as_str()), ("a", "b", "c"));
        assert!(c.self_closing);
    }

    #[test]
    fn test_text_and_binding_children() {
        let tree = parse_source("<p>hello {{value: Name}}!</p>");
        let p = element(&tree.roots[0]);
        assert_eq!(p.children.len(), 3);
        assert!(matches!(&p.children[0], RawNode::Literal(l) if l.text == "hello "));
        assert!(matches!(&p.children[1], RawNode::Binding(b) if b.expression == "Name"));
        assert!(matches!(&p.children[2], RawNode::Literal(l) if l.text == "!"));
    }

    #[test]
    fn test_void_element_closes_immediately() {
        let tree = parse_source("<div><br><span></span></div>");
        let div = element(&tree.roots[0]);
        assert_eq!(div.children.len(), 2);
        assert_eq!(element(&div.children[0]).name, "br");
        assert_eq!(element(&div.children[1]).name, "span");
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_deep_nesting_no_stack_overflow() {
        let depth = 20_000;
        let mut source = String::new();
        for _ in 0..depth {
            source.push_str("<div>");
        }
        for _ in 0..depth {
            source.push_str("</div>");
        }
        let tree = parse_source(&source);
        assert_eq!(tree.roots.len(), 1);
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_attributes() {
        let tree = parse_source(r#"<TextBox Text="{value: Name}" class="wide" disabled/>"#);
        let e = element(&tree.roots[0]);
        assert_eq!(e.attributes.len(), 3);
        assert!(matches!(
            &e.attributes[0].value,
            RawAttributeValue::Binding { kind, expression }
                if kind == "value" && expression == "Name"
        ));
        assert_eq!(
            e.attributes[1].value,
            RawAttributeValue::Literal("wide".into())
        );
        assert_eq!(e.attributes[2].value, RawAttributeValue::Empty);
    }

    #[test]
    fn test_directives_collected_at_root() {
        let tree = parse_source("@viewModel Customer\n@masterPage Site.vhtml\n<div/>");
        assert_eq!(tree.directives.len(), 2);
        assert_eq!(tree.directive("viewModel").unwrap().value, "Customer");
        assert_eq!(tree.directive("masterPage").unwrap().value, "Site.vhtml");
    }
}

#[cfg(test)]
mod recovery_tests {
    use super::*;

    #[test]
    fn test_unclosed_element_is_kept() {
        let tree = parse_source("<div><span>text");
        let div = element(&tree.roots[0]);
        let span = element(&div.children[0]);
        assert!(matches!(&span.children[0], RawNode::Literal(_)));
        assert!(tree.has_errors());
    }

    #[test]
    fn test_mismatched_close_recovers_to_match() {
        // </a> closes <a>, implicitly closing the open <b>
        let tree = parse_source("<a><b>text</a>");
        let a = element(&tree.roots[0]);
        assert_eq!(a.name, "a");
        let b = element(&a.children[0]);
        assert_eq!(b.name, "b");
        assert!(matches!(&b.children[0], RawNode::Literal(_)));
        assert!(tree.has_errors());
    }

    #[test]
    fn test_unmatched_close_leaves_stack_unchanged() {
        let tree = parse_source("<a></b>text</a>");
        let a = element(&tree.roots[0]);
        assert_eq!(a.name, "a");
        // text still belongs to <a>
        assert!(a
            .children
            .iter()
            .any(|c| matches!(c, RawNode::Literal(l) if l.text == "text")));
        assert!(tree.has_errors());
    }

    #[test]
    fn test_no_subtree_dropped_on_error() {
        let tree = parse_source("<a><b>inner</b");
        let a = element(&tree.roots[0]);
        assert!(!a.children.is_empty());
        assert!(tree.has_errors());
    }

    #[test]
    fn test_directive_after_content_is_error() {
        // the tokenizer stops recognizing directives after markup, so build
        // the token stream by hand
        use crate::tokenizer::tokens::{Token, TokenKind};
        use crate::util::span::Span;
        let tokens = vec![
            Token::new(TokenKind::OpenTagBegin, Span::dummy()),
            Token::new(
                TokenKind::TagName { prefix: None, name: "div".into() },
                Span::dummy(),
            ),
            Token::new(TokenKind::TagEnd, Span::dummy()),
            Token::new(
                TokenKind::Directive { name: "viewModel".into(), value: "X".into() },
                Span::dummy(),
            ),
            Token::new(TokenKind::CloseTagBegin, Span::dummy()),
            Token::new(
                TokenKind::TagName { prefix: None, name: "div".into() },
                Span::dummy(),
            ),
            Token::new(TokenKind::TagEnd, Span::dummy()),
            Token::new(TokenKind::Eof, Span::dummy()),
        ];
        let tree = parse(&tokens);
        assert!(tree.directives.is_empty());
        assert!(tree.has_errors());
    }

    #[test]
    fn test_diagnostics_empty_for_clean_input() {
        let tree = parse_source("@viewModel X\n<div class=\"a\"><p>hi</p></div>");
        assert!(tree.all_diagnostics().is_empty());
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_diagnostics_nonempty_for_defects() {
        for source in ["<a", "<a></b>", "<a><b></a>", "text {{bad}}", "<a x=>"] {
            let tree = parse_source(source);
            assert!(
                !tree.all_diagnostics().is_empty(),
                "expected diagnostics for {:?}",
                source
            );
        }
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The parser returns a tree for any input and never panics.
        #[test]
        fn parse_is_total(source in ".{0,200}") {
            let _ = parse_source(&source);
        }

        /// Well-formed single elements never produce diagnostics.
        #[test]
        fn clean_elements_have_no_diagnostics(name in "x[a-zA-Z0-9]{0,10}") {
            let source = format!("<{0}>text</{0}>", name);
            let tree = parse_source(&source);
            prop_assert!(!tree.has_errors());
        }
    }
}
