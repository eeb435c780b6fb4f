/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree for parsed templates: static
//! text, elements with ordered attributes, and mustache insertions.

use serde::Serialize;

use crate::expr::Expression;

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TemplateNode {
    /// Literal text, with character references already decoded.
    Text { text: String },

    /// An element with its attributes and children.
    Element(Element),

    /// `{{expr}}` (escaped) or `{{{expr}}}` (unescaped).
    Mustache(Mustache),
}

impl TemplateNode {
    pub fn text(text: impl Into<String>) -> Self {
        TemplateNode::Text { text: text.into() }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    /// Tag name as written in the source.
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<AttributeNode>,
    /// Child nodes in source order. Always empty for void elements.
    pub children: Vec<TemplateNode>,
}

/// An attribute whose value may mix literal text and mustaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeNode {
    pub name: String,
    pub value: Vec<AttributePart>,
}

impl AttributeNode {
    /// The mustache, when a single mustache makes up the whole value.
    ///
    /// Only in that case may a hook or helper take over the attribute.
    pub fn sole_mustache(&self) -> Option<&Mustache> {
        match self.value.as_slice() {
            [AttributePart::Mustache(m)] => Some(m),
            _ => None,
        }
    }

    /// The literal value, when the value contains no mustaches.
    pub fn static_value(&self) -> Option<String> {
        self.value
            .iter()
            .map(|part| match part {
                AttributePart::Text(text) => Some(text.as_str()),
                AttributePart::Mustache(_) => None,
            })
            .collect()
    }
}

/// One piece of an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributePart {
    Text(String),
    Mustache(Mustache),
}

/// A mustache insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mustache {
    pub expression: Expression,
    /// `false` for `{{{triple}}}` mustaches.
    pub escaped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mustache(name: &str) -> Mustache {
        Mustache {
            expression: Expression::Path {
                segments: vec![name.to_string()],
            },
            escaped: true,
        }
    }

    #[test]
    fn test_sole_mustache() {
        let attr = AttributeNode {
            name: "href".into(),
            value: vec![AttributePart::Mustache(mustache("url"))],
        };
        assert!(attr.sole_mustache().is_some());
        assert_eq!(attr.static_value(), None);

        let mixed = AttributeNode {
            name: "class".into(),
            value: vec![
                AttributePart::Text("btn ".into()),
                AttributePart::Mustache(mustache("kind")),
            ],
        };
        assert!(mixed.sole_mustache().is_none());
    }

    #[test]
    fn test_static_value() {
        let attr = AttributeNode {
            name: "id".into(),
            value: vec![AttributePart::Text("a".into()), AttributePart::Text("b".into())],
        };
        assert_eq!(attr.static_value().as_deref(), Some("ab"));

        let empty = AttributeNode {
            name: "disabled".into(),
            value: vec![],
        };
        assert_eq!(empty.static_value().as_deref(), Some(""));
    }
}
