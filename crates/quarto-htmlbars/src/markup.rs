/*
 * markup.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lenient markup parsing for unescaped insertion.
//!
//! Values inserted with `{{{...}}}` are data, not templates, and never fail to
//! insert. The tokenizer is html5gum; tree building recovers the way a browser
//! fragment parser does for the common cases: open elements are closed at end
//! of input, stray closing tags are dropped, and `<p>`/`<li>`-style elements
//! are closed implicitly by a following sibling.

use html5gum::{State, Token, Tokenizer};

use crate::ast::{AttributeNode, AttributePart, Element, TemplateNode};
use crate::parser::is_void_element;

/// Parse markup from data into a node list. `{{` carries no meaning here.
pub fn parse_markup(markup: &str) -> Vec<TemplateNode> {
    let mut tokenizer = Tokenizer::new(markup);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<TemplateNode> = Vec::new();

    while let Some(Ok(token)) = tokenizer.next() {
        match token {
            Token::StartTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                while stack
                    .last()
                    .is_some_and(|open| closes_implicitly(&open.tag, &name))
                {
                    close_top(&mut stack, &mut roots);
                }

                let attributes = tag
                    .attributes
                    .iter()
                    .map(|(k, v)| AttributeNode {
                        name: String::from_utf8_lossy(k).into_owned(),
                        value: vec![AttributePart::Text(String::from_utf8_lossy(v).into_owned())],
                    })
                    .collect();
                let element = Element {
                    tag: name.clone(),
                    attributes,
                    children: Vec::new(),
                };

                if tag.self_closing || is_void_element(&name) {
                    push_node(&mut stack, &mut roots, TemplateNode::Element(element));
                } else {
                    match name.as_str() {
                        "script" | "style" => tokenizer.set_state(State::ScriptData),
                        "textarea" | "title" => tokenizer.set_state(State::RcData),
                        _ => {}
                    }
                    stack.push(element);
                }
            }
            Token::EndTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                match stack.iter().rposition(|open| open.tag == name) {
                    Some(index) => {
                        while stack.len() > index {
                            close_top(&mut stack, &mut roots);
                        }
                    }
                    None => tracing::trace!(tag = %name, "dropping stray closing tag"),
                }
            }
            Token::String(text) => {
                let text = String::from_utf8_lossy(&text);
                push_text(&mut stack, &mut roots, &text);
            }
            Token::Comment(_) | Token::Doctype(_) | Token::Error(_) => {}
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    roots
}

/// Whether opening `incoming` ends the element `open` (an omitted end tag).
fn closes_implicitly(open: &str, incoming: &str) -> bool {
    match open {
        "li" => incoming == "li",
        "dt" | "dd" => matches!(incoming, "dt" | "dd"),
        "option" => matches!(incoming, "option" | "optgroup"),
        "tr" => incoming == "tr",
        "td" | "th" => matches!(incoming, "td" | "th" | "tr"),
        "p" => matches!(
            incoming,
            "address"
                | "article"
                | "aside"
                | "blockquote"
                | "div"
                | "dl"
                | "fieldset"
                | "footer"
                | "form"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "header"
                | "hr"
                | "main"
                | "nav"
                | "ol"
                | "p"
                | "pre"
                | "section"
                | "table"
                | "ul"
        ),
        _ => false,
    }
}

fn close_top(stack: &mut Vec<Element>, roots: &mut Vec<TemplateNode>) {
    if let Some(element) = stack.pop() {
        push_node(stack, roots, TemplateNode::Element(element));
    }
}

fn push_node(stack: &mut [Element], roots: &mut Vec<TemplateNode>, node: TemplateNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn push_text(stack: &mut [Element], roots: &mut Vec<TemplateNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    let siblings = match stack.last_mut() {
        Some(parent) => &mut parent.children,
        None => roots,
    };
    match siblings.last_mut() {
        Some(TemplateNode::Text { text: prev }) => prev.push_str(text),
        _ => siblings.push(TemplateNode::text(text)),
    }
}
