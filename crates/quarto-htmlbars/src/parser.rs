/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! Builds the [`TemplateNode`] tree from the lexer's token stream and parses
//! the inside of each mustache into an [`Expression`]. Parsing is fail-fast:
//! the first error aborts and no partial tree is returned.

use std::collections::HashMap;

use crate::ast::{AttributeNode, AttributePart, Element, Mustache, TemplateNode};
use crate::error::{TemplateError, TemplateResult};
use crate::expr::{Expression, Param};
use crate::lexer::{RawAttribute, RawAttributePart, RawMustache, Token, tokenize};

/// Elements that never have children and need no closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Parse template source into a list of top-level nodes.
pub fn parse(source: &str) -> TemplateResult<Vec<TemplateNode>> {
    let tokens = tokenize(source)?;
    let mut builder = TreeBuilder {
        source,
        tokens: tokens.into_iter(),
    };
    builder.parse_children(None)
}

struct TreeBuilder<'a> {
    source: &'a str,
    tokens: std::vec::IntoIter<Token>,
}

impl TreeBuilder<'_> {
    fn error(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::parse_at(self.source, offset, message)
    }

    /// Parse nodes until the close tag of `open` (or end of input at top level).
    fn parse_children(
        &mut self,
        open: Option<(&str, usize)>,
    ) -> TemplateResult<Vec<TemplateNode>> {
        let mut nodes: Vec<TemplateNode> = Vec::new();

        loop {
            let Some(token) = self.tokens.next() else {
                return match open {
                    Some((tag, offset)) => {
                        Err(self.error(offset, format!("unclosed element <{}>", tag)))
                    }
                    None => Ok(nodes),
                };
            };

            match token {
                Token::Text { text, .. } => match nodes.last_mut() {
                    Some(TemplateNode::Text { text: prev }) => prev.push_str(&text),
                    _ => nodes.push(TemplateNode::Text { text }),
                },
                Token::Mustache(raw) => nodes.push(TemplateNode::Mustache(self.mustache(raw)?)),
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                    offset,
                } => {
                    let attributes = attributes
                        .into_iter()
                        .map(|attr| self.attribute(attr))
                        .collect::<TemplateResult<Vec<_>>>()?;
                    let children = if self_closing || is_void_element(&name) {
                        Vec::new()
                    } else {
                        self.parse_children(Some((&name, offset)))?
                    };
                    nodes.push(TemplateNode::Element(Element {
                        tag: name,
                        attributes,
                        children,
                    }));
                }
                Token::EndTag { name, offset } => {
                    return match open {
                        Some((tag, _)) if tag.eq_ignore_ascii_case(&name) => Ok(nodes),
                        Some((tag, _)) => Err(self.error(
                            offset,
                            format!("mismatched closing tag </{}>, expected </{}>", name, tag),
                        )),
                        None => {
                            Err(self.error(offset, format!("unexpected closing tag </{}>", name)))
                        }
                    };
                }
            }
        }
    }

    fn attribute(&self, raw: RawAttribute) -> TemplateResult<AttributeNode> {
        let value = raw
            .value
            .into_iter()
            .map(|part| match part {
                RawAttributePart::Text(text) => Ok(AttributePart::Text(text)),
                RawAttributePart::Mustache(m) => self.mustache(m).map(AttributePart::Mustache),
            })
            .collect::<TemplateResult<Vec<_>>>()?;
        Ok(AttributeNode {
            name: raw.name,
            value,
        })
    }

    fn mustache(&self, raw: RawMustache) -> TemplateResult<Mustache> {
        let expression = parse_expression(&raw.source).map_err(|msg| self.error(raw.offset, msg))?;
        Ok(Mustache {
            expression,
            escaped: raw.escaped,
        })
    }
}

/// Parse the inside of a mustache.
///
/// A single token is a bare path or literal. Anything else is a helper call:
/// the first token names the helper, followed by positional arguments and
/// then `key=value` hash arguments.
pub fn parse_expression(source: &str) -> Result<Expression, String> {
    let tokens = split_tokens(source)?;
    let Some((first, rest)) = tokens.split_first() else {
        return Err("empty mustache".to_string());
    };

    if rest.is_empty() && hash_pair(first).is_none() {
        return Ok(Expression::from_param(Param::classify(first)));
    }

    if hash_pair(first).is_some() {
        return Err(format!("expected a helper name before '{}'", first));
    }
    match Param::classify(first) {
        Param::Id(path) if !path.is_empty() => {}
        _ => return Err(format!("expected a helper name, found '{}'", first)),
    }

    let mut params = Vec::new();
    let mut hash = HashMap::new();
    for token in rest {
        match hash_pair(token) {
            Some((key, value)) => {
                if value.is_empty() {
                    return Err(format!("missing value for hash argument '{}'", key));
                }
                hash.insert(key.to_string(), Param::classify(value));
            }
            None if !hash.is_empty() => {
                return Err(format!(
                    "positional argument '{}' must come before hash arguments",
                    token
                ));
            }
            None => params.push(Param::classify(token)),
        }
    }

    Ok(Expression::HelperCall {
        name: first.clone(),
        params,
        hash,
    })
}

/// Split `key=value` when the key is a plain identifier.
fn hash_pair(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let is_ident = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    is_ident.then_some((key, value))
}

/// Split on whitespace, keeping quoted runs together.
fn split_tokens(source: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in source.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
