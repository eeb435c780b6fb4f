/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup tokenizer.
//!
//! Turns template source into a flat stream of [`Token`]s. The lexer knows
//! where mustaches, tags and attribute values begin and end; it does not know
//! how elements nest (that is the tree builder's job in [`crate::parser`]) or
//! what a mustache means (see [`crate::parser::parse_expression`]).

use crate::error::{TemplateError, TemplateResult};
use crate::escape::decode_entities;

/// A lexical token. Offsets are byte offsets into the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text {
        text: String,
        offset: usize,
    },
    Mustache(RawMustache),
    StartTag {
        name: String,
        attributes: Vec<RawAttribute>,
        self_closing: bool,
        offset: usize,
    },
    EndTag {
        name: String,
        offset: usize,
    },
}

/// The unparsed inside of a mustache.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMustache {
    /// Expression source with surrounding whitespace trimmed.
    pub source: String,
    pub escaped: bool,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub value: Vec<RawAttributePart>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawAttributePart {
    Text(String),
    Mustache(RawMustache),
}

/// Tokenize template source.
pub fn tokenize(source: &str) -> TemplateResult<Vec<Token>> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> TemplateResult<()> {
        while self.pos < self.source.len() {
            if self.at_mustache(self.pos) {
                if let Some(m) = self.lex_mustache()? {
                    self.tokens.push(Token::Mustache(m));
                }
            } else if self.rest().starts_with("<!--") {
                self.skip_past("-->", "unterminated comment")?;
            } else if self.rest().starts_with("<!") {
                self.skip_past(">", "unterminated declaration")?;
            } else if self.rest().starts_with("</") {
                self.lex_end_tag()?;
            } else if self.at_start_tag(self.pos) {
                self.lex_start_tag()?;
            } else {
                self.lex_text();
            }
        }
        Ok(())
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.source.as_bytes().get(at).copied()
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::parse_at(self.source, offset, message)
    }

    fn at_mustache(&self, at: usize) -> bool {
        self.source.as_bytes()[at..].starts_with(b"{{")
    }

    fn at_start_tag(&self, at: usize) -> bool {
        self.byte(at) == Some(b'<') && self.byte(at + 1).is_some_and(|b| b.is_ascii_alphabetic())
    }

    fn at_markup(&self, at: usize) -> bool {
        if self.at_mustache(at) {
            return true;
        }
        self.byte(at) == Some(b'<')
            && matches!(self.byte(at + 1), Some(b'/' | b'!'))
            || self.at_start_tag(at)
    }

    fn skip_whitespace(&mut self) {
        while self.byte(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, terminator: &str, message: &str) -> TemplateResult<()> {
        match self.rest().find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(self.error(self.pos, message)),
        }
    }

    fn lex_text(&mut self) {
        let start = self.pos;
        // The first byte is never markup here; stopping only on ASCII markup
        // bytes keeps the slice on a char boundary.
        let mut end = start + 1;
        while end < self.source.len() && !self.at_markup(end) {
            end += 1;
        }
        while !self.source.is_char_boundary(end) {
            end += 1;
        }
        self.pos = end;
        self.tokens.push(Token::Text {
            text: decode_entities(&self.source[start..end]),
            offset: start,
        });
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .byte(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
        {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    /// Lex a mustache at the current position. Comments yield `None`.
    fn lex_mustache(&mut self) -> TemplateResult<Option<RawMustache>> {
        let offset = self.pos;

        if self.rest().starts_with("{{!--") {
            self.skip_past("--}}", "unterminated comment")?;
            return Ok(None);
        }
        if self.rest().starts_with("{{!") {
            self.skip_past("}}", "unterminated comment")?;
            return Ok(None);
        }

        let (open, escaped) = if self.rest().starts_with("{{{") {
            (3, false)
        } else {
            (2, true)
        };

        let body_start = offset + open;
        let bytes = self.source.as_bytes();
        let mut i = body_start;
        loop {
            if i >= bytes.len() {
                return Err(self.error(offset, "unterminated mustache"));
            }
            if bytes[i..].starts_with(b"}}") {
                break;
            }
            // A quote only opens a string literal at the start of a token.
            let at_token_start = i == body_start
                || bytes[i - 1].is_ascii_whitespace()
                || bytes[i - 1] == b'=';
            if at_token_start && matches!(bytes[i], b'"' | b'\'') {
                match self.source[i + 1..].find(bytes[i] as char) {
                    Some(len) => i += len + 1,
                    None => return Err(self.error(offset, "unterminated string literal")),
                }
            }
            i += 1;
        }

        self.pos = i + 2;
        // `{{{x}}` closes like `{{{x}}}`.
        if !escaped && self.byte(self.pos) == Some(b'}') {
            self.pos += 1;
        }
        Ok(Some(RawMustache {
            source: self.source[body_start..i].trim().to_string(),
            escaped,
            offset,
        }))
    }

    fn lex_end_tag(&mut self) -> TemplateResult<()> {
        let offset = self.pos;
        self.pos += 2;
        let name = self.read_name();
        if name.is_empty() {
            return Err(self.error(offset, "malformed closing tag"));
        }
        self.skip_whitespace();
        if self.byte(self.pos) != Some(b'>') {
            return Err(self.error(offset, format!("unterminated closing tag </{}>", name)));
        }
        self.pos += 1;
        self.tokens.push(Token::EndTag {
            name: name.to_string(),
            offset,
        });
        Ok(())
    }

    fn lex_start_tag(&mut self) -> TemplateResult<()> {
        let offset = self.pos;
        self.pos += 1;
        let name = self.read_name().to_string();
        let mut attributes = Vec::new();

        let self_closing = loop {
            self.skip_whitespace();
            match self.byte(self.pos) {
                None => return Err(self.error(offset, format!("unterminated tag <{}>", name))),
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(b'/') if self.byte(self.pos + 1) == Some(b'>') => {
                    self.pos += 2;
                    break true;
                }
                Some(_) if self.at_mustache(self.pos) => {
                    return Err(self.error(
                        self.pos,
                        format!("mustaches are not allowed in the tag of <{}>", name),
                    ));
                }
                Some(_) => attributes.push(self.lex_attribute()?),
            }
        };

        self.tokens.push(Token::StartTag {
            name,
            attributes,
            self_closing,
            offset,
        });
        Ok(())
    }

    fn lex_attribute(&mut self) -> TemplateResult<RawAttribute> {
        let offset = self.pos;
        while self.byte(self.pos).is_some_and(|b| {
            !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'' | b'<')
        }) {
            self.pos += 1;
        }
        let name = self.source[offset..self.pos].to_string();
        if name.is_empty() {
            return Err(self.error(offset, "malformed attribute"));
        }

        self.skip_whitespace();
        if self.byte(self.pos) != Some(b'=') {
            return Ok(RawAttribute {
                name,
                value: Vec::new(),
                offset,
            });
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.byte(self.pos) {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                let parts = self.lex_attribute_value(|b| b == q)?;
                if self.byte(self.pos) != Some(q) {
                    return Err(self.error(
                        offset,
                        format!("unterminated value for attribute '{}'", name),
                    ));
                }
                self.pos += 1;
                parts
            }
            Some(b) if !b.is_ascii_whitespace() && b != b'>' => {
                self.lex_attribute_value(|b| b.is_ascii_whitespace() || b == b'>')?
            }
            _ => {
                return Err(self.error(
                    offset,
                    format!("missing value for attribute '{}'", name),
                ));
            }
        };

        Ok(RawAttribute {
            name,
            value,
            offset,
        })
    }

    /// Lex an attribute value up to (not including) the terminator byte or EOF.
    fn lex_attribute_value(
        &mut self,
        is_terminator: impl Fn(u8) -> bool,
    ) -> TemplateResult<Vec<RawAttributePart>> {
        let mut parts = Vec::new();
        let mut text_start = self.pos;

        let flush = |parts: &mut Vec<RawAttributePart>, text: &str| {
            if !text.is_empty() {
                parts.push(RawAttributePart::Text(decode_entities(text)));
            }
        };

        while let Some(b) = self.byte(self.pos) {
            if is_terminator(b) {
                break;
            }
            if self.at_mustache(self.pos) {
                flush(&mut parts, &self.source[text_start..self.pos]);
                if let Some(m) = self.lex_mustache()? {
                    parts.push(RawAttributePart::Mustache(m));
                }
                text_start = self.pos;
            } else {
                self.pos += 1;
            }
        }
        flush(&mut parts, &self.source[text_start..self.pos]);
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source).expect("source should tokenize")
    }

    #[test]
    fn test_text_and_mustaches() {
        let tokens = lex("a {{b}} {{{ c }}}");
        assert_eq!(
            tokens,
            vec![
                Token::Text {
                    text: "a ".into(),
                    offset: 0
                },
                Token::Mustache(RawMustache {
                    source: "b".into(),
                    escaped: true,
                    offset: 2
                }),
                Token::Text {
                    text: " ".into(),
                    offset: 7
                },
                Token::Mustache(RawMustache {
                    source: "c".into(),
                    escaped: false,
                    offset: 8
                }),
            ]
        );
    }

    #[test]
    fn test_tags_and_attributes() {
        let tokens = lex(r#"<a href='x' data-on=yes disabled>hi</a>"#);
        let Token::StartTag {
            name, attributes, ..
        } = &tokens[0]
        else {
            panic!("expected start tag, got {:?}", tokens[0]);
        };
        assert_eq!(name, "a");
        let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["href", "data-on", "disabled"]);
        assert_eq!(attributes[1].value, vec![RawAttributePart::Text("yes".into())]);
        assert!(attributes[2].value.is_empty());
        assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "a"));
    }

    #[test]
    fn test_mustache_with_quotes_inside_attribute() {
        let tokens = lex(r#"<div class="{{testing on truthy="yeah" falsy="nope"}}">hi</div>"#);
        let Token::StartTag { attributes, .. } = &tokens[0] else {
            panic!("expected start tag");
        };
        match attributes[0].value.as_slice() {
            [RawAttributePart::Mustache(m)] => {
                assert_eq!(m.source, r#"testing on truthy="yeah" falsy="nope""#);
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_triple_open_closes_on_double_brace() {
        let tokens = lex("<div>{{{unescaped}}</div>");
        assert_eq!(
            tokens[1],
            Token::Mustache(RawMustache {
                source: "unescaped".into(),
                escaped: false,
                offset: 5
            })
        );
        assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "div"));
    }

    #[test]
    fn test_literal_may_contain_closing_braces() {
        let tokens = lex(r#"{{h "a}}b"}}"#);
        assert!(matches!(&tokens[0], Token::Mustache(m) if m.source == r#"h "a}}b""#));
    }

    #[test]
    fn test_apostrophe_inside_a_word_does_not_open_a_literal() {
        let tokens = lex("<p>{{it's}}</p> don't {{x}}");
        assert!(matches!(&tokens[1], Token::Mustache(m) if m.source == "it's"));
        assert!(matches!(&tokens[2], Token::EndTag { name, .. } if name == "p"));
    }

    #[test]
    fn test_mixed_attribute_value() {
        let tokens = lex(r#"<p class="btn {{kind}}-x"></p>"#);
        let Token::StartTag { attributes, .. } = &tokens[0] else {
            panic!("expected start tag");
        };
        assert_eq!(attributes[0].value.len(), 3);
    }

    #[test]
    fn test_comments_are_dropped() {
        let tokens = lex("a<!-- note -->b{{! hidden }}c{{!-- {{x}} --}}d");
        let text: String = tokens
            .iter()
            .map(|t| match t {
                Token::Text { text, .. } => text.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(text, "abcd");
    }

    #[test]
    fn test_entities_decoded() {
        let tokens = lex("<p title='a &amp; b'>x &lt; y</p>");
        assert!(matches!(&tokens[1], Token::Text { text, .. } if text == "x < y"));
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let tokens = lex("1 < 2");
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_errors() {
        for source in [
            "<div>{{title</div>",
            "<div>{{h \"open}}</div>",
            "<div class=\"foo>content</div>",
            "<div",
            "<a href=>x</a>",
            "</>",
        ] {
            let err = tokenize(source).unwrap_err();
            assert!(
                matches!(err, TemplateError::ParseError { .. }),
                "expected parse error for {source:?}"
            );
        }
    }
}
