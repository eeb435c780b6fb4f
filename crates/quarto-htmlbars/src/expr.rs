/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mustache expressions.
//!
//! Everything between `{{` and `}}` parses into an [`Expression`]. Each
//! argument token is classified into exactly one [`TypeTag`]; the tag travels
//! to helpers alongside the argument so they can tell `{{h "title"}}` from
//! `{{h title}}`.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::value::format_number;

/// The kind of a literal or path argument, as reported to helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Id,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Id => "id",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified argument token.
///
/// Paths are *not* resolved when handed to a helper; a helper receives the
/// path segments and decides whether to look them up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Param {
    String(String),
    Number(f64),
    Boolean(bool),
    Id(Vec<String>),
}

impl Param {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Param::String(_) => TypeTag::String,
            Param::Number(_) => TypeTag::Number,
            Param::Boolean(_) => TypeTag::Boolean,
            Param::Id(_) => TypeTag::Id,
        }
    }

    /// The path segments, if this is a path argument.
    pub fn as_path(&self) -> Option<&[String]> {
        match self {
            Param::Id(path) => Some(path),
            _ => None,
        }
    }

    /// Classify a raw token.
    ///
    /// - numeric literal (`-?[0-9]+(.[0-9]+)?`) → number
    /// - `true` / `false` → boolean
    /// - single- or double-quoted → string, quotes stripped
    /// - anything else → dotted path
    pub fn classify(token: &str) -> Param {
        if is_number(token) {
            if let Ok(n) = token.parse::<f64>() {
                return Param::Number(n);
            }
        }
        match token {
            "true" => return Param::Boolean(true),
            "false" => return Param::Boolean(false),
            _ => {}
        }
        if let Some(inner) = unquote(token) {
            return Param::String(inner.to_string());
        }
        Param::Id(split_path(token))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::String(s) => f.write_str(s),
            Param::Number(n) => f.write_str(&format_number(*n)),
            Param::Boolean(b) => write!(f, "{}", b),
            Param::Id(path) => f.write_str(&path.join(".")),
        }
    }
}

/// A parsed mustache expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    /// `{{post.title}}`. Segments are empty for `{{this}}`.
    Path { segments: Vec<String> },

    /// `{{"text"}}`
    StringLiteral { value: String },

    /// `{{42}}`
    NumberLiteral { value: f64 },

    /// `{{true}}`
    BooleanLiteral { value: bool },

    /// `{{name arg key=value}}`
    HelperCall {
        name: String,
        params: Vec<Param>,
        hash: HashMap<String, Param>,
    },
}

impl Expression {
    /// Build the expression for a single token.
    pub fn from_param(param: Param) -> Expression {
        match param {
            Param::String(value) => Expression::StringLiteral { value },
            Param::Number(value) => Expression::NumberLiteral { value },
            Param::Boolean(value) => Expression::BooleanLiteral { value },
            Param::Id(segments) => Expression::Path { segments },
        }
    }

    /// The type tag of a literal or path; `None` for helper calls.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Expression::Path { .. } => Some(TypeTag::Id),
            Expression::StringLiteral { .. } => Some(TypeTag::String),
            Expression::NumberLiteral { .. } => Some(TypeTag::Number),
            Expression::BooleanLiteral { .. } => Some(TypeTag::Boolean),
            Expression::HelperCall { .. } => None,
        }
    }
}

fn is_number(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

fn unquote(token: &str) -> Option<&str> {
    let quote = token.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    token
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
}

/// Split a path token into segments.
///
/// `this` and `.` refer to the context itself; a leading `this.` is dropped.
pub fn split_path(token: &str) -> Vec<String> {
    let token = token
        .strip_prefix("this.")
        .or_else(|| token.strip_prefix("this/"))
        .unwrap_or(token);
    if token == "this" || token == "." {
        return Vec::new();
    }
    token
        .split(['.', '/'])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
