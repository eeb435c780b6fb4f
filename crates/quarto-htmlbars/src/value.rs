/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value and context types.
//!
//! A [`TemplateValue`] is the data a template is rendered against. The
//! [`Context`] wraps the root value in a shared handle so that bindings created
//! during a render can re-read it after the host has mutated it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TemplateValue {
    /// A null/missing value.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// A numeric value.
    Number(f64),

    /// A string value.
    String(String),

    /// A list of values.
    List(Vec<TemplateValue>),

    /// A map of string keys to values.
    Map(HashMap<String, TemplateValue>),
}

impl TemplateValue {
    /// Check if this value is "truthy".
    ///
    /// Null, `false`, `0`, NaN and the empty string are falsy; everything
    /// else (including empty lists and maps) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Null => false,
            TemplateValue::Bool(b) => *b,
            TemplateValue::Number(n) => *n != 0.0 && !n.is_nan(),
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::List(_) | TemplateValue::Map(_) => true,
        }
    }

    /// Get a nested field by path.
    ///
    /// For example, `get_path(&["post", "title"])` on a Map containing
    /// `{"post": {"title": "hello"}}` returns the title value. An empty path
    /// returns the value itself.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&TemplateValue> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };

        match self {
            TemplateValue::Map(m) => m.get(first.as_ref()).and_then(|v| v.get_path(rest)),
            TemplateValue::List(items) => first
                .as_ref()
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .and_then(|v| v.get_path(rest)),
            _ => None,
        }
    }

    /// Replace the value at `path`, creating intermediate maps as needed.
    ///
    /// Non-map values along the way are replaced by empty maps.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], value: TemplateValue) {
        match path.split_first() {
            None => *self = value,
            Some((first, rest)) => {
                if !matches!(self, TemplateValue::Map(_)) {
                    *self = TemplateValue::Map(HashMap::new());
                }
                if let TemplateValue::Map(m) = self {
                    m.entry(first.as_ref().to_string())
                        .or_default()
                        .set_path(rest, value);
                }
            }
        }
    }

    /// Render this value as a string for output.
    ///
    /// - String: returned as-is
    /// - Number: shortest form (`1`, `1.5`)
    /// - Bool: `"true"` or `"false"`
    /// - List: rendered elements joined with `,`
    /// - Map, Null: `""`
    pub fn render(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Number(n) => format_number(*n),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::List(items) => items
                .iter()
                .map(|v| v.render())
                .collect::<Vec<_>>()
                .join(","),
            TemplateValue::Map(_) | TemplateValue::Null => String::new(),
        }
    }
}

/// Format a number the way it would be written in a template.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<f64> for TemplateValue {
    fn from(n: f64) -> Self {
        TemplateValue::Number(n)
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TemplateValue::Null,
            serde_json::Value::Bool(b) => TemplateValue::Bool(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map_or(TemplateValue::Null, TemplateValue::Number),
            serde_json::Value::String(s) => TemplateValue::String(s),
            serde_json::Value::Array(items) => {
                TemplateValue::List(items.into_iter().map(TemplateValue::from).collect())
            }
            serde_json::Value::Object(map) => TemplateValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, TemplateValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// The data a template is rendered against.
///
/// Cloning a `Context` clones the handle, not the data: every clone observes
/// mutations made through any other. Bindings keep a clone so they can re-read
/// the value the host changed.
#[derive(Debug, Clone, Default)]
pub struct Context {
    root: Rc<RefCell<TemplateValue>>,
}

impl Context {
    /// Create a context around a root value.
    pub fn new(root: impl Into<TemplateValue>) -> Self {
        Self {
            root: Rc::new(RefCell::new(root.into())),
        }
    }

    /// Create a context from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Self {
        Self::new(TemplateValue::from(value))
    }

    /// Look up a path. Missing keys resolve to [`TemplateValue::Null`].
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> TemplateValue {
        self.root.borrow().get_path(path).cloned().unwrap_or_default()
    }

    /// Look up a single top-level key.
    pub fn get(&self, key: &str) -> TemplateValue {
        self.get_path(&[key])
    }

    /// Replace the value at `path`, creating intermediate maps.
    pub fn set_path<S: AsRef<str>>(&self, path: &[S], value: impl Into<TemplateValue>) {
        self.root.borrow_mut().set_path(path, value.into());
    }

    /// Replace a single top-level key.
    pub fn set(&self, key: &str, value: impl Into<TemplateValue>) {
        self.set_path(&[key], value);
    }

    /// A snapshot of the whole root value.
    pub fn snapshot(&self) -> TemplateValue {
        self.root.borrow().clone()
    }
}

impl From<TemplateValue> for Context {
    fn from(value: TemplateValue) -> Self {
        Context::new(value)
    }
}

impl From<HashMap<String, TemplateValue>> for TemplateValue {
    fn from(map: HashMap<String, TemplateValue>) -> Self {
        TemplateValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(TemplateValue::Bool(true).is_truthy());
        assert!(!TemplateValue::Bool(false).is_truthy());
        assert!(!TemplateValue::Number(0.0).is_truthy());
        assert!(TemplateValue::Number(2.0).is_truthy());
        assert!(TemplateValue::String("false".to_string()).is_truthy());
        assert!(!TemplateValue::String(String::new()).is_truthy());
        assert!(TemplateValue::List(vec![]).is_truthy());
        assert!(!TemplateValue::Null.is_truthy());
    }

    #[test]
    fn test_get_path() {
        let value = TemplateValue::from(json!({"post": {"title": "hello"}, "tags": ["a", "b"]}));

        assert_eq!(
            value.get_path(&["post", "title"]),
            Some(&TemplateValue::String("hello".to_string()))
        );
        assert_eq!(
            value.get_path(&["tags", "1"]),
            Some(&TemplateValue::String("b".to_string()))
        );
        assert_eq!(value.get_path(&["post", "missing", "deeper"]), None);
        assert_eq!(value.get_path::<&str>(&[]), Some(&value));
    }

    #[test]
    fn test_render() {
        assert_eq!(TemplateValue::Number(1.0).render(), "1");
        assert_eq!(TemplateValue::Number(-1.5).render(), "-1.5");
        assert_eq!(TemplateValue::Bool(false).render(), "false");
        assert_eq!(TemplateValue::Null.render(), "");
        assert_eq!(TemplateValue::from(json!(["a", 2, true])).render(), "a,2,true");
        assert_eq!(TemplateValue::from(json!({"a": 1})).render(), "");
    }

    #[test]
    fn test_context_is_shared_between_clones() {
        let ctx = Context::from_json(json!({"title": "hello"}));
        let held = ctx.clone();

        ctx.set("title", "goodbye");
        assert_eq!(held.get("title"), TemplateValue::from("goodbye"));
        assert_eq!(held.get("missing"), TemplateValue::Null);
    }

    #[test]
    fn test_set_path_creates_maps() {
        let ctx = Context::default();
        ctx.set_path(&["post", "url"], "linky.html");
        assert_eq!(ctx.get_path(&["post", "url"]).render(), "linky.html");
    }
}
