/*
 * runtime.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Resolution runtime.
//!
//! When a compiled template meets a mustache it asks the [`Runtime`] what to
//! do. Dispatch precedence, checked at render time:
//!
//! 1. A helper call (or a bare single-segment path) naming a registered
//!    helper invokes that helper.
//! 2. A bare path in content position goes to the `RESOLVE` hook, if any.
//! 3. A bare path in attribute position goes to the `RESOLVE_ATTR` hook, if any.
//! 4. Otherwise the path is looked up in the [`Context`] and inserted.
//!
//! The runtime is an explicit value: independent renders can use independent
//! registries.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{AttributePart, Mustache};
use crate::binding::Binding;
use crate::dom::Document;
use crate::error::{HelperError, TemplateError, TemplateResult};
use crate::expr::{Expression, Param, TypeTag, split_path};
use crate::value::{Context, TemplateValue, format_number};

/// What a helper or hook did.
pub enum HelperOutcome<D: Document> {
    /// Insert this value (as text or markup in content, as the attribute value
    /// in attribute position). An empty string is a value like any other.
    Value(String),

    /// The callee already mutated the output tree; the runtime does nothing.
    Handled,

    /// Like [`HelperOutcome::Handled`], and the callee wants the host to be
    /// able to update its output later.
    Bound(Binding<D>),
}

impl<D: Document> HelperOutcome<D> {
    pub fn value(value: impl Into<String>) -> Self {
        HelperOutcome::Value(value.into())
    }
}

impl<D: Document> fmt::Debug for HelperOutcome<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperOutcome::Value(v) => f.debug_tuple("Value").field(v).finish(),
            HelperOutcome::Handled => f.write_str("Handled"),
            HelperOutcome::Bound(b) => f.debug_tuple("Bound").field(b).finish(),
        }
    }
}

/// Result type returned by helpers and hooks.
pub type HelperResult<D> = Result<HelperOutcome<D>, HelperError>;

pub type Helper<D> = Box<dyn Fn(&Invocation<'_, D>) -> HelperResult<D>>;
pub type ResolveHook<D> = Box<dyn Fn(&[String], &ContentInvocation<'_, D>) -> HelperResult<D>>;
pub type ResolveAttrHook<D> =
    Box<dyn Fn(&[String], &AttributeInvocation<'_, D>) -> HelperResult<D>>;

/// The two resolution hook slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// `RESOLVE`: bare paths in content position.
    Resolve,
    /// `RESOLVE_ATTR`: bare paths that make up a whole attribute value.
    ResolveAttr,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::Resolve => "RESOLVE",
            HookKind::ResolveAttr => "RESOLVE_ATTR",
        }
    }
}

/// Arguments of a helper call, with their type tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelperArgs {
    pub params: Vec<Param>,
    /// `types[i]` is the type tag of `params[i]`.
    pub types: Vec<TypeTag>,
    pub hash: HashMap<String, Param>,
    pub hash_types: HashMap<String, TypeTag>,
}

impl HelperArgs {
    pub fn new(params: Vec<Param>, hash: HashMap<String, Param>) -> Self {
        let types = params.iter().map(Param::type_tag).collect();
        let hash_types = hash.iter().map(|(k, v)| (k.clone(), v.type_tag())).collect();
        Self {
            params,
            types,
            hash,
            hash_types,
        }
    }
}

/// A call in content position.
pub struct ContentInvocation<'a, D: Document> {
    pub args: HelperArgs,
    /// The element being built; content appended here lands at the mustache.
    pub element: D::Node,
    /// `false` for `{{{triple}}}` mustaches.
    pub escaped: bool,
    pub context: &'a Context,
    pub document: &'a D,
}

/// A call in attribute position.
pub struct AttributeInvocation<'a, D: Document> {
    pub args: HelperArgs,
    /// The element owning the attribute.
    pub element: D::Node,
    pub attr_name: String,
    pub context: &'a Context,
    pub document: &'a D,
}

/// Everything a helper is told about the call site.
pub enum Invocation<'a, D: Document> {
    Content(ContentInvocation<'a, D>),
    Attribute(AttributeInvocation<'a, D>),
}

impl<'a, D: Document> Invocation<'a, D> {
    pub fn args(&self) -> &HelperArgs {
        match self {
            Invocation::Content(c) => &c.args,
            Invocation::Attribute(a) => &a.args,
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.args().params
    }

    pub fn param(&self, index: usize) -> Option<&Param> {
        self.args().params.get(index)
    }

    pub fn types(&self) -> &[TypeTag] {
        &self.args().types
    }

    pub fn hash(&self, key: &str) -> Option<&Param> {
        self.args().hash.get(key)
    }

    pub fn hash_type(&self, key: &str) -> Option<TypeTag> {
        self.args().hash_types.get(key).copied()
    }

    pub fn element(&self) -> &D::Node {
        match self {
            Invocation::Content(c) => &c.element,
            Invocation::Attribute(a) => &a.element,
        }
    }

    pub fn context(&self) -> &'a Context {
        match self {
            Invocation::Content(c) => c.context,
            Invocation::Attribute(a) => a.context,
        }
    }

    pub fn document(&self) -> &'a D {
        match self {
            Invocation::Content(c) => c.document,
            Invocation::Attribute(a) => a.document,
        }
    }

    /// Only set in content position.
    pub fn escaped(&self) -> Option<bool> {
        match self {
            Invocation::Content(c) => Some(c.escaped),
            Invocation::Attribute(_) => None,
        }
    }

    /// Only set in attribute position.
    pub fn attr_name(&self) -> Option<&str> {
        match self {
            Invocation::Content(_) => None,
            Invocation::Attribute(a) => Some(&a.attr_name),
        }
    }

    /// The value of an argument: paths are looked up in the context,
    /// literals are returned as values.
    pub fn resolve(&self, param: &Param) -> TemplateValue {
        match param {
            Param::Id(path) => self.context().get_path(path),
            Param::String(s) => TemplateValue::String(s.clone()),
            Param::Number(n) => TemplateValue::Number(*n),
            Param::Boolean(b) => TemplateValue::Bool(*b),
        }
    }
}

/// Helper registry and resolution hooks.
pub struct Runtime<D: Document> {
    helpers: HashMap<String, Helper<D>>,
    resolve: Option<ResolveHook<D>>,
    resolve_attr: Option<ResolveAttrHook<D>>,
}

impl<D: Document> Default for Runtime<D> {
    fn default() -> Self {
        Self {
            helpers: HashMap::new(),
            resolve: None,
            resolve_attr: None,
        }
    }
}

impl<D: Document> fmt::Debug for Runtime<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helpers: Vec<&String> = self.helpers.keys().collect();
        helpers.sort();
        f.debug_struct("Runtime")
            .field("helpers", &helpers)
            .field("resolve", &self.resolve.is_some())
            .field("resolve_attr", &self.resolve_attr.is_some())
            .finish()
    }
}

impl<D: Document> Runtime<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper. A later registration under the same name wins.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&Invocation<'_, D>) -> HelperResult<D> + 'static,
    {
        self.helpers.insert(name.into(), Box::new(helper));
    }

    /// Remove a helper. Returns whether it was registered.
    pub fn unregister_helper(&mut self, name: &str) -> bool {
        self.helpers.remove(name).is_some()
    }

    /// Whether a helper is registered under `name`.
    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Install the `RESOLVE` hook for bare paths in content position.
    pub fn register_resolve_hook<F>(&mut self, hook: F)
    where
        F: Fn(&[String], &ContentInvocation<'_, D>) -> HelperResult<D> + 'static,
    {
        self.resolve = Some(Box::new(hook));
    }

    /// Install the `RESOLVE_ATTR` hook for bare paths in attribute position.
    pub fn register_resolve_attr_hook<F>(&mut self, hook: F)
    where
        F: Fn(&[String], &AttributeInvocation<'_, D>) -> HelperResult<D> + 'static,
    {
        self.resolve_attr = Some(Box::new(hook));
    }

    /// Clear a hook slot. Returns whether a hook was installed.
    pub fn unregister_hook(&mut self, kind: HookKind) -> bool {
        match kind {
            HookKind::Resolve => self.resolve.take().is_some(),
            HookKind::ResolveAttr => self.resolve_attr.take().is_some(),
        }
    }

    pub fn has_hook(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::Resolve => self.resolve.is_some(),
            HookKind::ResolveAttr => self.resolve_attr.is_some(),
        }
    }

    /// The helper a mustache invokes, if any, with its arguments.
    ///
    /// A bare single-segment path counts as a zero-argument call when a
    /// helper of that name is registered at render time.
    fn helper_for<'e>(
        &self,
        expression: &'e Expression,
    ) -> Option<(&Helper<D>, &'e str, HelperArgs)> {
        match expression {
            Expression::HelperCall { name, params, hash } => self
                .helpers
                .get(name)
                .map(|h| (h, name.as_str(), HelperArgs::new(params.clone(), hash.clone()))),
            Expression::Path { segments } => match segments.as_slice() {
                [name] => self
                    .helpers
                    .get(name)
                    .map(|h| (h, name.as_str(), HelperArgs::default())),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A bare path, or the path a helper call falls back to when the helper is
/// not registered.
fn fallback_path(expression: &Expression) -> Option<Vec<String>> {
    match expression {
        Expression::Path { segments } => Some(segments.clone()),
        Expression::HelperCall { name, .. } => {
            tracing::debug!(helper = %name, "no helper registered; resolving name as a path");
            Some(split_path(name))
        }
        _ => None,
    }
}

fn literal_text(expression: &Expression) -> String {
    match expression {
        Expression::StringLiteral { value } => value.clone(),
        Expression::NumberLiteral { value } => format_number(*value),
        Expression::BooleanLiteral { value } => value.to_string(),
        Expression::Path { .. } | Expression::HelperCall { .. } => String::new(),
    }
}

/// Mutable state of one render pass.
pub(crate) struct RenderState<'a, D: Document> {
    pub runtime: &'a Runtime<D>,
    pub document: &'a D,
    pub context: &'a Context,
    pub bindings: Vec<Binding<D>>,
}

impl<'a, D: Document> RenderState<'a, D> {
    pub fn new(runtime: &'a Runtime<D>, document: &'a D, context: &'a Context) -> Self {
        Self {
            runtime,
            document,
            context,
            bindings: Vec::new(),
        }
    }

    /// Render a mustache in content position, appending to `element`.
    pub fn render_content(&mut self, mustache: &Mustache, element: &D::Node) -> TemplateResult<()> {
        let escaped = mustache.escaped;
        let runtime = self.runtime;

        if let Some((helper, name, args)) = runtime.helper_for(&mustache.expression) {
            tracing::trace!(helper = name, "invoking helper in content position");
            let invocation = Invocation::Content(ContentInvocation {
                args,
                element: element.clone(),
                escaped,
                context: self.context,
                document: self.document,
            });
            let outcome = helper(&invocation).map_err(|err| TemplateError::resolution(name, err))?;
            return self.finish_content(outcome, escaped, element);
        }

        let Some(path) = fallback_path(&mustache.expression) else {
            return self.insert(&literal_text(&mustache.expression), escaped, element);
        };

        match &runtime.resolve {
            Some(hook) => {
                tracing::trace!(path = ?path, "invoking RESOLVE hook");
                let invocation = ContentInvocation {
                    args: HelperArgs::default(),
                    element: element.clone(),
                    escaped,
                    context: self.context,
                    document: self.document,
                };
                let outcome = hook(&path, &invocation)
                    .map_err(|err| TemplateError::resolution(HookKind::Resolve.name(), err))?;
                self.finish_content(outcome, escaped, element)
            }
            None => {
                let value = self.context.get_path(&path).render();
                self.insert(&value, escaped, element)
            }
        }
    }

    /// Render a mustache that makes up the whole value of `attr_name`.
    pub fn render_attribute(
        &mut self,
        mustache: &Mustache,
        element: &D::Node,
        attr_name: &str,
    ) -> TemplateResult<()> {
        let runtime = self.runtime;
        if let Some((helper, name, args)) = runtime.helper_for(&mustache.expression) {
            tracing::trace!(
                helper = name,
                attr = attr_name,
                "invoking helper in attribute position"
            );
            let outcome = self.invoke_attribute_helper(helper, name, args, element, attr_name)?;
            return self.finish_attribute(outcome, element, attr_name);
        }

        let Some(path) = fallback_path(&mustache.expression) else {
            self.document
                .set_attribute(element, attr_name, &literal_text(&mustache.expression));
            return Ok(());
        };

        match &runtime.resolve_attr {
            Some(hook) => {
                tracing::trace!(path = ?path, attr = attr_name, "invoking RESOLVE_ATTR hook");
                let invocation = AttributeInvocation {
                    args: HelperArgs::default(),
                    element: element.clone(),
                    attr_name: attr_name.to_string(),
                    context: self.context,
                    document: self.document,
                };
                let outcome = hook(&path, &invocation)
                    .map_err(|err| TemplateError::resolution(HookKind::ResolveAttr.name(), err))?;
                self.finish_attribute(outcome, element, attr_name)
            }
            None => {
                let value = self.context.get_path(&path).render();
                self.document.set_attribute(element, attr_name, &value);
                Ok(())
            }
        }
    }

    /// Render an attribute value mixing literal text and mustaches.
    ///
    /// Hooks are not consulted: the value is a concatenation, so no single
    /// callee can own the attribute. Helpers still run in attribute position;
    /// one that handles the call itself contributes nothing to the string.
    pub fn render_mixed_attribute(
        &mut self,
        parts: &[AttributePart],
        element: &D::Node,
        attr_name: &str,
    ) -> TemplateResult<()> {
        let runtime = self.runtime;
        let mut value = String::new();
        for part in parts {
            match part {
                AttributePart::Text(text) => value.push_str(text),
                AttributePart::Mustache(m) => {
                    if let Some((helper, name, args)) = runtime.helper_for(&m.expression) {
                        let outcome =
                            self.invoke_attribute_helper(helper, name, args, element, attr_name)?;
                        match outcome {
                            HelperOutcome::Value(v) => value.push_str(&v),
                            HelperOutcome::Handled => {}
                            HelperOutcome::Bound(binding) => self.bindings.push(binding),
                        }
                    } else if let Some(path) = fallback_path(&m.expression) {
                        value.push_str(&self.context.get_path(&path).render());
                    } else {
                        value.push_str(&literal_text(&m.expression));
                    }
                }
            }
        }
        self.document.set_attribute(element, attr_name, &value);
        Ok(())
    }

    fn invoke_attribute_helper(
        &self,
        helper: &Helper<D>,
        name: &str,
        args: HelperArgs,
        element: &D::Node,
        attr_name: &str,
    ) -> TemplateResult<HelperOutcome<D>> {
        let invocation = Invocation::Attribute(AttributeInvocation {
            args,
            element: element.clone(),
            attr_name: attr_name.to_string(),
            context: self.context,
            document: self.document,
        });
        helper(&invocation).map_err(|err| TemplateError::resolution(name, err))
    }

    fn finish_content(
        &mut self,
        outcome: HelperOutcome<D>,
        escaped: bool,
        element: &D::Node,
    ) -> TemplateResult<()> {
        match outcome {
            HelperOutcome::Value(value) => self.insert(&value, escaped, element),
            HelperOutcome::Handled => Ok(()),
            HelperOutcome::Bound(binding) => {
                self.bindings.push(binding);
                Ok(())
            }
        }
    }

    fn finish_attribute(
        &mut self,
        outcome: HelperOutcome<D>,
        element: &D::Node,
        attr_name: &str,
    ) -> TemplateResult<()> {
        match outcome {
            HelperOutcome::Value(value) => self.document.set_attribute(element, attr_name, &value),
            HelperOutcome::Handled => {}
            HelperOutcome::Bound(binding) => self.bindings.push(binding),
        }
        Ok(())
    }

    /// Insert a value as text (escaped) or as parsed markup (unescaped).
    fn insert(&self, value: &str, escaped: bool, element: &D::Node) -> TemplateResult<()> {
        let node = if escaped {
            self.document.create_text(value)
        } else {
            self.document.parse_fragment(element, value)?
        };
        self.document.append_child(element, &node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn mustache(source: &str, escaped: bool) -> Mustache {
        Mustache {
            expression: parse_expression(source).unwrap(),
            escaped,
        }
    }

    fn render(runtime: &Runtime<HtmlDocument>, source: &str, data: serde_json::Value) -> String {
        let doc = HtmlDocument::new();
        let ctx = Context::from_json(data);
        let div = doc.create_element("div");
        let mut state = RenderState::new(runtime, &doc, &ctx);
        state.render_content(&mustache(source, true), &div).unwrap();
        div.inner_html()
    }

    #[test]
    fn test_helper_args_types() {
        let args = HelperArgs::new(
            vec![Param::String("a".into()), Param::Id(vec!["b".into()])],
            HashMap::from([("n".to_string(), Param::Number(1.0))]),
        );
        assert_eq!(args.types, vec![TypeTag::String, TypeTag::Id]);
        assert_eq!(args.hash_types["n"], TypeTag::Number);
    }

    #[test]
    fn test_registry_last_registration_wins() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        runtime.register_helper("greet", |_| Ok(HelperOutcome::value("one")));
        runtime.register_helper("greet", |_| Ok(HelperOutcome::value("two")));
        assert_eq!(render(&runtime, "greet", json!({})), "two");

        assert!(runtime.unregister_helper("greet"));
        assert!(!runtime.unregister_helper("greet"));
        assert_eq!(render(&runtime, "greet", json!({"greet": "path"})), "path");
    }

    #[test]
    fn test_unregistered_call_falls_back_to_path() {
        let runtime: Runtime<HtmlDocument> = Runtime::new();
        assert_eq!(render(&runtime, "testing x", json!({"testing": "plain"})), "plain");
    }

    #[test]
    fn test_literals_render_directly() {
        let runtime: Runtime<HtmlDocument> = Runtime::new();
        assert_eq!(render(&runtime, "\"<lit>\"", json!({})), "&lt;lit&gt;");
        assert_eq!(render(&runtime, "12.5", json!({})), "12.5");
        assert_eq!(render(&runtime, "false", json!({})), "false");
    }

    #[test]
    fn test_empty_string_value_is_inserted() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        runtime.register_helper("blank", |_| Ok(HelperOutcome::value("")));
        let doc = HtmlDocument::new();
        let ctx = Context::default();
        let div = doc.create_element("div");
        let mut state = RenderState::new(&runtime, &doc, &ctx);
        state.render_content(&mustache("blank", true), &div).unwrap();
        assert_eq!(div.children().len(), 1);
    }

    #[test]
    fn test_has_helper() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        assert!(!runtime.has_helper("greet"));
        runtime.register_helper("greet", |_| Ok(HelperOutcome::value("hi")));
        assert!(runtime.has_helper("greet"));
        assert!(!runtime.has_helper("gree"));
        runtime.unregister_helper("greet");
        assert!(!runtime.has_helper("greet"));
    }

    #[test]
    fn test_unescaped_helper_value_is_parsed_as_markup() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        runtime.register_helper("badge", |inv| {
            assert_eq!(inv.escaped(), Some(false));
            Ok(HelperOutcome::value("<b>new</b><i>open"))
        });
        let doc = HtmlDocument::new();
        let ctx = Context::default();
        let div = doc.create_element("div");
        let mut state = RenderState::new(&runtime, &doc, &ctx);
        state.render_content(&mustache("badge", false), &div).unwrap();

        assert_eq!(div.inner_html(), "<b>new</b><i>open</i>");
        assert_eq!(div.children()[0].tag_name().as_deref(), Some("b"));
    }

    #[test]
    fn test_hook_slots() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        assert!(!runtime.has_hook(HookKind::Resolve));
        runtime.register_resolve_hook(|_, _| Ok(HelperOutcome::Handled));
        assert!(runtime.has_hook(HookKind::Resolve));
        assert!(runtime.unregister_hook(HookKind::Resolve));
        assert!(!runtime.unregister_hook(HookKind::ResolveAttr));
    }

    #[test]
    fn test_helper_error_propagates() {
        let mut runtime: Runtime<HtmlDocument> = Runtime::new();
        runtime.register_helper("explode", |_| Err("kaboom".into()));
        let doc = HtmlDocument::new();
        let ctx = Context::default();
        let div = doc.create_element("div");
        let mut state = RenderState::new(&runtime, &doc, &ctx);
        let err = state
            .render_content(&mustache("explode", true), &div)
            .unwrap_err();
        match err {
            TemplateError::ResolutionError { name, source } => {
                assert_eq!(name, "explode");
                assert_eq!(source.to_string(), "kaboom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
