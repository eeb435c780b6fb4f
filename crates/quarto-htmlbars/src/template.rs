/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates and their render results.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::TemplateNode;
use crate::binding::Binding;
use crate::compiler::{Program, compile_ast};
use crate::dom::Document;
use crate::error::TemplateResult;
use crate::parser::parse;
use crate::runtime::{RenderState, Runtime};
use crate::value::Context;

/// A parsed and compiled template.
///
/// Compiling touches no output tree. A template can be rendered any number of
/// times, with any runtime, document and context.
pub struct Template<D: Document> {
    source: Option<String>,
    nodes: Vec<TemplateNode>,
    program: Program<D>,
}

impl<D: Document> Template<D> {
    /// Parse and compile template source.
    ///
    /// Fails only with [`crate::TemplateError::ParseError`].
    pub fn compile(source: &str) -> TemplateResult<Self> {
        let nodes = parse(source)?;
        let mut template = Self::from_ast(nodes);
        template.source = Some(source.to_string());
        Ok(template)
    }

    /// Compile an already-parsed AST.
    pub fn from_ast(nodes: Vec<TemplateNode>) -> Self {
        let program = compile_ast(&nodes);
        tracing::debug!(top_level_nodes = nodes.len(), "compiled template");
        Self {
            source: None,
            nodes,
            program,
        }
    }

    /// The AST this template was compiled from.
    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    /// The source text, when compiled from source.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Render into a fresh fragment.
    pub fn render(
        &self,
        runtime: &Runtime<D>,
        document: &D,
        context: &Context,
    ) -> TemplateResult<Rendered<D>> {
        let fragment = document.create_fragment();
        let bindings = self.render_into(runtime, document, context, &fragment)?;
        Ok(Rendered { fragment, bindings })
    }

    /// Render as children of an existing node, returning the bindings created.
    ///
    /// On error, whatever was already appended to `parent` stays there.
    pub fn render_into(
        &self,
        runtime: &Runtime<D>,
        document: &D,
        context: &Context,
        parent: &D::Node,
    ) -> TemplateResult<Vec<Binding<D>>> {
        let mut state = RenderState::new(runtime, document, context);
        self.program.run(&mut state, parent)?;
        if !state.bindings.is_empty() {
            tracing::debug!(bindings = state.bindings.len(), "render produced bindings");
        }
        Ok(state.bindings)
    }
}

impl<D: Document> fmt::Debug for Template<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("program", &self.program)
            .finish()
    }
}

/// The output of one render.
///
/// The host owns both the fragment and the bindings; nothing else keeps them
/// alive or updates them.
pub struct Rendered<D: Document> {
    pub fragment: D::Node,
    pub bindings: Vec<Binding<D>>,
}

impl<D: Document> Rendered<D> {
    /// Update every binding against the current context.
    pub fn update_all(&mut self, document: &D, context: &Context) -> TemplateResult<()> {
        for binding in &mut self.bindings {
            binding.update(document, context)?;
        }
        Ok(())
    }
}

impl<D: Document> fmt::Debug for Rendered<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendered")
            .field("fragment", &self.fragment)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Compiled templates keyed by source text.
pub struct TemplateCache<D: Document> {
    templates: HashMap<String, Rc<Template<D>>>,
}

impl<D: Document> Default for TemplateCache<D> {
    fn default() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }
}

impl<D: Document> TemplateCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled template for `source`, compiling it on first use.
    ///
    /// Sources that fail to parse are not cached.
    pub fn get_or_compile(&mut self, source: &str) -> TemplateResult<Rc<Template<D>>> {
        if let Some(template) = self.templates.get(source) {
            tracing::trace!("template cache hit");
            return Ok(Rc::clone(template));
        }
        let template = Rc::new(Template::compile(source)?);
        self.templates.insert(source.to_string(), Rc::clone(&template));
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }
}

impl<D: Document> fmt::Debug for TemplateCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("len", &self.templates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::error::TemplateError;
    use serde_json::json;

    #[test]
    fn test_render_is_repeatable() {
        let template: Template<HtmlDocument> = Template::compile("<p>{{a.b}}</p>").unwrap();
        let runtime = Runtime::new();
        let doc = HtmlDocument::new();
        let ctx = Context::from_json(json!({"a": {"b": "v"}}));

        let first = template.render(&runtime, &doc, &ctx).unwrap();
        let second = template.render(&runtime, &doc, &ctx).unwrap();
        assert_eq!(first.fragment.inner_html(), "<p>v</p>");
        assert_eq!(first.fragment.inner_html(), second.fragment.inner_html());
        assert!(first.bindings.is_empty());
    }

    #[test]
    fn test_render_into_existing_node() {
        let template: Template<HtmlDocument> = Template::compile("<b>{{x}}</b>").unwrap();
        let doc = HtmlDocument::new();
        let host = doc.create_element("section");
        doc.append_child(&host, &doc.create_text("before "));
        template
            .render_into(&Runtime::new(), &doc, &Context::from_json(json!({"x": 1})), &host)
            .unwrap();
        assert_eq!(host.outer_html(), "<section>before <b>1</b></section>");
    }

    #[test]
    fn test_compile_error_has_no_template() {
        let err = Template::<HtmlDocument>::compile("<div>").unwrap_err();
        assert!(matches!(err, TemplateError::ParseError { line: 1, column: 1, .. }));
    }

    #[test]
    fn test_cache_compiles_once() {
        let mut cache: TemplateCache<HtmlDocument> = TemplateCache::new();
        let a = cache.get_or_compile("<p>{{x}}</p>").unwrap();
        let b = cache.get_or_compile("<p>{{x}}</p>").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        assert!(cache.get_or_compile("<p>").is_err());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_source_and_nodes() {
        let template: Template<HtmlDocument> = Template::compile("hi {{name}}").unwrap();
        assert_eq!(template.source(), Some("hi {{name}}"));
        assert_eq!(template.nodes().len(), 2);

        let from_ast: Template<HtmlDocument> = Template::from_ast(template.nodes().to_vec());
        assert_eq!(from_ast.source(), None);
    }
}
