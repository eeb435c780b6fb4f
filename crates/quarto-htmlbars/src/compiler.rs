/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile a template AST into a render program.
//!
//! Compilation walks the tree once and produces a list of closures. Rendering
//! runs them against a fresh fragment; no AST inspection happens at render
//! time beyond what the closures captured. Helper lookup is deliberately left
//! to render time, so registering a helper after compiling still takes effect.

use std::fmt;

use crate::ast::{AttributeNode, Element, Mustache, TemplateNode};
use crate::dom::Document;
use crate::error::TemplateResult;
use crate::runtime::RenderState;

/// One step of a render program: build output under the given parent.
pub(crate) type RenderOp<D> =
    Box<dyn Fn(&mut RenderState<'_, D>, &<D as Document>::Node) -> TemplateResult<()>>;

fn op<D, F>(f: F) -> RenderOp<D>
where
    D: Document,
    F: Fn(&mut RenderState<'_, D>, &D::Node) -> TemplateResult<()> + 'static,
{
    Box::new(f)
}

/// A compiled template body.
pub struct Program<D: Document> {
    ops: Vec<RenderOp<D>>,
}

impl<D: Document> fmt::Debug for Program<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program").field("ops", &self.ops.len()).finish()
    }
}

impl<D: Document> Program<D> {
    /// Run the program, appending output under `parent`.
    pub(crate) fn run(
        &self,
        state: &mut RenderState<'_, D>,
        parent: &D::Node,
    ) -> TemplateResult<()> {
        for step in &self.ops {
            step(state, parent)?;
        }
        Ok(())
    }
}

/// Compile a list of sibling nodes.
pub fn compile_ast<D: Document>(nodes: &[TemplateNode]) -> Program<D> {
    Program {
        ops: nodes.iter().map(compile_node).collect(),
    }
}

fn compile_node<D: Document>(node: &TemplateNode) -> RenderOp<D> {
    match node {
        TemplateNode::Text { text } => {
            let text = text.clone();
            op::<D, _>(move |state, parent| {
                let node = state.document.create_text(&text);
                state.document.append_child(parent, &node);
                Ok(())
            })
        }
        TemplateNode::Mustache(mustache) => {
            let mustache = mustache.clone();
            op::<D, _>(move |state, parent| state.render_content(&mustache, parent))
        }
        TemplateNode::Element(element) => compile_element(element),
    }
}

fn compile_element<D: Document>(element: &Element) -> RenderOp<D> {
    let tag = element.tag.clone();
    let attributes: Vec<RenderOp<D>> = element.attributes.iter().map(compile_attribute).collect();
    let children = compile_ast::<D>(&element.children);

    op::<D, _>(move |state, parent| {
        let el = state.document.create_element(&tag);
        for attribute in &attributes {
            attribute(state, &el)?;
        }
        // Attach before rendering children, so content helpers see the element
        // in its final position.
        state.document.append_child(parent, &el);
        children.run(state, &el)
    })
}

/// Compile one attribute; the resulting op receives the owning element.
fn compile_attribute<D: Document>(attribute: &AttributeNode) -> RenderOp<D> {
    let name = attribute.name.clone();

    if let Some(value) = attribute.static_value() {
        return op::<D, _>(move |state, element| {
            state.document.set_attribute(element, &name, &value);
            Ok(())
        });
    }

    if let Some(mustache) = attribute.sole_mustache() {
        let mustache: Mustache = mustache.clone();
        return op::<D, _>(move |state, element| state.render_attribute(&mustache, element, &name));
    }

    let parts = attribute.value.clone();
    op::<D, _>(move |state, element| state.render_mixed_attribute(&parts, element, &name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::parser::parse;
    use crate::runtime::Runtime;
    use crate::value::Context;
    use serde_json::json;

    fn run(source: &str, data: serde_json::Value) -> String {
        let program = compile_ast::<HtmlDocument>(&parse(source).unwrap());
        let runtime = Runtime::new();
        let doc = HtmlDocument::new();
        let ctx = Context::from_json(data);
        let fragment = doc.create_fragment();
        let mut state = RenderState::new(&runtime, &doc, &ctx);
        program.run(&mut state, &fragment).unwrap();
        fragment.inner_html()
    }

    #[test]
    fn test_compile_text_and_elements() {
        assert_eq!(
            run(r#"<div class="foo"><p>hi</p></div> more"#, json!({})),
            r#"<div class="foo"><p>hi</p></div> more"#
        );
    }

    #[test]
    fn test_compile_attribute_forms() {
        assert_eq!(
            run(
                r#"<a href="{{url}}" class="btn {{kind}}" title=plain>x</a>"#,
                json!({"url": "/home", "kind": "primary"})
            ),
            r#"<a href="/home" class="btn primary" title="plain">x</a>"#
        );
    }

    #[test]
    fn test_program_debug() {
        let program = compile_ast::<HtmlDocument>(&parse("a<b></b>{{c}}").unwrap());
        assert_eq!(format!("{:?}", program), "Program { ops: 3 }");
    }
}
