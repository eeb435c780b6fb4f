/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Handlebars-flavored HTML template compiler with data-binding hooks.
//!
//! A template is HTML with embedded mustaches:
//!
//! - Escaped insertion: `{{post.title}}`
//! - Unescaped (markup) insertion: `{{{post.body}}}`
//! - Mustaches inside attribute values: `<a href="{{url}}" class="btn {{kind}}">`
//! - Helper calls with positional and hash arguments: `{{link "Home" to=home}}`
//! - Comments: `{{! ignored }}`
//!
//! There are no blocks, loops or partials.
//!
//! # Architecture
//!
//! Source is tokenized ([`lexer`]), built into a [`TemplateNode`] tree
//! ([`parser`]) and compiled into a closure program ([`compiler`]). Rendering
//! runs that program against a [`Runtime`] (helpers plus the `RESOLVE` and
//! `RESOLVE_ATTR` hooks), a [`Document`] (the output tree) and a [`Context`]
//! (the data). Helpers and hooks may hand back [`Binding`]s, which the host
//! keeps and calls after it mutates the context.
//!
//! The output tree is abstract. [`HtmlDocument`] is an in-memory
//! implementation that serializes to HTML. Unescaped values are parsed
//! leniently ([`markup`]), so malformed markup in data never fails a render.
//!
//! # Example
//!
//! ```ignore
//! use quarto_htmlbars::{Context, HtmlDocument, HtmlRuntime, HtmlTemplate};
//!
//! let template = HtmlTemplate::compile("<p class=\"{{kind}}\">{{text}}</p>")?;
//! let context = Context::from_json(serde_json::json!({"kind": "note", "text": "hi"}));
//! let rendered = template.render(&HtmlRuntime::new(), &HtmlDocument::new(), &context)?;
//! assert_eq!(rendered.fragment.inner_html(), "<p class=\"note\">hi</p>");
//! ```

pub mod ast;
pub mod binding;
pub mod compiler;
pub mod dom;
pub mod error;
pub mod escape;
pub mod expr;
pub mod lexer;
pub mod markup;
pub mod parser;
pub mod runtime;
pub mod template;
pub mod value;

// Re-export main types at crate root
pub use ast::{AttributeNode, AttributePart, Element, Mustache, TemplateNode};
pub use binding::{Binding, BindingTarget};
pub use compiler::{Program, compile_ast};
pub use dom::{Document, HtmlDocument, HtmlNode, NodeKind};
pub use error::{HelperError, TemplateError, TemplateResult};
pub use escape::decode_entities;
pub use expr::{Expression, Param, TypeTag};
pub use markup::parse_markup;
pub use parser::parse;
pub use runtime::{
    AttributeInvocation, ContentInvocation, HelperArgs, HelperOutcome, HelperResult, HookKind,
    Invocation, Runtime,
};
pub use template::{Rendered, Template, TemplateCache};
pub use value::{Context, TemplateValue};

/// A template rendering into [`HtmlDocument`].
pub type HtmlTemplate = Template<HtmlDocument>;

/// A runtime for [`HtmlDocument`] output.
pub type HtmlRuntime = Runtime<HtmlDocument>;

/// Parse and compile template source.
pub fn compile<D: Document>(source: &str) -> TemplateResult<Template<D>> {
    Template::compile(source)
}
