/*
 * binding.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Update records for data-bound output.
//!
//! A [`Binding`] remembers which rendered node(s) show which context path.
//! Helpers and resolution hooks create them while rendering; the runtime hands
//! them back to the host in [`crate::Rendered`] and never stores or schedules
//! them. Calling [`Binding::update`] after mutating the [`Context`] patches the
//! tree in place instead of re-rendering it.

use std::fmt;

use crate::dom::Document;
use crate::error::{HelperError, TemplateError, TemplateResult};
use crate::value::Context;

/// Closure type for [`BindingTarget::Computed`].
pub type ComputeFn<D> = Box<dyn FnMut(&D, &Context) -> Result<(), HelperError>>;

/// The output a binding is responsible for.
pub enum BindingTarget<D: Document> {
    /// A text node whose value is the rendered context value.
    Text(D::Node),

    /// A run of sibling nodes parsed from the context value as markup.
    Fragment { first: D::Node, last: D::Node },

    /// One attribute of an element.
    Attribute { element: D::Node, name: String },

    /// Arbitrary update logic supplied by a helper.
    Computed(ComputeFn<D>),
}

/// A data binding between a context path and rendered output.
pub struct Binding<D: Document> {
    path: Vec<String>,
    target: BindingTarget<D>,
}

impl<D: Document> Binding<D> {
    /// Bind a text node to `path`.
    pub fn text(node: D::Node, path: impl Into<Vec<String>>) -> Self {
        Self {
            path: path.into(),
            target: BindingTarget::Text(node),
        }
    }

    /// Bind the contents of `fragment` to `path`.
    ///
    /// Must be called before the fragment is inserted into the tree, since
    /// insertion empties it. An empty fragment gets an empty text node so the
    /// binding has a position to update.
    pub fn fragment(document: &D, fragment: &D::Node, path: impl Into<Vec<String>>) -> Self {
        let (first, last) = fragment_bounds(document, fragment);
        Self {
            path: path.into(),
            target: BindingTarget::Fragment { first, last },
        }
    }

    /// Bind attribute `name` of `element` to `path`.
    pub fn attribute(
        element: D::Node,
        name: impl Into<String>,
        path: impl Into<Vec<String>>,
    ) -> Self {
        Self {
            path: path.into(),
            target: BindingTarget::Attribute {
                element,
                name: name.into(),
            },
        }
    }

    /// Bind custom update logic.
    pub fn computed<F>(path: impl Into<Vec<String>>, update: F) -> Self
    where
        F: FnMut(&D, &Context) -> Result<(), HelperError> + 'static,
    {
        Self {
            path: path.into(),
            target: BindingTarget::Computed(Box::new(update)),
        }
    }

    /// The context path this binding reads.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn target(&self) -> &BindingTarget<D> {
        &self.target
    }

    /// Re-read the context and patch the bound output in place.
    ///
    /// A fragment binding whose nodes were removed from the tree is a no-op.
    pub fn update(&mut self, document: &D, context: &Context) -> TemplateResult<()> {
        match &mut self.target {
            BindingTarget::Text(node) => {
                document.set_text(node, &context.get_path(&self.path).render());
            }
            BindingTarget::Attribute { element, name } => {
                document.set_attribute(element, name, &context.get_path(&self.path).render());
            }
            BindingTarget::Fragment { first, last } => {
                let Some(parent) = document.parent(first) else {
                    tracing::debug!(
                        path = ?self.path,
                        "fragment binding is detached; skipping update"
                    );
                    return Ok(());
                };
                let markup = context.get_path(&self.path).render();
                let fragment = document.parse_fragment(&parent, &markup)?;
                let (new_first, new_last) = fragment_bounds(document, &fragment);
                let reference = document.next_sibling(last);

                let mut cursor = Some(first.clone());
                while let Some(node) = cursor {
                    let next = document.next_sibling(&node);
                    let done = node == *last;
                    document.remove_child(&parent, &node);
                    if done {
                        break;
                    }
                    cursor = next;
                }

                document.insert_before(&parent, &fragment, reference.as_ref());
                *first = new_first;
                *last = new_last;
            }
            BindingTarget::Computed(update) => {
                update(document, context).map_err(|err| TemplateError::resolution("binding", err))?;
            }
        }
        Ok(())
    }
}

/// First and last child of a fragment, adding a placeholder when it is empty.
fn fragment_bounds<D: Document>(document: &D, fragment: &D::Node) -> (D::Node, D::Node) {
    match document.first_child(fragment) {
        Some(first) => {
            let last = document
                .last_child(fragment)
                .unwrap_or_else(|| first.clone());
            (first, last)
        }
        None => {
            let placeholder = document.create_text("");
            document.append_child(fragment, &placeholder);
            (placeholder.clone(), placeholder)
        }
    }
}

impl<D: Document> fmt::Debug for Binding<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            BindingTarget::Text(node) => format!("Text({:?})", node),
            BindingTarget::Fragment { first, last } => format!("Fragment({:?}..{:?})", first, last),
            BindingTarget::Attribute { element, name } => {
                format!("Attribute({:?}, {})", element, name)
            }
            BindingTarget::Computed(_) => "Computed".to_string(),
        };
        f.debug_struct("Binding")
            .field("path", &self.path)
            .field("target", &target)
            .finish()
    }
}
