/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use thiserror::Error;

/// Error type returned by helpers and resolution hooks.
///
/// Anything a helper fails with is carried through rendering untouched, wrapped
/// in [`TemplateError::ResolutionError`] together with the name of the callee.
pub type HelperError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template source. Raised at compile time only.
    #[error("Parse error at {line}:{column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// A helper or resolution hook failed while rendering.
    #[error("Resolution error in '{name}': {source}")]
    ResolutionError {
        name: String,
        #[source]
        source: HelperError,
    },

    /// A [`Document`](crate::Document) refused to parse an unescaped value.
    ///
    /// [`HtmlDocument`](crate::HtmlDocument) recovers from malformed markup
    /// and never raises this.
    #[error("Markup error: {message}")]
    MarkupError { message: String },
}

impl TemplateError {
    /// Build a parse error located at `offset` within `source`.
    pub fn parse_at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        TemplateError::ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn resolution(name: impl Into<String>, source: HelperError) -> Self {
        TemplateError::ResolutionError {
            name: name.into(),
            source,
        }
    }
}

/// 1-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
