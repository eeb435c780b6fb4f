/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Compiles a template, renders it into an in-memory HTML document against a
//! JSON context and writes the serialized result. No helpers or resolution
//! hooks are registered, so every mustache resolves against the context.

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use quarto_htmlbars::{Context, HtmlDocument, HtmlRuntime, HtmlTemplate};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Template file, or `-` for stdin
    pub template: String,
    /// JSON context file
    pub data: Option<String>,
    /// Output file; stdout when absent
    pub output: Option<String>,
    /// Skip the surrounding HTML page
    pub fragment_only: bool,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let source = super::read_input(&args.template)?;
    let data: serde_json::Value = match &args.data {
        Some(path) => {
            let text = super::read_input(path)?;
            serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path))?
        }
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    let html = render_to_string(&source, data, args.fragment_only)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &html).with_context(|| format!("Failed to write {}", path))?;
            info!("Wrote {}", path);
        }
        None => print!("{}", html),
    }
    Ok(())
}

/// Render `source` against `data` and serialize the output.
pub fn render_to_string(
    source: &str,
    data: serde_json::Value,
    fragment_only: bool,
) -> Result<String> {
    let template = HtmlTemplate::compile(source).context("Failed to compile template")?;
    let document = HtmlDocument::new();
    let context = Context::from_json(data);
    let rendered = template
        .render(&HtmlRuntime::new(), &document, &context)
        .context("Failed to render template")?;

    let body = rendered.fragment.inner_html();
    debug!(bytes = body.len(), "rendered template");

    if fragment_only {
        return Ok(body);
    }
    Ok(format!(
        concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n",
            "<body>\n{}\n</body>\n</html>\n"
        ),
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_render_fragment_only() {
        let html = render_to_string(
            r#"<a href="{{url}}">{{title}}</a>"#,
            json!({"url": "a.html", "title": "<A>"}),
            true,
        )
        .unwrap();
        assert_eq!(html, r#"<a href="a.html">&lt;A&gt;</a>"#);
    }

    #[test]
    fn test_render_full_page() {
        let html = render_to_string("<p>{{x}}</p>", json!({"x": 1}), false).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>\n"));
        assert!(html.contains("<body>\n<p>1</p>\n</body>"));
    }

    #[test]
    fn test_render_reports_compile_errors() {
        let err = render_to_string("<p>", json!({}), true).unwrap_err();
        assert_eq!(err.to_string(), "Failed to compile template");
        assert!(format!("{:#}", err).contains("unclosed element <p>"));
    }

    #[test]
    fn test_execute_writes_output_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("page.hbs");
        let data = dir.path().join("data.json");
        let output = dir.path().join("out.html");
        std::fs::write(&template, "<h1>{{site.name}}</h1>").unwrap();
        std::fs::write(&data, r#"{"site": {"name": "Docs"}}"#).unwrap();

        execute(RenderArgs {
            template: template.display().to_string(),
            data: Some(data.display().to_string()),
            output: Some(output.display().to_string()),
            fragment_only: true,
        })
        .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "<h1>Docs</h1>");
    }

    #[test]
    fn test_execute_rejects_invalid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("page.hbs");
        let data = dir.path().join("data.json");
        std::fs::write(&template, "x").unwrap();
        std::fs::write(&data, "{not json").unwrap();

        let err = execute(RenderArgs {
            template: template.display().to_string(),
            data: Some(data.display().to_string()),
            output: None,
            fragment_only: true,
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON in "));
    }
}
