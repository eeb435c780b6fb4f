/*
 * parse.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Parse command: print a template's syntax tree.

use anyhow::Result;
use tracing::debug;

use quarto_htmlbars::parse;

pub fn execute(template: &str) -> Result<()> {
    let source = super::read_input(template)?;
    println!("{}", ast_json(&source)?);
    Ok(())
}

/// Parse `source` and serialize the node list as pretty-printed JSON.
pub fn ast_json(source: &str) -> Result<String> {
    let nodes = parse(source)?;
    debug!(nodes = nodes.len(), "parsed template");
    Ok(serde_json::to_string_pretty(&nodes)?)
}
