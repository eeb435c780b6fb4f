//! Command implementations for the htmlbars CLI

pub mod parse;
pub mod render;

use std::io::Read;

use anyhow::{Context, Result};

/// Read a template or data file; `-` reads stdin.
pub fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
}
