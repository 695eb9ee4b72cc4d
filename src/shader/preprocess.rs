//! Shader source preprocessing: recursive `#include` expansion and
//! `#sub IDENTIFIER text` textual substitution.

use crate::error::{CompilerError, Result};
use std::path::Path;

/// Include recursion cap; deeper nesting is treated as a cycle.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Expand includes relative to `folder`, collect and strip `#sub`
/// definitions, then apply every substitution to the expanded text.
pub fn preprocess(source: &str, folder: &Path) -> Result<String> {
    let expanded = expand_includes(source, folder, 0)?;

    let mut substitutions: Vec<(String, String)> = Vec::new();
    let mut body = String::with_capacity(expanded.len());
    for line in expanded.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("#sub ") {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let identifier = parts.next().unwrap_or("").to_string();
            if identifier.is_empty() {
                return Err(CompilerError::ShaderPreprocess(
                    "#sub without an identifier".to_string(),
                ));
            }
            let text = parts.next().unwrap_or("").trim().to_string();
            substitutions.push((identifier, text));
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }

    for (identifier, text) in &substitutions {
        body = body.replace(identifier.as_str(), text);
    }
    Ok(body)
}

fn expand_includes(source: &str, folder: &Path, depth: usize) -> Result<String> {
    if depth >= MAX_INCLUDE_DEPTH {
        return Err(CompilerError::ShaderPreprocess(format!(
            "include nesting exceeds {MAX_INCLUDE_DEPTH} levels (possible cycle)"
        )));
    }

    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("#include") {
            let path = rest
                .trim()
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .ok_or_else(|| {
                    CompilerError::ShaderPreprocess(format!(
                        "malformed include directive: '{line}'"
                    ))
                })?;
            let full = folder.join(path);
            let included = std::fs::read_to_string(&full).map_err(|e| {
                CompilerError::ShaderPreprocess(format!(
                    "cannot read include '{}': {e}",
                    full.display()
                ))
            })?;
            let nested_folder = full.parent().unwrap_or(folder);
            out.push_str(&expand_includes(&included, nested_folder, depth + 1)?);
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}
