//! SQL template rendering.
//!
//! Dialect templates carry named markers of the form `{{ .Table }}`.
//! Rendering substitutes precomputed strings for the markers and copies
//! everything else through untouched; the surrounding SQL is never parsed.

use std::fmt;

use crate::error::{BackendError, Result};

/// Named placeholder understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Table,
    Columns,
    Values,
    Conditions,
    Index,
    Unique,
    SelectValues,
    OnConditions,
    SetValues,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Table" => Placeholder::Table,
            "Columns" => Placeholder::Columns,
            "Values" => Placeholder::Values,
            "Conditions" => Placeholder::Conditions,
            "Index" => Placeholder::Index,
            "Unique" => Placeholder::Unique,
            "SelectValues" => Placeholder::SelectValues,
            "OnConditions" => Placeholder::OnConditions,
            "SetValues" => Placeholder::SetValues,
            _ => return None,
        })
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Values bound to placeholders for one rendering.
#[derive(Debug, Clone, Default)]
pub struct TemplateArgs {
    values: Vec<(Placeholder, String)>,
}

impl TemplateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a placeholder. A later binding replaces an earlier one.
    pub fn set(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(p, _)| *p == placeholder) {
            Some(slot) => slot.1 = value,
            None => self.values.push((placeholder, value)),
        }
        self
    }

    fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values
            .iter()
            .find(|(p, _)| *p == placeholder)
            .map(|(_, v)| v.as_str())
    }
}

/// Render `template`, replacing every `{{ .Name }}` marker.
///
/// Fails on an unterminated marker, an unknown placeholder name, or a
/// placeholder that has no bound value.
pub fn render(template: &str, args: &TemplateArgs) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            BackendError::Template(format!("unterminated placeholder in {:?}", template))
        })?;

        let marker = after[..end].trim();
        let name = marker.strip_prefix('.').ok_or_else(|| {
            BackendError::Template(format!("malformed placeholder {{{{ {} }}}}", marker))
        })?;
        let placeholder = Placeholder::parse(name.trim())
            .ok_or_else(|| BackendError::Template(format!("unknown placeholder {:?}", name)))?;
        let value = args
            .get(placeholder)
            .ok_or_else(|| BackendError::Template(format!("no value bound for {}", placeholder)))?;

        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}
