//! Named prompt and specialist templates.
//!
//! Templates live in one YAML document (see `configs/messages.yaml`) and use
//! `{placeholder}` markers filled in at render time. The document is loaded
//! once per process invocation.

use crate::error::{Error, Result};
use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;

/// The template document: template name -> template text.
#[derive(Debug, Clone)]
pub struct Templates {
    templates: HashMap<String, String>,
}

impl Templates {
    /// Load the YAML template document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read message config {}", path.display()))
            .map_err(Error::config)?;
        let templates: HashMap<String, String> = serde_yaml::from_str(&text)
            .with_context(|| format!("invalid message config {}", path.display()))
            .map_err(Error::config)?;
        Ok(Self { templates })
    }

    /// Build a template set directly from name/text pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            templates: pairs.into_iter().collect(),
        }
    }

    /// Look up a template by name. Absence is a configuration error.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingTemplate {
                name: name.to_string(),
            })
    }

    /// Render the named template, substituting each supplied `{key}`.
    /// Placeholders without a supplied value are left untouched.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let mut text = self.get(name)?.to_string();
        for (key, value) in vars {
            text = text.replace(&format!("{{{key}}}"), value);
        }
        Ok(text)
    }
}
