//! Argument-value model and host-context template rendering.
//!
//! Fact arguments may be literal values or deferred template strings that
//! only make sense once a concrete host is known (e.g. a path derived from
//! a host variable). [`render`] passes literals through unchanged and
//! evaluates templates against the host's context using a Jinja2-compatible
//! engine.

use minijinja::Environment;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::inventory::Host;

/// A fact argument value: either a concrete literal or a template string
/// resolved per host at fact-resolution time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A concrete value, passed through unchanged.
    Literal(JsonValue),
    /// A Jinja2 template rendered against the host context.
    Template(String),
}

impl ArgValue {
    /// Build a template argument.
    pub fn template(source: impl Into<String>) -> Self {
        Self::Template(source.into())
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Literal(JsonValue::String(value.to_string()))
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Literal(JsonValue::String(value))
    }
}

impl From<JsonValue> for ArgValue {
    fn from(value: JsonValue) -> Self {
        Self::Literal(value)
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Literal(v) => write!(f, "{}", v),
            ArgValue::Template(s) => write!(f, "{}", s),
        }
    }
}

/// Render one argument value against a host's context.
///
/// Literals pass through unchanged; templates render to strings.
pub fn render(host: &Host, value: &ArgValue) -> Result<JsonValue> {
    match value {
        ArgValue::Literal(v) => Ok(v.clone()),
        ArgValue::Template(source) => {
            let env = Environment::new();
            let rendered = env
                .render_str(source, host.template_context())
                .map_err(|e| Error::template_render(source.clone(), e.to_string()))?;
            Ok(JsonValue::String(rendered))
        }
    }
}
