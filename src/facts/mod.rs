//! Fact definition contract, registry and resolution engine.
//!
//! A fact is a typed piece of discoverable remote-host state (installed
//! packages, kernel version, a file's metadata) obtained by running a
//! small command and parsing its output. This module defines the contract
//! every fact type implements ([`Fact`]), the derived-fact shape that
//! transforms another fact's data without issuing a command
//! ([`DerivedFact`]), the process-wide registry, deterministic cache
//! fingerprints, and the per-host resolution engine.

/// Built-in fact definitions.
pub mod builtin;

/// The fact resolution engine.
pub mod engine;

/// Deterministic cache fingerprints.
pub mod fingerprint;

/// The process-wide fact registry.
pub mod registry;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::sync::Arc;

use crate::error::Result;
use crate::template::ArgValue;

/// Call arguments for a fact, keyed by declared parameter name. Keys
/// prefixed with `_` are execution-argument overrides, not fact
/// parameters.
pub type FactArguments = IndexMap<String, ArgValue>;

/// Fact arguments after template rendering against a host.
pub type RenderedArguments = IndexMap<String, JsonValue>;

/// How a fact produces its remote command: a fixed string, or a builder
/// over the rendered call arguments.
pub enum FactCommand {
    /// A literal command string.
    Literal(Cow<'static, str>),
    /// A command built from the rendered arguments.
    Templated(fn(&RenderedArguments) -> Result<String>),
}

impl FactCommand {
    /// Resolve this command against rendered arguments.
    pub fn resolve(&self, arguments: &RenderedArguments) -> Result<String> {
        match self {
            FactCommand::Literal(command) => Ok(command.to_string()),
            FactCommand::Templated(build) => build(arguments),
        }
    }
}

impl From<&'static str> for FactCommand {
    fn from(command: &'static str) -> Self {
        FactCommand::Literal(Cow::Borrowed(command))
    }
}

/// A parameter a fact declares in its call signature.
#[derive(Debug, Clone)]
pub struct FactParam {
    /// Parameter name.
    pub name: &'static str,
    /// Default value; `None` makes the parameter required.
    pub default: Option<JsonValue>,
}

impl FactParam {
    /// A required parameter.
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }

    /// An optional parameter with a default.
    pub fn optional(name: &'static str, default: JsonValue) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }
}

/// The contract every command-backed fact type implements.
///
/// Definitions are stateless: one instance serves every host and every
/// call, so `default` must produce a fresh value each time rather than
/// hand out a shared one.
pub trait Fact: Send + Sync {
    /// Stable lowercase identifier, the registry key.
    fn name(&self) -> &'static str;

    /// The remote command that discovers this fact.
    fn command(&self) -> FactCommand;

    /// Optional probe: when present, the final command only runs the
    /// primary command if the probe binary exists, succeeding trivially
    /// with no output otherwise.
    fn requires_command(&self) -> Option<FactCommand> {
        None
    }

    /// Transport-specific shell override for this fact.
    fn shell_executable(&self) -> Option<&'static str> {
        None
    }

    /// Declared call parameters.
    fn params(&self) -> Vec<FactParam> {
        Vec::new()
    }

    /// The zero value for this fact, returned for empty or failed
    /// executions.
    fn default(&self) -> JsonValue {
        JsonValue::Null
    }

    /// Parse captured stdout lines into the fact's data shape.
    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        Ok(JsonValue::String(stdout.join("\n")))
    }
}

/// A fact computed purely by transforming another fact's resolved data.
/// Derived facts never issue their own command.
pub trait DerivedFact: Send + Sync {
    /// Stable lowercase identifier, the registry key.
    fn name(&self) -> &'static str;

    /// Identifier of the primary fact this one is derived from.
    fn source(&self) -> &'static str;

    /// Pure transform from the primary fact's data to this fact's data.
    fn transform(&self, data: JsonValue) -> JsonValue;
}

/// A resolvable reference to a registered fact definition.
#[derive(Clone)]
pub enum FactRef {
    /// A command-backed fact.
    Command(Arc<dyn Fact>),
    /// A derived fact.
    Derived(Arc<dyn DerivedFact>),
}

impl FactRef {
    /// The fact's identifier.
    pub fn name(&self) -> &'static str {
        match self {
            FactRef::Command(fact) => fact.name(),
            FactRef::Derived(fact) => fact.name(),
        }
    }

    /// The default value a failed resolution of this fact yields. For a
    /// derived fact this is the transform applied over the primary's
    /// default, or null if the primary is unknown.
    pub fn default_value(&self) -> JsonValue {
        match self {
            FactRef::Command(fact) => fact.default(),
            FactRef::Derived(fact) => match registry::registry().lookup(fact.source()) {
                Ok(FactRef::Command(primary)) => fact.transform(primary.default()),
                _ => JsonValue::Null,
            },
        }
    }
}

impl std::fmt::Debug for FactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactRef::Command(fact) => write!(f, "FactRef::Command({})", fact.name()),
            FactRef::Derived(fact) => write!(f, "FactRef::Derived({})", fact.name()),
        }
    }
}
