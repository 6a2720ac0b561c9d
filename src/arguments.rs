//! Execution-argument model and precedence merging.
//!
//! Execution arguments are the transport-affecting settings a fact command
//! runs under: timeout, privilege escalation, shell override, environment
//! and output-printing flags. They are assembled by merging three
//! precedence levels, most specific first:
//!
//! 1. request-local overrides (call kwargs prefixed with `_`)
//! 2. host-scoped overrides in effect for the current operation
//! 3. global configuration defaults
//!
//! Only keys in [`EXECUTION_ARGUMENT_KEYS`] are legal overrides in a fact
//! context; an explicitly requested key outside the allow-list is an
//! [`Error::InvalidExecutionArgument`], so caller intent is never silently
//! dropped.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::template::ArgValue;

/// Override keys valid in a fact-resolution context.
pub const EXECUTION_ARGUMENT_KEYS: &[&str] = &[
    "sudo",
    "sudo_user",
    "su_user",
    "shell_executable",
    "timeout",
    "env",
];

/// A bag of raw override values keyed by argument name (without the `_`
/// call prefix).
pub type ArgumentOverrides = IndexMap<String, JsonValue>;

/// Resolved transport-affecting settings for one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionArguments {
    /// Command timeout in seconds.
    pub timeout: u64,
    /// Run the command under sudo.
    pub sudo: bool,
    /// User to sudo to (implies `sudo`).
    pub sudo_user: Option<String>,
    /// User to su to.
    pub su_user: Option<String>,
    /// Shell used to execute the command; `None` means the transport
    /// default (`sh`).
    pub shell_executable: Option<String>,
    /// Extra environment variables for the command.
    pub env: IndexMap<String, String>,
    /// Stream captured output live as it arrives.
    pub print_output: bool,
    /// Print the command before executing it.
    pub print_input: bool,
}

impl ExecutionArguments {
    /// Build execution arguments from global configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.timeout,
            sudo: config.sudo,
            sudo_user: config.sudo_user.clone(),
            su_user: config.su_user.clone(),
            shell_executable: config.shell_executable.clone(),
            env: IndexMap::new(),
            print_output: false,
            print_input: false,
        }
    }

    /// Apply one override value onto this set. The key must already have
    /// passed the allow-list; values of the wrong shape are configuration
    /// errors.
    fn apply(&mut self, key: &str, value: &JsonValue) -> Result<()> {
        match key {
            "timeout" => {
                self.timeout = value
                    .as_u64()
                    .ok_or_else(|| bad_value(key, "a positive integer"))?;
            }
            "sudo" => {
                self.sudo = value.as_bool().ok_or_else(|| bad_value(key, "a boolean"))?;
            }
            "sudo_user" => {
                self.sudo_user = as_opt_string(key, value)?;
            }
            "su_user" => {
                self.su_user = as_opt_string(key, value)?;
            }
            "shell_executable" => {
                self.shell_executable = as_opt_string(key, value)?;
            }
            "env" => {
                let map = value
                    .as_object()
                    .ok_or_else(|| bad_value(key, "a string map"))?;
                for (k, v) in map {
                    let v = v.as_str().ok_or_else(|| bad_value(key, "a string map"))?;
                    self.env.insert(k.clone(), v.to_string());
                }
            }
            _ => unreachable!("override key not in allow-list: {key}"),
        }
        Ok(())
    }

    /// Deterministic serialisation of the execution-relevant subset, used
    /// as a fingerprint component. Print flags are display-only and
    /// excluded.
    pub fn cache_key(&self) -> String {
        let mut env: Vec<_> = self.env.iter().collect();
        env.sort_by_key(|(k, _)| k.as_str());
        format!(
            "timeout={};sudo={};sudo_user={:?};su_user={:?};shell={:?};env={:?}",
            self.timeout, self.sudo, self.sudo_user, self.su_user, self.shell_executable, env,
        )
    }
}

fn bad_value(key: &str, expected: &str) -> Error {
    Error::Config(format!("execution argument `{key}` must be {expected}"))
}

fn as_opt_string(key: &str, value: &JsonValue) -> Result<Option<String>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s.clone())),
        _ => Err(bad_value(key, "a string or null")),
    }
}

/// Pop `_`-prefixed override arguments out of a fact call's kwargs.
///
/// Returns the overrides (key without the prefix) and the list of keys the
/// caller explicitly requested, which [`merge_execution_arguments`]
/// validates against the allow-list. Override values must be literals;
/// deferred template values are not resolvable this early.
pub fn split_override_arguments(
    kwargs: &mut IndexMap<String, ArgValue>,
) -> Result<(ArgumentOverrides, Vec<String>)> {
    let override_keys: Vec<String> = kwargs
        .keys()
        .filter(|k| k.starts_with('_'))
        .cloned()
        .collect();

    let mut overrides = ArgumentOverrides::new();
    let mut explicit_keys = Vec::with_capacity(override_keys.len());

    for key in override_keys {
        let Some(value) = kwargs.shift_remove(&key) else {
            continue;
        };
        let name = key.trim_start_matches('_').to_string();
        let value = match value {
            ArgValue::Literal(v) => v,
            ArgValue::Template(_) => {
                return Err(Error::Config(format!(
                    "execution argument `{name}` cannot be a template value"
                )));
            }
        };
        explicit_keys.push(name.clone());
        overrides.insert(name, value);
    }

    Ok((overrides, explicit_keys))
}

/// Merge override arguments with host-scoped overrides and configuration
/// defaults, most specific wins.
///
/// Host-scope keys outside the allow-list (e.g. `ignore_errors`) are
/// silently dropped here, they are read elsewhere; explicitly requested
/// keys outside the allow-list raise [`Error::InvalidExecutionArgument`].
pub fn merge_execution_arguments(
    config: &Config,
    host_scope: Option<&ArgumentOverrides>,
    overrides: &ArgumentOverrides,
    explicit_keys: &[String],
) -> Result<ExecutionArguments> {
    for key in explicit_keys {
        if !EXECUTION_ARGUMENT_KEYS.contains(&key.as_str()) {
            return Err(Error::InvalidExecutionArgument(key.clone()));
        }
    }

    // Apply host-scoped values that weren't explicitly overridden.
    let mut combined = overrides.clone();
    if let Some(scope) = host_scope {
        for (key, value) in scope {
            if !combined.contains_key(key) {
                combined.insert(key.clone(), value.clone());
            }
        }
    }

    let mut arguments = ExecutionArguments::from_config(config);
    for (key, value) in &combined {
        if EXECUTION_ARGUMENT_KEYS.contains(&key.as_str()) {
            arguments.apply(key, value)?;
        }
    }

    Ok(arguments)
}
