//! The per-host fact resolution engine.
//!
//! Resolution is cache-gated and single-flight per host: the host's fact
//! lock is held from cache check through command execution to cache
//! write-back, so one fingerprint never runs its command twice and no two
//! fact commands ever run concurrently against the same host. Transport
//! failures are recovered locally into failed executions; a true failure
//! yields the fact's default value and, unless errors are being ignored,
//! marks the host as failed for the rest of the run.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::arguments::{
    merge_execution_arguments, split_override_arguments, ArgumentOverrides,
};
use crate::connection::{split_combined_output, ConnectionError, OutputLine};
use crate::error::{Error, Result};
use crate::facts::fingerprint::{fingerprint, Fingerprint};
use crate::facts::registry::registry;
use crate::facts::{Fact, FactArguments, FactRef, RenderedArguments};
use crate::inventory::Host;
use crate::output::{log_error_or_warning, print_host_output};
use crate::state::State;
use crate::template;

// Privilege-escalation "target user does not exist" patterns, matched as
// anchors against the FIRST stderr line only. The wording is the remote
// shell's and is not localisation-independent; a real failure whose first
// line happens to match is treated as benign. Callers rely on this
// matching scope, so it stays first-line-only.
static SUDO_UNKNOWN_USER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sudo: unknown user:").unwrap());
static SU_UNKNOWN_USER: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^su: user .+ does not exist").unwrap(),
        Regex::new(r"^su: unknown login").unwrap(),
    ]
});

/// Resolve a fact for one host.
///
/// With a fingerprint, the host cache is consulted first and updated
/// afterwards, both under the host's fact lock. Errors are caller errors
/// (unknown fact, bad arguments, unparseable output); a command that
/// fails remotely is not an error here, it resolves to the fact's default
/// value and flags the host unless `apply_failed_hosts` is false or
/// errors are being ignored.
pub async fn get_fact(
    state: &State,
    host: &Arc<Host>,
    fact: &FactRef,
    kwargs: Option<FactArguments>,
    fact_hash: Option<Fingerprint>,
    apply_failed_hosts: bool,
) -> Result<JsonValue> {
    match fact {
        FactRef::Command(fact) => {
            get_command_fact(state, host, fact, kwargs, fact_hash, apply_failed_hosts).await
        }
        FactRef::Derived(derived) => {
            // A derived fact resolves its primary (cached under the
            // primary's fingerprint) and maps the transform; the supplied
            // fingerprint is not used since no command runs for it.
            let FactRef::Command(primary) = registry().lookup(derived.source())? else {
                return Err(Error::Config(format!(
                    "derived fact '{}' must derive from a command-backed fact, \
                     but '{}' is itself derived",
                    derived.name(),
                    derived.source(),
                )));
            };
            let hash = host_fact_fingerprint(state, host, derived.source(), kwargs.as_ref())?;
            let data =
                get_command_fact(state, host, &primary, kwargs, Some(hash), apply_failed_hosts)
                    .await?;
            Ok(derived.transform(data))
        }
    }
}

/// Resolve a fact by registered name with the canonical fingerprint, the
/// cached entry point callers normally use.
pub async fn get_host_fact(
    state: &State,
    host: &Arc<Host>,
    name: &str,
    kwargs: Option<FactArguments>,
) -> Result<JsonValue> {
    let fact = registry().lookup(name)?;
    let hash = host_fact_fingerprint(state, host, name, kwargs.as_ref())?;
    get_fact(state, host, &fact, kwargs, Some(hash), true).await
}

/// Inject fact data directly into a host's cache, bypassing execution.
/// Useful for test fixtures and synthetic facts.
pub async fn create_host_fact(
    state: &State,
    host: &Arc<Host>,
    name: &str,
    data: JsonValue,
    kwargs: Option<FactArguments>,
) -> Result<()> {
    let hash = host_fact_fingerprint(state, host, name, kwargs.as_ref())?;
    host.fact_cache().lock().await.insert(hash, data);
    Ok(())
}

/// Evict a fact entry from a host's cache; absent entries are not an
/// error.
pub async fn delete_host_fact(
    state: &State,
    host: &Arc<Host>,
    name: &str,
    kwargs: Option<FactArguments>,
) -> Result<()> {
    let hash = host_fact_fingerprint(state, host, name, kwargs.as_ref())?;
    host.fact_cache().lock().await.remove(&hash);
    Ok(())
}

/// The canonical fingerprint for a fact request against a host: fact
/// name, arguments as passed, and the execution-relevant settings
/// currently in scope for the host.
pub fn host_fact_fingerprint(
    state: &State,
    host: &Arc<Host>,
    name: &str,
    kwargs: Option<&FactArguments>,
) -> Result<Fingerprint> {
    let arguments = merge_execution_arguments(
        state.config(),
        host.op_arguments().as_ref(),
        &ArgumentOverrides::new(),
        &[],
    )?;
    Ok(fingerprint(name, kwargs, &arguments))
}

async fn get_command_fact(
    state: &State,
    host: &Arc<Host>,
    fact: &Arc<dyn Fact>,
    kwargs: Option<FactArguments>,
    fact_hash: Option<Fingerprint>,
    apply_failed_hosts: bool,
) -> Result<JsonValue> {
    // Held across execution: serialises all fact resolution on this host
    // and makes cache-check-then-execute race-free.
    let mut cache = host.fact_cache().lock().await;

    if let Some(hash) = &fact_hash {
        if let Some(data) = cache.get(hash) {
            debug!(host = %host.name(), fact = fact.name(), "fact cache hit");
            return Ok(data.clone());
        }
    }

    let data = resolve_fact(state, host, fact, kwargs, apply_failed_hosts).await?;

    if let Some(hash) = fact_hash {
        cache.insert(hash, data.clone());
    }
    Ok(data)
}

async fn resolve_fact(
    state: &State,
    host: &Arc<Host>,
    fact: &Arc<dyn Fact>,
    kwargs: Option<FactArguments>,
    apply_failed_hosts: bool,
) -> Result<JsonValue> {
    let name = fact.name();
    let mut kwargs = kwargs.unwrap_or_default();

    // Overrides passed with the call take precedence over host-scoped
    // ones; only execution-affecting keys are legal here.
    let (overrides, explicit_keys) = split_override_arguments(&mut kwargs)?;
    let host_scope = host.op_arguments();
    let mut executor_arguments = merge_execution_arguments(
        state.config(),
        host_scope.as_ref(),
        &overrides,
        &explicit_keys,
    )?;

    let kwargs = canonicalize_arguments(fact.as_ref(), kwargs)?;

    debug!(
        host = %host.name(),
        fact = name,
        args = %format_arguments(&kwargs),
        "getting fact"
    );

    let ignore_errors = host_scope
        .as_ref()
        .and_then(|scope| scope.get("ignore_errors"))
        .and_then(|v| v.as_bool())
        .unwrap_or(state.config().ignore_errors);

    // Facts can override the shell (e.g. powershell vs cmd transports).
    if let Some(shell) = fact.shell_executable() {
        executor_arguments.shell_executable = Some(shell.to_string());
    }
    executor_arguments.print_output = state.print_fact_output;
    executor_arguments.print_input = state.print_fact_input;

    let rendered = render_arguments(host, &kwargs)?;
    let command = build_fact_command(fact.as_ref(), &rendered)?;

    let mut status = false;
    let mut combined_output: Vec<OutputLine> = Vec::new();

    match host
        .connection()
        .run_command(&command, &executor_arguments)
        .await
    {
        Ok(output) => {
            status = output.success;
            combined_output = output.lines;
        }
        Err(err) => log_host_command_error(host, &err, executor_arguments.timeout),
    }

    let (stdout, stderr) = split_combined_output(&combined_output);

    let mut data = fact.default();

    if status {
        if !stdout.is_empty() {
            data = fact.parse(&stdout)?;
        }
    } else if let Some(first_line) = stderr.first() {
        // If the error is sudo or su stating the target user does not
        // exist, do not fail but return the default fact value: the user
        // this fact depends on may be created by a later operation.
        if executor_arguments.sudo_user.is_some() && SUDO_UNKNOWN_USER.is_match(first_line) {
            status = true;
        }
        if executor_arguments.su_user.is_some()
            && SU_UNKNOWN_USER.iter().any(|re| re.is_match(first_line))
        {
            status = true;
        }
    }

    if status {
        if state.print_fact_info {
            info!(
                host = %host.name(),
                "loaded fact {} ({})",
                name,
                format_arguments(&kwargs)
            );
        } else {
            debug!(
                host = %host.name(),
                "loaded fact {} ({})",
                name,
                format_arguments(&kwargs)
            );
        }
    } else {
        if !executor_arguments.print_output {
            print_host_output(host, &combined_output);
        }
        log_error_or_warning(
            host,
            ignore_errors,
            &format!("could not load fact: {} {}", name, format_arguments(&kwargs)),
        );

        if !ignore_errors && apply_failed_hosts {
            state.fail_hosts([host]);
        }
    }

    Ok(data)
}

/// Merge call arguments with the fact's declared parameter signature:
/// missing parameters fall back to declared defaults, unknown parameters
/// are a caller error.
fn canonicalize_arguments(fact: &dyn Fact, mut kwargs: FactArguments) -> Result<FactArguments> {
    let params = fact.params();

    if let Some(unknown) = kwargs
        .keys()
        .find(|key| !params.iter().any(|p| p.name == key.as_str()))
    {
        return Err(Error::UnknownFactParameter {
            fact: fact.name().to_string(),
            param: unknown.clone(),
        });
    }

    let mut canonical = FactArguments::new();
    for param in params {
        if let Some(value) = kwargs.shift_remove(param.name) {
            canonical.insert(param.name.to_string(), value);
        } else if let Some(default) = param.default {
            canonical.insert(
                param.name.to_string(),
                crate::template::ArgValue::Literal(default),
            );
        } else {
            return Err(Error::MissingFactParameter {
                fact: fact.name().to_string(),
                param: param.name.to_string(),
            });
        }
    }
    Ok(canonical)
}

fn render_arguments(host: &Host, kwargs: &FactArguments) -> Result<RenderedArguments> {
    kwargs
        .iter()
        .map(|(key, value)| Ok((key.clone(), template::render(host, value)?)))
        .collect()
}

/// Build the final remote command, wrapping with the `requires_command`
/// probe when one is declared and renders non-empty: probe binary absent,
/// succeed with no output; probe present, run the fact command.
fn build_fact_command(fact: &dyn Fact, rendered: &RenderedArguments) -> Result<String> {
    let mut command = fact.command().resolve(rendered)?;

    if let Some(probe) = fact.requires_command() {
        let probe = probe.resolve(rendered)?;
        if !probe.trim().is_empty() {
            command = format!("! command -v {} >/dev/null || {}", probe, command);
        }
    }

    Ok(command)
}

fn log_host_command_error(host: &Arc<Host>, err: &ConnectionError, timeout: u64) {
    match err {
        ConnectionError::Timeout(_) => {
            warn!(
                host = %host.name(),
                timeout,
                "command timed out, treating as failed execution"
            );
        }
        ConnectionError::ConnectionFailed(message) => {
            warn!(
                host = %host.name(),
                timeout,
                "could not connect: {message}"
            );
        }
        ConnectionError::Protocol(message) => {
            warn!(
                host = %host.name(),
                timeout,
                "transport protocol error: {message}"
            );
        }
    }
}

fn format_arguments(kwargs: &FactArguments) -> String {
    kwargs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}
