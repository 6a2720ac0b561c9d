//! Shared test utilities and fixtures for the Rustinfra test suite.
//!
//! Provides a scripted [`MockConnection`] transport (canned per-command
//! results, invocation recording, optional artificial latency), state and
//! inventory builders, and the fact definitions the integration tests
//! resolve against.
//!
//! Include this module in your integration tests:
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use rustinfra::prelude::*;

// ============================================================================
// Scripted transport
// ============================================================================

/// A canned transport response.
#[derive(Clone)]
pub enum Scripted {
    /// Return this command output.
    Output(CommandOutput),
    /// Raise a transport timeout.
    Timeout(u64),
    /// Raise a connection failure.
    ConnectionFailed(String),
}

impl Scripted {
    fn to_result(&self) -> ConnectionResult<CommandOutput> {
        match self {
            Scripted::Output(output) => Ok(output.clone()),
            Scripted::Timeout(secs) => Err(ConnectionError::Timeout(*secs)),
            Scripted::ConnectionFailed(message) => {
                Err(ConnectionError::ConnectionFailed(message.clone()))
            }
        }
    }
}

/// A scripted in-memory transport.
///
/// Commands are matched by substring against scripted entries in
/// registration order; unmatched commands get the fallback response
/// (successful, no output, unless overridden). Every invocation is
/// recorded along with the execution arguments it ran under.
pub struct MockConnection {
    identifier: String,
    scripted: Vec<(String, Scripted)>,
    fallback: Scripted,
    calls: Mutex<Vec<(String, ExecutionArguments)>>,
    delay: Option<Duration>,
}

impl MockConnection {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            scripted: Vec::new(),
            fallback: Scripted::Output(CommandOutput::success(vec![])),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Script a response for commands containing `needle`.
    pub fn on(mut self, needle: impl Into<String>, response: Scripted) -> Self {
        self.scripted.push((needle.into(), response));
        self
    }

    /// Set the response for unmatched commands.
    pub fn fallback(mut self, response: Scripted) -> Self {
        self.fallback = response;
        self
    }

    /// Add artificial latency to every command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Commands executed so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// The execution arguments of the most recent call.
    pub fn last_arguments(&self) -> Option<ExecutionArguments> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, arguments)| arguments.clone())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn run_command(
        &self,
        command: &str,
        arguments: &ExecutionArguments,
    ) -> ConnectionResult<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), arguments.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .scripted
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, response)| response)
            .unwrap_or(&self.fallback);

        response.to_result()
    }
}

/// Command output made of stdout lines.
pub fn stdout_output(lines: &[&str]) -> CommandOutput {
    CommandOutput::success(
        lines
            .iter()
            .map(|line| (OutputStream::Stdout, line.to_string()))
            .collect(),
    )
}

/// Failed command output made of stderr lines.
pub fn stderr_failure(lines: &[&str]) -> CommandOutput {
    CommandOutput::failure(
        lines
            .iter()
            .map(|line| (OutputStream::Stderr, line.to_string()))
            .collect(),
    )
}

// ============================================================================
// State builders
// ============================================================================

/// Build run state over hosts backed by the given transports.
pub fn state_with_hosts(hosts: Vec<(&str, Arc<MockConnection>)>) -> State {
    state_with_hosts_and_config(hosts, Config::default())
}

pub fn state_with_hosts_and_config(
    hosts: Vec<(&str, Arc<MockConnection>)>,
    config: Config,
) -> State {
    let mut inventory = Inventory::new();
    for (name, connection) in hosts {
        inventory.add_host(Host::new(name, connection));
    }
    State::new(config, inventory)
}

// ============================================================================
// Test facts
// ============================================================================

/// Register a fact, tolerating it already being registered by an earlier
/// test in the same process.
pub fn ensure_registered<F: Fact + 'static>(fact: F) {
    match registry().register(fact) {
        Ok(()) | Err(Error::DuplicateFact(_)) => {}
        Err(err) => panic!("registration failed: {err}"),
    }
}

pub fn ensure_registered_derived<F: DerivedFact + 'static>(fact: F) {
    match registry().register_derived(fact) {
        Ok(()) | Err(Error::DuplicateFact(_)) => {}
        Err(err) => panic!("registration failed: {err}"),
    }
}

/// A list-shaped fact: one array entry per stdout line.
pub struct ServiceList;

impl Fact for ServiceList {
    fn name(&self) -> &'static str {
        "service_list"
    }

    fn command(&self) -> FactCommand {
        "list-services".into()
    }

    fn default(&self) -> JsonValue {
        json!([])
    }

    fn parse(&self, stdout: &[String]) -> rustinfra::error::Result<JsonValue> {
        Ok(json!(stdout))
    }
}

/// Number of services, derived from [`ServiceList`].
pub struct ServiceCount;

impl DerivedFact for ServiceCount {
    fn name(&self) -> &'static str {
        "service_count"
    }

    fn source(&self) -> &'static str {
        "service_list"
    }

    fn transform(&self, data: JsonValue) -> JsonValue {
        json!(data.as_array().map(|list| list.len()).unwrap_or(0))
    }
}
