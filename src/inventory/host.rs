//! Host definition for the Rustinfra inventory.
//!
//! A [`Host`] is one managed remote target. Beyond its connection handle
//! and template variables it owns the two pieces of state the fact engine
//! relies on: the fact cache (fingerprint -> data) and the lock that
//! serialises all fact resolutions against this host. The lock is held
//! across command execution, so two concurrent requests for the same fact
//! never run the command twice, and different hosts never contend.

use indexmap::IndexMap;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::arguments::ArgumentOverrides;
use crate::connection::Connection;
use crate::facts::fingerprint::Fingerprint;

/// A managed host in the inventory.
pub struct Host {
    /// Host name (can be hostname, IP, or alias)
    name: String,

    /// Actual hostname or IP to connect to (if different from name)
    address: Option<String>,

    /// Host variables, available to argument templates
    vars: IndexMap<String, JsonValue>,

    /// Transport used to run commands on this host
    connection: Arc<dyn Connection>,

    /// Fact cache, guarded by the per-host fact lock. Holding the guard
    /// across execution is what gives single-flight per fingerprint.
    facts: Mutex<HashMap<Fingerprint, JsonValue>>,

    /// Execution-argument overrides scoped to the operation currently in
    /// effect for this host, if any.
    current_op_arguments: parking_lot::RwLock<Option<ArgumentOverrides>>,
}

impl Host {
    /// Create a new host with the given name and transport.
    pub fn new(name: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        Self {
            name: name.into(),
            address: None,
            vars: IndexMap::new(),
            connection,
            facts: Mutex::new(HashMap::new()),
            current_op_arguments: parking_lot::RwLock::new(None),
        }
    }

    /// Create a new host with an explicit address.
    pub fn with_address(
        name: impl Into<String>,
        address: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        let mut host = Self::new(name, connection);
        host.address = Some(address.into());
        host
    }

    /// Host name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actual address to connect to.
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }

    /// The transport for this host.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Set a host variable.
    pub fn set_var(&mut self, key: impl Into<String>, value: JsonValue) {
        self.vars.insert(key.into(), value);
    }

    /// Get a host variable.
    pub fn get_var(&self, key: &str) -> Option<&JsonValue> {
        self.vars.get(key)
    }

    /// The template context argument templates render against.
    pub fn template_context(&self) -> JsonValue {
        json!({
            "host": {
                "name": self.name,
                "address": self.address(),
            },
            "vars": self.vars,
        })
    }

    /// The per-host fact cache behind its resolution lock.
    pub(crate) fn fact_cache(&self) -> &Mutex<HashMap<Fingerprint, JsonValue>> {
        &self.facts
    }

    /// Number of cached fact entries. Acquires the fact lock.
    pub async fn cached_fact_count(&self) -> usize {
        self.facts.lock().await.len()
    }

    /// Put execution-argument overrides in scope for the current operation.
    pub fn scope_op_arguments(&self, arguments: ArgumentOverrides) {
        *self.current_op_arguments.write() = Some(arguments);
    }

    /// Clear the current operation's argument scope.
    pub fn clear_op_arguments(&self) {
        *self.current_op_arguments.write() = None;
    }

    /// The argument overrides currently in scope, if any.
    pub fn op_arguments(&self) -> Option<ArgumentOverrides> {
        self.current_op_arguments.read().clone()
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::hash::Hash for Host {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(addr) = &self.address {
            write!(f, " ({})", addr)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
