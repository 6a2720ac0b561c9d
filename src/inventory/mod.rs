//! Host inventory for the fact engine.
//!
//! The inventory is the table of managed hosts a run operates on. Hosts
//! are created when the inventory is built and live for the whole run;
//! failure status is tracked separately in [`State`](crate::state::State)
//! so the inventory itself stays immutable during orchestration.

/// Host definition.
pub mod host;

pub use host::Host;

use indexmap::IndexMap;
use std::sync::Arc;

/// A collection of managed hosts, keyed by name.
#[derive(Default)]
pub struct Inventory {
    hosts: IndexMap<String, Arc<Host>>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host, returning its shared handle. A host added under an
    /// existing name replaces the previous entry.
    pub fn add_host(&mut self, host: Host) -> Arc<Host> {
        let host = Arc::new(host);
        self.hosts.insert(host.name().to_string(), host.clone());
        host
    }

    /// Look up a host by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Host>> {
        self.hosts.get(name)
    }

    /// Iterate over all hosts in insertion order.
    pub fn hosts(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.hosts.values()
    }

    /// Number of hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the inventory is empty.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
