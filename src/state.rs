//! Run state shared across host tasks.
//!
//! [`State`] ties together the configuration, the inventory and the
//! cross-cutting failed-host set. The failed set is mutated concurrently
//! from many host tasks, so it lives in a lock-free concurrent set; a
//! failed host stays failed for the remainder of the run and is skipped by
//! [`State::active_hosts`].

use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::inventory::{Host, Inventory};

/// Shared state for one run.
pub struct State {
    config: Config,
    inventory: Inventory,
    failed_hosts: DashSet<String>,

    /// Log loaded facts at info level instead of debug.
    pub print_fact_info: bool,
    /// Stream fact command output live.
    pub print_fact_output: bool,
    /// Print fact commands before executing them.
    pub print_fact_input: bool,
}

impl State {
    /// Create run state from configuration and inventory.
    pub fn new(config: Config, inventory: Inventory) -> Self {
        Self {
            config,
            inventory,
            failed_hosts: DashSet::new(),
            print_fact_info: false,
            print_fact_output: false,
            print_fact_input: false,
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The inventory.
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Mark hosts as failed for the remainder of the run.
    pub fn fail_hosts<'a>(&self, hosts: impl IntoIterator<Item = &'a Arc<Host>>) {
        for host in hosts {
            if self.failed_hosts.insert(host.name().to_string()) {
                debug!(host = %host.name(), "marking host as failed");
            }
        }
    }

    /// Whether a host has failed during this run.
    pub fn is_host_failed(&self, name: &str) -> bool {
        self.failed_hosts.contains(name)
    }

    /// Names of all failed hosts.
    pub fn failed_host_names(&self) -> Vec<String> {
        self.failed_hosts.iter().map(|h| h.key().clone()).collect()
    }

    /// Hosts still active in this run, in inventory order.
    pub fn active_hosts(&self) -> Vec<Arc<Host>> {
        self.inventory
            .hosts()
            .filter(|host| !self.failed_hosts.contains(host.name()))
            .cloned()
            .collect()
    }
}
