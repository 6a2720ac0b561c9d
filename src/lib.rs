//! # Rustinfra - Remote Fact Gathering Engine
//!
//! Rustinfra is the fact-gathering core of an infrastructure automation
//! tool: it determines the current state of many remote hosts by running
//! small discovery commands over a pluggable transport, parses the output
//! into typed values, and caches the result per host so state-diff logic
//! can query "current state" cheaply and repeatedly.
//!
//! ## Core Concepts
//!
//! - **Facts**: typed pieces of discoverable remote state (installed
//!   packages, kernel version, a file's metadata), each defined by a
//!   command and a parser
//! - **Registry**: the process-wide table of fact definitions, populated
//!   once at startup
//! - **Hosts**: managed targets, each owning its own fact cache and the
//!   lock that serialises fact commands against it
//! - **Execution arguments**: transport-affecting settings (timeout,
//!   privilege escalation, shell) merged from request, host scope and
//!   configuration
//! - **Orchestration**: bounded concurrent fan-out of one fact request
//!   over the whole inventory, aggregating results in completion order
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rustinfra::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     register_builtins()?;
//!
//!     let mut inventory = Inventory::new();
//!     inventory.add_host(Host::new("local", Arc::new(LocalConnection::new())));
//!
//!     let state = State::new(Config::default(), inventory);
//!     let packages = get_facts(&state, "deb_packages", None).await?;
//!
//!     for (host, data) in packages {
//!         println!("{host}: {data}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and operations.

    pub use crate::arguments::{ArgumentOverrides, ExecutionArguments};
    pub use crate::config::Config;
    pub use crate::connection::local::LocalConnection;
    pub use crate::connection::{
        CommandOutput, Connection, ConnectionError, ConnectionResult, OutputLine, OutputStream,
    };
    pub use crate::error::{Error, Result};
    pub use crate::executor::{get_fact_for_all_hosts, get_facts};
    pub use crate::facts::builtin::register_builtins;
    pub use crate::facts::engine::{
        create_host_fact, delete_host_fact, get_fact, get_host_fact,
    };
    pub use crate::facts::registry::registry;
    pub use crate::facts::{
        DerivedFact, Fact, FactArguments, FactCommand, FactParam, FactRef, RenderedArguments,
    };
    pub use crate::inventory::{Host, Inventory};
    pub use crate::state::State;
    pub use crate::template::ArgValue;
}

/// Error types and result aliases.
pub mod error;

/// Global run configuration.
pub mod config;

/// Run state shared across host tasks: inventory, failed-host tracking
/// and output flags.
pub mod state;

/// Execution-argument model and precedence merging.
pub mod arguments;

/// Argument-value model and host-context template rendering.
pub mod template;

/// Transport layer contract and the local implementation.
///
/// The fact engine only needs something that can run a shell command and
/// return the exit status plus interleaved output; SSH and container
/// transports plug in from outside through the
/// [`Connection`](connection::Connection) trait.
pub mod connection;

/// Host inventory.
pub mod inventory;

/// Fact definitions, registry, fingerprints and the resolution engine.
pub mod facts;

/// Concurrent multi-host fact orchestration.
pub mod executor;

/// Progress reporting for fan-out batches.
pub mod progress;

/// Output helpers for fact failures.
pub mod output;

/// Returns the current version of Rustinfra.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
