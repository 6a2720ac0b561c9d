//! The process-wide fact registry.
//!
//! Facts register themselves once at process initialisation, before any
//! concurrent resolution begins, and the registry is read-only from then
//! on. That ordering is a documented precondition, not an oversight: it is
//! what lets lookups run lock-free in spirit during orchestration. The
//! interior lock exists only to make initialisation itself memory-safe.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::facts::{DerivedFact, Fact, FactRef};

/// A table mapping fact identifiers to their definitions.
///
/// Command-backed and derived facts share one namespace; registering any
/// definition under an already-taken identifier is a programming error
/// surfaced as [`Error::DuplicateFact`].
#[derive(Default)]
pub struct FactRegistry {
    facts: RwLock<HashMap<String, FactRef>>,
}

impl FactRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command-backed fact definition.
    pub fn register<F: Fact + 'static>(&self, fact: F) -> Result<()> {
        self.insert(fact.name(), FactRef::Command(Arc::new(fact)))
    }

    /// Register a derived fact definition.
    pub fn register_derived<F: DerivedFact + 'static>(&self, fact: F) -> Result<()> {
        self.insert(fact.name(), FactRef::Derived(Arc::new(fact)))
    }

    fn insert(&self, name: &'static str, fact: FactRef) -> Result<()> {
        let mut facts = self.facts.write();
        if facts.contains_key(name) {
            return Err(Error::DuplicateFact(name.to_string()));
        }
        facts.insert(name.to_string(), fact);
        Ok(())
    }

    /// Look up a fact definition by identifier.
    pub fn lookup(&self, name: &str) -> Result<FactRef> {
        self.facts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFact(name.to_string()))
    }

    /// Whether an identifier is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.facts.read().contains_key(name)
    }

    /// All registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.facts.read().keys().cloned().collect();
        names.sort();
        names
    }
}

static REGISTRY: Lazy<FactRegistry> = Lazy::new(FactRegistry::new);

/// The process-wide registry. All registration must complete before
/// orchestration starts.
pub fn registry() -> &'static FactRegistry {
    &REGISTRY
}
