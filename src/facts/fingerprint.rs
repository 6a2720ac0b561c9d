//! Deterministic fact fingerprints.
//!
//! A fingerprint is the cache key for one logical fact request against one
//! host: a hash over the fact identifier, the call arguments as passed,
//! and the execution-relevant argument subset. Two logically identical
//! requests always hash identically, which is what makes the per-host
//! cache give at-most-one-execution per distinct request.

use sha2::{Digest, Sha256};

use crate::arguments::ExecutionArguments;
use crate::facts::FactArguments;
use crate::template::ArgValue;

/// A deterministic cache key for a fact request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint for a fact request.
///
/// Arguments are hashed as passed (before canonicalisation), tagged by
/// kind so a literal `"x"` and a template `"x"` hash differently. Literal
/// JSON serialisation is deterministic: object keys are ordered.
pub fn fingerprint(
    name: &str,
    kwargs: Option<&FactArguments>,
    arguments: &ExecutionArguments,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);

    if let Some(kwargs) = kwargs {
        let mut keys: Vec<_> = kwargs.keys().collect();
        keys.sort();
        for key in keys {
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            match &kwargs[key.as_str()] {
                ArgValue::Literal(value) => {
                    hasher.update([b'l']);
                    hasher.update(value.to_string().as_bytes());
                }
                ArgValue::Template(source) => {
                    hasher.update([b't']);
                    hasher.update(source.as_bytes());
                }
            }
            hasher.update([0]);
        }
    }

    hasher.update(arguments.cache_key().as_bytes());

    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    Fingerprint(hex)
}
