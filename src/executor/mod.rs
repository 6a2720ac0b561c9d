//! Concurrent multi-host fact orchestration.
//!
//! Fans a single fact request out to every active host as independent
//! tasks bounded by the configured fork count. Tasks hold only their own
//! host's fact lock, so they complete in whatever order the network
//! allows; results are aggregated as they arrive and the batch returns
//! only once every submitted task has finished. A host whose resolution
//! errors still yields a result slot holding the fact's default value:
//! partial failure is a per-host concern, never a batch-aborting one.

use futures::stream::{self, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::error::Result;
use crate::facts::engine::{get_fact, host_fact_fingerprint};
use crate::facts::registry::registry;
use crate::facts::{FactArguments, FactRef};
use crate::progress::FactProgress;
use crate::state::State;

/// Resolve a fact across all active hosts, returning one entry per host
/// keyed by host name.
pub async fn get_fact_for_all_hosts(
    state: &State,
    fact: &FactRef,
    kwargs: Option<FactArguments>,
) -> HashMap<String, JsonValue> {
    let hosts = state.active_hosts();
    debug!(
        fact = fact.name(),
        hosts = hosts.len(),
        "gathering fact across hosts"
    );

    let progress = FactProgress::start(fact.name(), hosts.len());

    let results: HashMap<String, JsonValue> = stream::iter(hosts)
        .map(|host| {
            let kwargs = kwargs.clone();
            let progress = progress.clone();
            async move {
                let data = resolve_one(state, &host, fact, kwargs).await;
                progress.advance(host.name());
                (host.name().to_string(), data)
            }
        })
        .buffer_unordered(state.config().forks.max(1))
        .collect()
        .await;

    progress.finish();
    results
}

/// Resolve a fact by registered name across all active hosts.
pub async fn get_facts(
    state: &State,
    name: &str,
    kwargs: Option<FactArguments>,
) -> Result<HashMap<String, JsonValue>> {
    let fact = registry().lookup(name)?;
    Ok(get_fact_for_all_hosts(state, &fact, kwargs).await)
}

async fn resolve_one(
    state: &State,
    host: &std::sync::Arc<crate::inventory::Host>,
    fact: &FactRef,
    kwargs: Option<FactArguments>,
) -> JsonValue {
    let hash = match host_fact_fingerprint(state, host, fact.name(), kwargs.as_ref()) {
        Ok(hash) => Some(hash),
        Err(err) => {
            error!(host = %host.name(), fact = fact.name(), %err, "could not fingerprint fact request");
            None
        }
    };

    match get_fact(state, host, fact, kwargs, hash, true).await {
        Ok(data) => data,
        Err(err) => {
            // An unrecovered error still yields this host's result slot.
            error!(host = %host.name(), fact = fact.name(), %err, "fact resolution failed");
            fact.default_value()
        }
    }
}
