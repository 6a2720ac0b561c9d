//! Integration tests for the fact resolution engine: caching, output
//! classification, benign-absence reclassification and failure tracking.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustinfra::facts::engine::{
    create_host_fact, delete_host_fact, get_fact, get_host_fact, host_fact_fingerprint,
};
use rustinfra::prelude::*;

fn service_list_ref() -> FactRef {
    FactRef::Command(Arc::new(ServiceList))
}

#[tokio::test]
async fn test_cached_fact_executes_command_once() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(stdout_output(
        &["nginx", "postgres"],
    ))));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let fact = service_list_ref();
    let hash = host_fact_fingerprint(&state, &host, "service_list", None).unwrap();

    let first = get_fact(&state, &host, &fact, None, Some(hash.clone()), true)
        .await
        .unwrap();
    let second = get_fact(&state, &host, &fact, None, Some(hash), true)
        .await
        .unwrap();

    assert_eq!(first, json!(["nginx", "postgres"]));
    assert_eq!(second, first);
    // The second call is served from the cache.
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_without_fingerprint_every_call_executes() {
    let mock = Arc::new(
        MockConnection::new("web-1").fallback(Scripted::Output(stdout_output(&["nginx"]))),
    );
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();
    let fact = service_list_ref();

    get_fact(&state, &host, &fact, None, None, true).await.unwrap();
    get_fact(&state, &host, &fact, None, None, true).await.unwrap();

    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_successful_empty_stdout_yields_default() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let data = get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    // Default value, not a parse of empty input.
    assert_eq!(data, json!([]));
    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_sudo_unknown_user_is_benign() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["sudo: unknown user: alice"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut kwargs = FactArguments::new();
    kwargs.insert("_sudo".to_string(), ArgValue::Literal(json!(true)));
    kwargs.insert("_sudo_user".to_string(), ArgValue::Literal(json!("alice")));

    let data = get_fact(&state, &host, &service_list_ref(), Some(kwargs), None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_sudo_unknown_user_without_sudo_user_is_a_failure() {
    // The reclassification only applies when the escalation user was
    // actually requested.
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["sudo: unknown user: alice"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let data = get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_su_unknown_login_is_benign() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["su: unknown login: alice"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut kwargs = FactArguments::new();
    kwargs.insert("_su_user".to_string(), ArgValue::Literal(json!("alice")));

    let data = get_fact(&state, &host, &service_list_ref(), Some(kwargs), None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_benign_match_is_first_line_only() {
    // The pattern appearing on a later stderr line does not reclassify.
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["permission denied", "sudo: unknown user: alice"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut kwargs = FactArguments::new();
    kwargs.insert("_sudo_user".to_string(), ArgValue::Literal(json!("alice")));

    get_fact(&state, &host, &service_list_ref(), Some(kwargs), None, true)
        .await
        .unwrap();

    assert!(state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_true_failure_marks_host() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["permission denied"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let data = get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_ignore_errors_from_host_scope_spares_host() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["permission denied"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut scope = ArgumentOverrides::new();
    scope.insert("ignore_errors".to_string(), json!(true));
    host.scope_op_arguments(scope);

    let data = get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_ignore_errors_from_config_spares_host() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["permission denied"]),
    )));
    let config = Config {
        ignore_errors: true,
        ..Config::default()
    };
    let state = state_with_hosts_and_config(vec![("web-1", mock.clone())], config);
    let host = state.inventory().get("web-1").unwrap().clone();

    get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_fail_on_error_false_spares_host() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(
        stderr_failure(&["permission denied"]),
    )));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let data = get_fact(&state, &host, &service_list_ref(), None, None, false)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(!state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_transport_timeout_folds_into_failed_execution() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Timeout(10)));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    // Not an Err: the timeout is recovered into a failed execution.
    let data = get_fact(&state, &host, &service_list_ref(), None, None, true)
        .await
        .unwrap();

    assert_eq!(data, json!([]));
    assert!(state.is_host_failed("web-1"));
}

#[tokio::test]
async fn test_invalid_execution_argument_is_rejected() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut kwargs = FactArguments::new();
    kwargs.insert("_chdir".to_string(), ArgValue::Literal(json!("/tmp")));

    let err = get_fact(&state, &host, &service_list_ref(), Some(kwargs), None, true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidExecutionArgument(key) if key == "chdir"));
    // Nothing was executed for the invalid request.
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_execution_arguments_reach_transport() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let mut kwargs = FactArguments::new();
    kwargs.insert("_sudo".to_string(), ArgValue::Literal(json!(true)));
    kwargs.insert(
        "_sudo_user".to_string(),
        ArgValue::Literal(json!("postgres")),
    );
    kwargs.insert("_timeout".to_string(), ArgValue::Literal(json!(120)));

    get_fact(&state, &host, &service_list_ref(), Some(kwargs), None, true)
        .await
        .unwrap();

    let arguments = mock.last_arguments().unwrap();
    assert!(arguments.sudo);
    assert_eq!(arguments.sudo_user.as_deref(), Some("postgres"));
    assert_eq!(arguments.timeout, 120);
}

#[tokio::test]
async fn test_create_and_delete_host_fact() {
    let mock = Arc::new(
        MockConnection::new("web-1").fallback(Scripted::Output(stdout_output(&["nginx"]))),
    );
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    ensure_registered(ServiceList);

    // Injected data is served without touching the transport.
    create_host_fact(&state, &host, "service_list", json!(["synthetic"]), None)
        .await
        .unwrap();
    let data = get_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
    assert_eq!(data, json!(["synthetic"]));
    assert_eq!(mock.call_count(), 0);

    // After eviction the command runs for real.
    delete_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
    let data = get_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
    assert_eq!(data, json!(["nginx"]));
    assert_eq!(mock.call_count(), 1);

    // Evicting an absent entry is not an error.
    delete_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
    delete_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_fact_name_is_an_error() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock)]);
    let host = state.inventory().get("web-1").unwrap().clone();

    let err = get_host_fact(&state, &host, "definitely_not_registered", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownFact(_)));
}

#[tokio::test]
async fn test_derived_fact_maps_primary_and_resolves_it_once() {
    let mock = Arc::new(MockConnection::new("web-1").fallback(Scripted::Output(stdout_output(
        &["a", "b", "c"],
    ))));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    ensure_registered(ServiceList);
    ensure_registered_derived(ServiceCount);

    let derived = registry().lookup("service_count").unwrap();

    let count = get_fact(&state, &host, &derived, None, None, true)
        .await
        .unwrap();
    assert_eq!(count, json!(3));

    // Resolving again reuses the primary's cached data.
    let count = get_fact(&state, &host, &derived, None, None, true)
        .await
        .unwrap();
    assert_eq!(count, json!(3));
    assert_eq!(mock.call_count(), 1);

    // The primary itself is also served from the same cache entry.
    let list = get_host_fact(&state, &host, "service_list", None)
        .await
        .unwrap();
    assert_eq!(list, json!(["a", "b", "c"]));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_same_fingerprint_concurrent_calls_single_flight() {
    let mock = Arc::new(
        MockConnection::new("web-1")
            .fallback(Scripted::Output(stdout_output(&["nginx"])))
            .with_delay(Duration::from_millis(100)),
    );
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();
    let fact = service_list_ref();
    let hash = host_fact_fingerprint(&state, &host, "service_list", None).unwrap();

    let (first, second) = tokio::join!(
        get_fact(&state, &host, &fact, None, Some(hash.clone()), true),
        get_fact(&state, &host, &fact, None, Some(hash.clone()), true),
    );

    assert_eq!(first.unwrap(), json!(["nginx"]));
    assert_eq!(second.unwrap(), json!(["nginx"]));
    // The loser of the lock race finds the cache populated.
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_different_hosts_resolve_concurrently() {
    let delay = Duration::from_millis(150);
    let mock_a = Arc::new(
        MockConnection::new("web-1")
            .fallback(Scripted::Output(stdout_output(&["nginx"])))
            .with_delay(delay),
    );
    let mock_b = Arc::new(
        MockConnection::new("web-2")
            .fallback(Scripted::Output(stdout_output(&["postgres"])))
            .with_delay(delay),
    );
    let state = state_with_hosts(vec![("web-1", mock_a.clone()), ("web-2", mock_b.clone())]);
    let host_a = state.inventory().get("web-1").unwrap().clone();
    let host_b = state.inventory().get("web-2").unwrap().clone();
    let fact = service_list_ref();

    let started = Instant::now();
    let (a, b) = tokio::join!(
        get_fact(&state, &host_a, &fact, None, None, true),
        get_fact(&state, &host_b, &fact, None, None, true),
    );
    let elapsed = started.elapsed();

    assert_eq!(a.unwrap(), json!(["nginx"]));
    assert_eq!(b.unwrap(), json!(["postgres"]));
    // Neither host waited on the other's lock (sequential would be 2x).
    assert!(
        elapsed < delay * 2,
        "hosts resolved sequentially: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_probe_wrapped_command_reaches_transport() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    ensure_registered(rustinfra::facts::builtin::DebPackages);
    get_host_fact(&state, &host, "deb_packages", None)
        .await
        .unwrap();

    let command = mock.calls().pop().unwrap();
    assert!(command.starts_with("! command -v dpkg-query >/dev/null || "));
}

#[tokio::test]
async fn test_templated_argument_renders_against_host() {
    let mock = Arc::new(MockConnection::new("web-1"));
    let state = state_with_hosts(vec![("web-1", mock.clone())]);
    let host = state.inventory().get("web-1").unwrap().clone();

    ensure_registered(rustinfra::facts::builtin::File);

    let mut kwargs = FactArguments::new();
    kwargs.insert(
        "path".to_string(),
        ArgValue::template("/var/log/{{ host.name }}.log"),
    );
    get_host_fact(&state, &host, "file", Some(kwargs))
        .await
        .unwrap();

    let command = mock.calls().pop().unwrap();
    assert!(command.contains("/var/log/web-1.log"));
}
