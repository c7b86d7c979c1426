//! Smoke tests against a real search daemon.
//!
//! Set `SPHINXQL_TEST_ADDR` (e.g. `127.0.0.1:9306`) to a running searchd or
//! Manticore SphinxQL listener to enable these; they skip silently otherwise.

use std::time::Duration;

use sphinxql_client::{SearchdConfig, SearchdConnection};

const ADDR_ENV: &str = "SPHINXQL_TEST_ADDR";

fn test_config() -> Option<SearchdConfig> {
    let raw = std::env::var(ADDR_ENV).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (host, port) = match raw.rsplit_once(':') {
        Some((host, port_str)) => (host, port_str.parse::<u16>().ok()?),
        None => (raw, 9306),
    };

    Some(
        SearchdConfig::new()
            .host(host)
            .port(port)
            .connect_timeout(Duration::from_secs(10)),
    )
}

#[test]
fn connect_and_ping() {
    let Some(cfg) = test_config() else {
        eprintln!("skipping searchd integration tests: set {ADDR_ENV}");
        return;
    };

    let mut conn = SearchdConnection::connect(cfg).expect("connect to searchd");
    assert!(conn.connected());
    assert!(conn.server_version().is_some());
    conn.ping().expect("ping");
    assert!(conn.close());
}

#[test]
fn show_tables_decodes() {
    let Some(cfg) = test_config() else {
        eprintln!("skipping searchd integration tests: set {ADDR_ENV}");
        return;
    };

    let mut conn = SearchdConnection::connect(cfg).expect("connect to searchd");
    let tables = conn.query("SHOW TABLES").expect("SHOW TABLES");
    // One result set whose rows all share one column shape.
    assert_eq!(tables.len(), 1);
    for row in &tables[0] {
        assert!(!row.is_empty());
    }
}

#[test]
fn open_close_idempotence_against_real_server() {
    let Some(cfg) = test_config() else {
        eprintln!("skipping searchd integration tests: set {ADDR_ENV}");
        return;
    };

    let mut conn = SearchdConnection::connect(cfg).expect("connect to searchd");
    assert!(!conn.open().expect("second open is a no-op"));
    assert!(conn.close());
    assert!(!conn.close());
    assert!(conn.open().expect("reopen after close"));
    conn.ping().expect("ping after reopen");
}
