#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use tapedeck_tracker::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
ingest:
  base_url: "https://ingest.example.com"
  max_atempts: 3 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
ingest:
  base_url: "https://ingest.example.com"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    let policy = cfg.ingest.retry_policy();
    assert_eq!(policy.max_attempts, 10);
    assert_eq!(policy.attempt_timeout, Duration::from_millis(1000));
    assert_eq!(cfg.ingest.request_timeout_ms, 30_000);
}

#[test]
fn rejects_unsupported_version() {
    let bad = r#"
version: 2
ingest:
  base_url: "https://ingest.example.com"
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn rejects_non_http_base_url() {
    let bad = r#"
version: 1
ingest:
  base_url: "ftp://ingest.example.com"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("http or https"));
}

#[test]
fn rejects_zero_attempts() {
    let bad = r#"
version: 1
ingest:
  base_url: "http://localhost:9000"
  max_attempts: 0
"#;
    assert!(config::load_from_str(bad).is_err());
}
