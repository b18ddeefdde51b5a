//! Typed config: defaults, file layering, validation.

use std::io::Write;

use twin_config::{load_layered_yaml, load_layered_yaml_from_strings, TwinConfig};

#[test]
fn empty_document_yields_defaults() {
    let cfg = load_layered_yaml_from_strings(&["{}"]).unwrap().twin().unwrap();
    assert_eq!(cfg, TwinConfig::default());
    assert_eq!(cfg.reconcile.tick_interval_ms, 100);
    assert_eq!(cfg.reconcile.inbound_queue_capacity, 32);
    assert_eq!(cfg.telemetry.aux_fields, vec!["temperature", "humidity"]);
    assert_eq!(cfg.transport.connection_string_env, "TWIN_CONNECTION_STRING");
    assert!(cfg.transport.auto_confirm);
    assert_eq!(cfg.daemon.bind_addr, "127.0.0.1:8898");
}

#[test]
fn files_are_layered_in_order() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    writeln!(base, "reconcile:\n  tick_interval_ms: 250\ndaemon:\n  bind_addr: \"127.0.0.1:1\"").unwrap();
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    writeln!(overlay, "daemon:\n  bind_addr: \"127.0.0.1:2\"").unwrap();

    let paths = [
        base.path().to_str().unwrap(),
        overlay.path().to_str().unwrap(),
    ];
    let cfg = load_layered_yaml(&paths).unwrap().twin().unwrap();
    assert_eq!(cfg.reconcile.tick_interval_ms, 250);
    assert_eq!(cfg.daemon.bind_addr, "127.0.0.1:2");
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/definitely/not/here.yaml"), "got: {err}");
}

#[test]
fn invalid_values_are_rejected() {
    for yaml in [
        "reconcile:\n  tick_interval_ms: 0\n",
        "reconcile:\n  inbound_queue_capacity: 0\n",
        "telemetry:\n  aux_fields: [outlet]\n",
        "telemetry:\n  aux_fields: [temperature, temperature]\n",
        "reconcile:\n  tick_interval_ms: fast\n",
    ] {
        let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
        assert!(loaded.twin().is_err(), "expected rejection for {yaml:?}");
    }
}

#[test]
fn shipped_default_config_is_clean_and_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.yaml");
    let loaded = load_layered_yaml(&[path]).unwrap();
    let report =
        twin_config::report_unused_keys(&loaded.config_json, twin_config::UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());
    let cfg = loaded.twin().unwrap();
    assert_eq!(cfg.device.device_id.as_deref(), Some("outlet-hub-01"));
}
