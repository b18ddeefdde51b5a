//! Config hash stability
//!
//! GREEN when:
//! - Loading the same YAML twice yields the same hash.
//! - Reordering keys within YAML doesn't change the hash.
//! - An overlay that changes a value changes the hash.

use twin_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
device:
  device_id: "outlet-hub-01"
reconcile:
  tick_interval_ms: 100
  inbound_queue_capacity: 32
transport:
  connection_string_env: "TWIN_CONNECTION_STRING"
"#;

const BASE_YAML_REORDERED: &str = r#"
transport:
  connection_string_env: "TWIN_CONNECTION_STRING"
reconcile:
  inbound_queue_capacity: 32
  tick_interval_ms: 100
device:
  device_id: "outlet-hub-01"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  tick_interval_ms: 20
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn key_order_does_not_affect_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.twin().unwrap();
    assert_eq!(cfg.reconcile.tick_interval_ms, 20);
    // Siblings of the overridden leaf survive the merge.
    assert_eq!(cfg.reconcile.inbound_queue_capacity, 32);
    assert_eq!(cfg.device.device_id.as_deref(), Some("outlet-hub-01"));
}

#[test]
fn empty_overlay_is_a_no_op() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(base.config_hash, layered.config_hash);
}
