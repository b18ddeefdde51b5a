//! Report of config leaves that no code reads.
//!
//! A key the daemon never looks at is usually a typo or a leftover from an
//! older layout, so it is surfaced instead of silently ignored.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leaves::{covers, leaves};

/// JSON-pointer prefixes the daemon reads.
///
/// Must track [`crate::TwinConfig`]; a field added there without an entry
/// here shows up as unused.
const CONSUMED: &[&str] = &[
    "/device/device_id",
    "/reconcile/tick_interval_ms",
    "/reconcile/inbound_queue_capacity",
    "/telemetry/aux_fields",
    "/transport/connection_string_env",
    "/transport/auto_confirm",
    "/daemon/bind_addr",
];

/// How many offending pointers a `Fail` error lists.
const ERROR_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Prefixes the analysis treated as read, sorted.
    pub consumed_prefixes: Vec<String>,
    /// Leaves outside every consumed prefix, sorted and unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

/// Walk `config_json` and list every leaf not under [`consumed_pointers`].
///
/// With [`UnusedKeyPolicy::Fail`] a non-empty list is an error tagged
/// `CONFIG_UNUSED_KEYS`.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut consumed_prefixes: Vec<String> = CONSUMED.iter().map(|p| p.to_string()).collect();
    consumed_prefixes.sort();

    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed_prefixes.iter().any(|prefix| covers(prefix, ptr)))
        .collect();
    unused.sort();
    unused.dedup();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        let preview: Vec<&String> = unused.iter().take(ERROR_PREVIEW).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by anything; \
             remove them or register them as consumed. First few: {:?}",
            unused.len(),
            preview
        );
    }

    Ok(UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_consumed_pointer_is_absolute() {
        for p in consumed_pointers() {
            assert!(p.starts_with('/') && !p.ends_with('/'), "{p}");
        }
    }

    #[test]
    fn warn_mode_lists_without_failing() {
        let cfg = json!({"daemon": {"bind_addr": "x", "bind_adr": "typo"}});
        let report = report_unused_keys(&cfg, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(report.unused_leaf_pointers, vec!["/daemon/bind_adr"]);
    }
}
