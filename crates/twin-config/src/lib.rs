//! twin-config
//!
//! Layered YAML configuration for the outlet twin daemon.
//!
//! - Later documents override earlier ones (deep merge of objects; arrays
//!   and scalars are replaced whole).
//! - The merged document is canonicalised and hashed (SHA-256, hex) so logs
//!   can name exactly which configuration a process ran with.
//! - Secret-looking literal values abort loading; YAML holds env var NAMES.
//! - [`report_unused_keys`] flags leaves that no code reads.

use std::fs;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

mod leaves;
mod secrets;
mod settings;
mod unused;

pub use secrets::{resolve_connection_string, ConnectionString, DEFAULT_CONNECTION_STRING_ENV};
pub use settings::{
    DaemonSection, DeviceSection, ReconcileSection, TelemetrySection, TransportSection,
    TwinConfig,
};
pub use unused::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

// ---------------------------------------------------------------------------
// Literal-secret guard
// ---------------------------------------------------------------------------

/// A leaf string starting with one of these aborts loading.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "HostName=",  // device connection string pasted whole
    "SharedAccessSignature ",
];

/// Fragments that mark a value as a secret wherever they appear.
const SECRET_FRAGMENTS: &[&str] = &["SharedAccessKey=", "SharedAccessSignature sr="];

/// Shorter strings are never treated as secrets.
const SECRET_MIN_LEN: usize = 8;

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= SECRET_MIN_LEN
        && (SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
            || SECRET_FRAGMENTS.iter().any(|f| t.contains(f)))
}

/// Error names the offending pointer; the value never appears.
fn reject_secret_literals(merged: &Value) -> Result<()> {
    let hit = leaves::leaves(merged)
        .into_iter()
        .find(|(_, v)| v.as_str().is_some_and(looks_like_secret));
    match hit {
        Some((ptr, _)) => bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED"),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 hex of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view over the merged document.
    pub fn twin(&self) -> Result<TwinConfig> {
        TwinConfig::from_json(&self.config_json)
    }
}

/// Read and merge YAML files, base first.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Merge in-memory YAML documents, base first.
///
/// An empty document (YAML `null`) contributes nothing.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {layer}"))?;
        if doc.is_null() {
            continue;
        }
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("layer {layer} is not representable as JSON"))?;
        overlay(&mut merged, doc);
    }

    reject_secret_literals(&merged)?;

    // serde_json's default map is key-ordered, so this string is stable.
    let canonical_json =
        serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Deep merge `top` into `base` in place.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (key, top_val) in top_map {
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, top_val),
                    None => {
                        base_map.insert(key, top_val);
                    }
                }
            }
        }
        (slot, top) => *slot = top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_replaces_leaves_and_arrays_and_keeps_siblings() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": [1, 2]});
        overlay(&mut base, json!({"a": {"y": 3}, "b": [9]}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 3}, "b": [9]}));
    }

    #[test]
    fn connection_string_fragments_count_as_secrets() {
        assert!(looks_like_secret(
            "HostName=hub.example.net;DeviceId=d1;SharedAccessKey=abc="
        ));
        assert!(looks_like_secret("DeviceId=d1;SharedAccessKey=abc="));
        assert!(!looks_like_secret("TWIN_CONNECTION_STRING"));
        assert!(!looks_like_secret("sk-1"));
    }
}
