//! Typed view of the merged configuration.
//!
//! Every section has defaults, so an empty document is a valid config.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use twin_schemas::{DEFAULT_AUX_FIELDS, OUTLET_KEY};

use crate::secrets::DEFAULT_CONNECTION_STRING_ENV;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    pub device: DeviceSection,
    pub reconcile: ReconcileSection,
    pub telemetry: TelemetrySection,
    pub transport: TransportSection,
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Display id. A connection string's DeviceId takes precedence.
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    /// Fixed yield between ticks.
    pub tick_interval_ms: u64,
    pub inbound_queue_capacity: usize,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            inbound_queue_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// Placeholder keys emitted as `null` in reported state.
    pub aux_fields: Vec<String>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            aux_fields: DEFAULT_AUX_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Env var NAME holding the device connection string.
    pub connection_string_env: String,
    /// Loopback hub confirms every dispatch on the next service call.
    pub auto_confirm: bool,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            connection_string_env: DEFAULT_CONNECTION_STRING_ENV.to_string(),
            auto_confirm: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub bind_addr: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8898".to_string(),
        }
    }
}

impl TwinConfig {
    /// Deserialize and validate.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: TwinConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reconcile.tick_interval_ms == 0 {
            bail!("CONFIG_INVALID: /reconcile/tick_interval_ms must be > 0");
        }
        if self.reconcile.inbound_queue_capacity == 0 {
            bail!("CONFIG_INVALID: /reconcile/inbound_queue_capacity must be > 0");
        }
        let mut seen = std::collections::BTreeSet::new();
        for key in &self.telemetry.aux_fields {
            if key.trim().is_empty() {
                bail!("CONFIG_INVALID: /telemetry/aux_fields contains a blank key");
            }
            if key == OUTLET_KEY {
                bail!("CONFIG_INVALID: /telemetry/aux_fields must not contain '{key}'");
            }
            if !seen.insert(key.as_str()) {
                bail!("CONFIG_INVALID: /telemetry/aux_fields lists '{key}' twice");
            }
        }
        if self.transport.connection_string_env.trim().is_empty() {
            bail!("CONFIG_INVALID: /transport/connection_string_env must name an env var");
        }
        Ok(())
    }
}
