//! Device connection string resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`/transport/connection_string_env`).
//! - [`resolve_connection_string`] is called once at startup; the result is
//!   passed into constructors.
//! - `Debug` redacts the shared access key.
//! - Error messages reference the env var NAME, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

/// Env var read when the config does not name one.
pub const DEFAULT_CONNECTION_STRING_ENV: &str = "TWIN_CONNECTION_STRING";

/// Parsed `HostName=…;DeviceId=…;SharedAccessKey=…`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host_name: String,
    pub device_id: String,
    pub shared_access_key: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("shared_access_key", &"<REDACTED>")
            .finish()
    }
}

impl ConnectionString {
    /// Parse `key=value` pairs separated by `;`. Keys are case-sensitive,
    /// values may contain `=` (base64 padding). Unknown keys are ignored.
    ///
    /// Errors name the missing field only.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                bail!("CONNECTION_STRING_INVALID: segment without '='");
            };
            let value = value.trim();
            match key.trim() {
                "HostName" => host_name = Some(value.to_string()),
                "DeviceId" => device_id = Some(value.to_string()),
                "SharedAccessKey" => shared_access_key = Some(value.to_string()),
                _ => {}
            }
        }

        let require = |field: Option<String>, name: &str| -> Result<String> {
            match field {
                Some(v) if !v.is_empty() => Ok(v),
                _ => bail!("CONNECTION_STRING_INVALID: missing {name}"),
            }
        };

        Ok(Self {
            host_name: require(host_name, "HostName")?,
            device_id: require(device_id, "DeviceId")?,
            shared_access_key: require(shared_access_key, "SharedAccessKey")?,
        })
    }
}

/// Env var name configured at `/transport/connection_string_env`, or the default.
fn env_name(config_json: &Value) -> String {
    config_json
        .pointer("/transport/connection_string_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CONNECTION_STRING_ENV)
        .to_string()
}

/// Resolve the device connection string from the environment.
///
/// Returns `Ok(None)` when the variable is unset or blank (the loopback
/// transport runs without one). A set-but-unparseable value is an error that
/// names the variable.
pub fn resolve_connection_string(config_json: &Value) -> Result<Option<ConnectionString>> {
    resolve_with(config_json, |name| std::env::var(name).ok())
}

fn resolve_with(
    config_json: &Value,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ConnectionString>> {
    let var = env_name(config_json);
    let Some(raw) = lookup(&var).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    match ConnectionString::parse(&raw) {
        Ok(cs) => Ok(Some(cs)),
        Err(e) => bail!("SECRETS_INVALID: env var '{var}' does not hold a valid connection string ({e})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RAW: &str = "HostName=hub.example.net;DeviceId=outlet-01;SharedAccessKey=c2VjcmV0a2V5==";

    #[test]
    fn parses_fields_and_keeps_padding() {
        let cs = ConnectionString::parse(RAW).unwrap();
        assert_eq!(cs.host_name, "hub.example.net");
        assert_eq!(cs.device_id, "outlet-01");
        assert_eq!(cs.shared_access_key, "c2VjcmV0a2V5==");
    }

    #[test]
    fn debug_redacts_key() {
        let cs = ConnectionString::parse(RAW).unwrap();
        let dbg = format!("{cs:?}");
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("c2VjcmV0a2V5"));
    }

    #[test]
    fn missing_field_is_named_without_values() {
        let err = ConnectionString::parse("HostName=h;SharedAccessKey=k")
            .unwrap_err()
            .to_string();
        assert!(err.contains("DeviceId"));
    }

    #[test]
    fn unset_variable_resolves_to_none() {
        let cfg = json!({});
        assert!(resolve_with(&cfg, |_| None).unwrap().is_none());
        assert!(resolve_with(&cfg, |_| Some("  ".into())).unwrap().is_none());
    }

    #[test]
    fn configured_variable_name_is_used() {
        let cfg = json!({"transport": {"connection_string_env": "MY_DEVICE_CS"}});
        let cs = resolve_with(&cfg, |name| (name == "MY_DEVICE_CS").then(|| RAW.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(cs.device_id, "outlet-01");
    }

    #[test]
    fn invalid_value_error_names_variable_not_value() {
        let cfg = json!({});
        let err = resolve_with(&cfg, |_| Some("SharedAccessKey=topsecret".into()))
            .unwrap_err()
            .to_string();
        assert!(err.contains(DEFAULT_CONNECTION_STRING_ENV));
        assert!(!err.contains("topsecret"));
    }
}
