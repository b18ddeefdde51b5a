//! Translation between wire JSON and in-memory state.
//!
//! # Documents
//!
//! ```text
//! complete  {"desired": {"outlet": {"1": true, "3": true}, "$version": 4}}
//! partial   {"outlet": {"2": false}, "$version": 5}
//! reported  {"outlet": {"1": true, "2": false, "3": true, "4": false},
//!            "temperature": null, "humidity": null}
//! ```
//!
//! Decoding only looks at boolean `outlet.<n>` leaves. A missing key, or a
//! key holding something other than a boolean, leaves that channel out of
//! the patch. Encoding is total.

use serde_json::{json, Map, Value};
use twin_schemas::{DesiredScope, OUTLET_KEY};

use crate::{Channel, DecodeError, MessageId, OutboundMessage, StatePatch, StateVector};

/// Decode a desired-state payload into a patch.
pub fn decode(bytes: &[u8], scope: DesiredScope) -> Result<StatePatch, DecodeError> {
    let doc: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if !doc.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let base = match scope.root_key() {
        Some(key) => doc.get(key),
        None => Some(&doc),
    };

    let mut patch = StatePatch::empty();
    let Some(outlets) = base.and_then(|b| b.get(OUTLET_KEY)) else {
        return Ok(patch);
    };

    for ch in Channel::all() {
        if let Some(level) = outlets.get(ch.outlet().to_string()).and_then(Value::as_bool) {
            patch.set(ch, level);
        }
    }
    Ok(patch)
}

/// Reported-state document: every outlet plus null placeholders for `aux_fields`.
pub fn encode_reported<S: AsRef<str>>(state: &StateVector, aux_fields: &[S]) -> Vec<u8> {
    let mut outlets = Map::new();
    for (ch, level) in state.iter() {
        outlets.insert(ch.outlet().to_string(), Value::Bool(level));
    }

    let mut root = Map::new();
    root.insert(OUTLET_KEY.to_string(), Value::Object(outlets));
    for key in aux_fields {
        root.insert(key.as_ref().to_string(), Value::Null);
    }
    Value::Object(root).to_string().into_bytes()
}

/// Channel event: `{"messageId": <id>, "outlet": <n>, "state": <bool>}`.
pub fn encode_telemetry(message: &OutboundMessage) -> Vec<u8> {
    json!({
        "messageId": message.message_id,
        "outlet": message.channel.outlet(),
        "state": message.new_state,
    })
    .to_string()
    .into_bytes()
}

/// Boot notification: `{"messageId": <id>, "boot": true}`.
pub fn encode_boot(message_id: MessageId) -> Vec<u8> {
    json!({ "messageId": message_id, "boot": true })
        .to_string()
        .into_bytes()
}
