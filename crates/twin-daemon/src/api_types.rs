//! Request and response types for the twin-daemon HTTP endpoints.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub instance_id: Uuid,
}

// ---------------------------------------------------------------------------
// /v1/twin/desired
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredQuery {
    /// `complete` | `partial`. Omitted means `partial`.
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredAccepted {
    pub accepted: bool,
    pub scope: String,
}

// ---------------------------------------------------------------------------
// /v1/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAccepted {
    pub accepted: bool,
    /// Reference the disposition is logged under.
    pub message_ref: u64,
}

// ---------------------------------------------------------------------------
// /v1/confirmations
// ---------------------------------------------------------------------------

/// Delivery outcome for one dispatched event, as the remote service would
/// report it. Used when the loopback hub runs without `auto_confirm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub tracking_id: u64,
    #[serde(default = "confirm_ok_default")]
    pub ok: bool,
}

fn confirm_ok_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmAccepted {
    pub accepted: bool,
    pub tracking_id: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body for every 4xx / 5xx the daemon produces itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable tag: "bad_scope" | "queue_full" | "loop_stopped"
    pub code: String,
}
