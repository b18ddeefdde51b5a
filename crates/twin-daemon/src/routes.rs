//! Axum router and all HTTP handlers for twin-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Write endpoints only enqueue: the reconcile loop picks
//! the event up on its next tick, so a 202 means "queued", not "applied".

use std::{convert::Infallible, str::FromStr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use twin_reconcile::{DesiredScope, InboundEvent, QueueError, TrackingId};

use crate::{
    api_types::{
        ConfirmAccepted, ConfirmRequest, DesiredAccepted, DesiredQuery, ErrorResponse,
        HealthResponse, MessageAccepted,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/twin", get(twin_status))
        .route("/v1/twin/desired", post(twin_desired))
        .route("/v1/messages", post(cloud_message))
        .route("/v1/confirmations", post(confirm_delivery))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

fn error_response(status: StatusCode, code: &str, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
        .into_response()
}

fn queue_refusal(err: QueueError) -> Response {
    match err {
        QueueError::Full => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "queue_full",
            "inbound queue is full; retry shortly".to_string(),
        ),
        QueueError::Closed => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "loop_stopped",
            "reconcile loop is not running".to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            instance_id: st.build.instance_id,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/twin
// ---------------------------------------------------------------------------

pub(crate) async fn twin_status(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.twin.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/twin/desired?scope=complete|partial
// ---------------------------------------------------------------------------

/// Enqueue a desired-state document.
///
/// The body is passed through untouched; decoding (and rejecting malformed
/// documents) is the reconciler's job.
pub(crate) async fn twin_desired(
    State(st): State<Arc<AppState>>,
    Query(q): Query<DesiredQuery>,
    body: Bytes,
) -> Response {
    let scope = match q.scope.as_deref() {
        None => DesiredScope::Partial,
        Some(raw) => match DesiredScope::from_str(raw) {
            Ok(scope) => scope,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "bad_scope", e.to_string()),
        },
    };

    match st.inbound.desired(scope, body.to_vec()) {
        Ok(()) => {
            info!(%scope, bytes = body.len(), "desired update queued");
            (
                StatusCode::ACCEPTED,
                Json(DesiredAccepted {
                    accepted: true,
                    scope: scope.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(%scope, error = %e, "desired update refused");
            queue_refusal(e)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/messages
// ---------------------------------------------------------------------------

/// Enqueue a cloud-to-device message. Its disposition is settled by the
/// reconciler and shows up on the SSE stream as a log line.
pub(crate) async fn cloud_message(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let message_ref = st.next_message_ref();
    let event = InboundEvent::CloudMessage {
        message_ref,
        payload: body.to_vec(),
    };

    match st.inbound.push(event) {
        Ok(()) => {
            info!(message_ref, "cloud message queued");
            (
                StatusCode::ACCEPTED,
                Json(MessageAccepted {
                    accepted: true,
                    message_ref,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(message_ref, error = %e, "cloud message refused");
            queue_refusal(e)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/confirmations
// ---------------------------------------------------------------------------

/// Enqueue a delivery confirmation for a dispatched event.
///
/// The tracking id is not checked against past dispatches; the engine settles
/// by count, so an unknown id still counts as one confirmation.
pub(crate) async fn confirm_delivery(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ConfirmRequest>,
) -> Response {
    match st.inbound.confirm(TrackingId(req.tracking_id), req.ok) {
        Ok(()) => {
            info!(tracking_id = req.tracking_id, ok = req.ok, "confirmation queued");
            (
                StatusCode::ACCEPTED,
                Json(ConfirmAccepted {
                    accepted: true,
                    tracking_id: req.tracking_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(tracking_id = req.tracking_id, error = %e, "confirmation refused");
            queue_refusal(e)
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Twin(_) => "twin",
                    BusMsg::Telemetry { .. } => "telemetry",
                    BusMsg::Reported { .. } => "reported",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
