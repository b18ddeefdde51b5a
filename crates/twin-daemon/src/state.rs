//! Shared runtime state for twin-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconciliation
//! context itself is NOT shared: it is moved into the loop task spawned by
//! [`spawn_reconcile_loop`], and handlers reach it only through the inbound
//! queue (writes) and the published [`TwinStatus`] (reads).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use twin_reconcile::{
    tick, ActuatorPort, InboundSender, ReconcilerContext, TickReport, Transport, TwinSnapshot,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Twin(TwinStatus),
    /// Event message accepted by the loopback hub.
    Telemetry {
        tracking_id: u64,
        payload: serde_json::Value,
    },
    /// Reported-state document accepted by the loopback hub.
    Reported { payload: serde_json::Value },
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
    /// Fresh per process. Message ids restart at 0 on every boot, so this is
    /// what tells two runs apart.
    pub instance_id: Uuid,
}

// ---------------------------------------------------------------------------
// TwinStatus
// ---------------------------------------------------------------------------

/// Latest view of the reconciler, returned by GET /v1/twin and carried
/// inside SSE `twin` events.
#[derive(Clone, Debug, Serialize)]
pub struct TwinStatus {
    pub daemon_uptime_secs: u64,
    pub device_id: Option<String>,
    pub twin: TwinSnapshot,
    /// Ticks run since start.
    pub ticks: u64,
    pub decode_failures: u64,
    pub dispatch_failures: u64,
    pub actuator_failures: u64,
    pub reported_acks: u64,
    pub last_change_ts_millis: Option<i64>,
}

impl TwinStatus {
    pub fn new(device_id: Option<String>, twin: TwinSnapshot) -> Self {
        Self {
            daemon_uptime_secs: uptime_secs(),
            device_id,
            twin,
            ticks: 0,
            decode_failures: 0,
            dispatch_failures: 0,
            actuator_failures: 0,
            reported_acks: 0,
            last_change_ts_millis: None,
        }
    }

    /// Fold one tick into the cumulative counters.
    pub fn record_tick(&mut self, twin: TwinSnapshot, report: &TickReport) {
        self.ticks += 1;
        self.decode_failures += report.decode_failures as u64;
        self.dispatch_failures += report.dispatch_failures as u64;
        self.actuator_failures += report.actuator_failures as u64;
        self.reported_acks += report.reported_acks as u64;
        if twin.state != self.twin.state {
            self.last_change_ts_millis = Some(chrono::Utc::now().timestamp_millis());
        }
        self.twin = twin;
        self.daemon_uptime_secs = uptime_secs();
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    /// Published by the reconcile loop after every tick.
    pub twin: Arc<RwLock<TwinStatus>>,
    /// Producer side of the reconciler's inbound queue.
    pub inbound: InboundSender,
    next_message_ref: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(inbound: InboundSender, device_id: Option<String>, initial: TwinSnapshot) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "twin-daemon",
                version: env!("CARGO_PKG_VERSION"),
                instance_id: Uuid::new_v4(),
            },
            twin: Arc::new(RwLock::new(TwinStatus::new(device_id, initial))),
            inbound,
            next_message_ref: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Reference handed back when a cloud message is settled.
    pub fn next_message_ref(&self) -> u64 {
        self.next_message_ref.fetch_add(1, Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the reconciliation loop.
///
/// The task owns `ctx` and both ports for its whole life. On each interval:
/// - runs one [`tick`];
/// - folds the report into the shared [`TwinStatus`];
/// - on a non-idle tick, broadcasts `BusMsg::Twin` plus a `LogLine` per
///   failure class seen.
pub fn spawn_reconcile_loop<T, A>(
    state: Arc<AppState>,
    mut ctx: ReconcilerContext,
    mut transport: T,
    mut actuator: A,
    interval: Duration,
) -> JoinHandle<()>
where
    T: Transport + Send + 'static,
    A: ActuatorPort + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = tick(&mut ctx, &mut transport, &mut actuator);

            let status = {
                let mut st = state.twin.write().await;
                st.record_tick(ctx.snapshot(), &report);
                st.clone()
            };

            if report.is_idle() {
                continue;
            }
            debug!(
                outbound = report.outbound.len(),
                confirmations = report.confirmations,
                released = report.released.len(),
                "tick"
            );
            for line in failure_lines(&report) {
                warn!("{line}");
                let _ = state.bus.send(BusMsg::LogLine {
                    level: "WARN".to_string(),
                    msg: line,
                });
            }
            let _ = state.bus.send(BusMsg::Twin(status));
        }
    })
}

fn failure_lines(report: &TickReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.decode_failures > 0 {
        lines.push(format!(
            "{} desired document(s) could not be decoded; prior state kept",
            report.decode_failures
        ));
    }
    if report.dispatch_failures > 0 {
        lines.push(format!(
            "{} dispatch(es) refused by transport; not retried",
            report.dispatch_failures
        ));
    }
    if report.actuator_failures > 0 {
        lines.push(format!("{} actuator write(s) failed", report.actuator_failures));
    }
    lines
}
