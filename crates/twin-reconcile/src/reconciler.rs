//! The control loop body.
//!
//! # One tick
//!
//! 1. `transport.service_once()`.
//! 2. While [`Phase::Booting`]: dispatch the boot notification
//!    (`messageId == 0`) plus a reported-state snapshot. Until that dispatch
//!    succeeds nothing is drained, so the boot message is always first.
//! 3. Drain the inbound queue (bounded by its capacity). At most one
//!    desired-state document is applied per tick; a second one is held over
//!    to the next tick so each change set is fully consumed first.
//! 4. For each changed channel, ascending: event message, reported state,
//!    actuator write. Then the change set is cleared.
//!
//! Failures are logged and counted in the [`TickReport`]; a tick never fails.
//! The caller owns the interval between ticks.

use serde::Serialize;
use tracing::{debug, error, info, warn};
use twin_schemas::DEFAULT_AUX_FIELDS;

use crate::codec;
use crate::{
    ActuatorPort, Channel, ChangeSet, DeliveryRecord, DeliveryTracker, DesiredScope, DiffEngine,
    Disposition, InboundEvent, InboundReceiver, MessageId, OutboundMessage, Released,
    StatePatch, StateVector, Transport, TwinStore, BOOT_MESSAGE_ID,
};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Reconciler lifecycle. `Steady` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Booting,
    Steady,
}

// ---------------------------------------------------------------------------
// Settings / context
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ReconcilerSettings {
    /// Placeholder telemetry keys written as `null` in every reported document.
    pub aux_fields: Vec<String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            aux_fields: DEFAULT_AUX_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// All mutable engine state, owned by the control loop.
///
/// Passed by `&mut` into [`tick`]; nothing lives in globals.
#[derive(Debug)]
pub struct ReconcilerContext {
    store: TwinStore,
    diff: DiffEngine,
    delivery: DeliveryTracker,
    phase: Phase,
    next_message_id: MessageId,
    changes: ChangeSet,
    inbound: InboundReceiver,
    /// Patch-bearing event held over to the next tick.
    deferred: Option<InboundEvent>,
    settings: ReconcilerSettings,
}

impl ReconcilerContext {
    pub fn new(inbound: InboundReceiver, settings: ReconcilerSettings) -> Self {
        Self {
            store: TwinStore::new(),
            diff: DiffEngine::new(),
            delivery: DeliveryTracker::new(),
            phase: Phase::Booting,
            next_message_id: BOOT_MESSAGE_ID,
            changes: ChangeSet::empty(),
            inbound,
            deferred: None,
            settings,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> StateVector {
        self.store.current()
    }

    /// Change set not yet consumed. Always empty between ticks.
    pub fn pending_changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn delivery(&self) -> &DeliveryTracker {
        &self.delivery
    }

    pub fn twin_updates(&self) -> u64 {
        self.diff.twin_updates()
    }

    /// Id the next event message will carry.
    pub fn next_message_id(&self) -> MessageId {
        self.next_message_id
    }

    pub fn snapshot(&self) -> TwinSnapshot {
        TwinSnapshot {
            state: self.store.current(),
            phase: self.phase,
            next_message_id: self.next_message_id,
            twin_updates: self.diff.twin_updates(),
            dispatched: self.delivery.dispatched(),
            confirmed: self.delivery.confirmed(),
            settled: self.delivery.settled(),
            retained: self.delivery.retained_len(),
            evicted: self.delivery.evicted(),
        }
    }

    fn take_message_id(&mut self) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }
}

/// Point-in-time view for status endpoints and logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TwinSnapshot {
    pub state: StateVector,
    pub phase: Phase,
    pub next_message_id: MessageId,
    pub twin_updates: u64,
    pub dispatched: u64,
    pub confirmed: u64,
    pub settled: bool,
    pub retained: usize,
    /// Records dropped unreleased at the retention cap.
    pub evicted: u64,
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub boot_dispatched: bool,
    /// Desired documents that changed at least one channel.
    pub updates_applied: usize,
    pub decode_failures: usize,
    /// Channel event messages the transport accepted, in dispatch order.
    pub outbound: Vec<OutboundMessage>,
    pub dispatch_failures: usize,
    pub reported_updates: usize,
    /// Actuator writes attempted, in order.
    pub actuator_writes: Vec<(Channel, bool)>,
    pub actuator_failures: usize,
    pub confirmations: usize,
    /// Records freed because delivery settled during this tick.
    pub released: Vec<DeliveryRecord>,
    pub reported_acks: usize,
    pub dispositions: Vec<(u64, Disposition)>,
}

impl TickReport {
    /// `true` when the tick only serviced the transport.
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Run one reconciliation tick.
pub fn tick<T, A>(ctx: &mut ReconcilerContext, transport: &mut T, actuator: &mut A) -> TickReport
where
    T: Transport + ?Sized,
    A: ActuatorPort + ?Sized,
{
    let mut report = TickReport::default();
    transport.service_once();

    if ctx.phase == Phase::Booting && !boot(ctx, transport, &mut report) {
        return report;
    }

    drain_inbound(ctx, transport, actuator, &mut report);
    report
}

/// Dispatch the boot notification. Returns `true` once `Steady`.
fn boot<T>(ctx: &mut ReconcilerContext, transport: &mut T, report: &mut TickReport) -> bool
where
    T: Transport + ?Sized,
{
    match transport.dispatch(codec::encode_boot(BOOT_MESSAGE_ID)) {
        Ok(tracking_id) => {
            let released = ctx
                .delivery
                .on_dispatch(DeliveryRecord::pending(tracking_id, BOOT_MESSAGE_ID, None));
            collect_released(released, report);
            ctx.next_message_id = BOOT_MESSAGE_ID + 1;
            ctx.phase = Phase::Steady;
            report.boot_dispatched = true;
            info!(%tracking_id, "boot notification dispatched");

            send_reported(ctx, transport, report);
            true
        }
        Err(e) => {
            report.dispatch_failures += 1;
            warn!(error = %e, "boot notification dispatch failed; retrying next tick");
            false
        }
    }
}

fn drain_inbound<T, A>(
    ctx: &mut ReconcilerContext,
    transport: &mut T,
    actuator: &mut A,
    report: &mut TickReport,
) where
    T: Transport + ?Sized,
    A: ActuatorPort + ?Sized,
{
    let mut patch_seen = false;

    for _ in 0..ctx.inbound.capacity() {
        let Some(event) = ctx.deferred.take().or_else(|| ctx.inbound.try_next()) else {
            break;
        };

        match event {
            ev @ (InboundEvent::DesiredUpdate { .. } | InboundEvent::CloudMessage { .. })
                if patch_seen =>
            {
                ctx.deferred = Some(ev);
                break;
            }

            InboundEvent::DesiredUpdate { scope, payload } => {
                patch_seen = true;
                match codec::decode(&payload, scope) {
                    Ok(patch) => apply_and_emit(ctx, transport, actuator, &patch, report),
                    Err(e) => {
                        report.decode_failures += 1;
                        warn!(%scope, error = %e, "ignoring desired update; prior state kept");
                    }
                }
            }

            InboundEvent::CloudMessage {
                message_ref,
                payload,
            } => {
                patch_seen = true;
                let decoded = codec::decode(&payload, DesiredScope::Partial);
                let disposition = match decoded {
                    Ok(_) => Disposition::Accepted,
                    Err(ref e) => {
                        report.decode_failures += 1;
                        warn!(message_ref, error = %e, "rejecting cloud message");
                        Disposition::Rejected
                    }
                };
                transport.settle_message(message_ref, disposition);
                report.dispositions.push((message_ref, disposition));

                if let Ok(patch) = decoded {
                    apply_and_emit(ctx, transport, actuator, &patch, report);
                }
            }

            InboundEvent::Confirmation { tracking_id, ok } => {
                report.confirmations += 1;
                if !ok {
                    warn!(%tracking_id, "delivery failed; message is not retried");
                }
                collect_released(ctx.delivery.on_confirm(ok), report);
            }

            InboundEvent::ReportedAck { status } => {
                report.reported_acks += 1;
                debug!(status, "reported state acknowledged");
            }
        }
    }
}

/// Apply a decoded patch and consume the resulting change set.
fn apply_and_emit<T, A>(
    ctx: &mut ReconcilerContext,
    transport: &mut T,
    actuator: &mut A,
    patch: &StatePatch,
    report: &mut TickReport,
) where
    T: Transport + ?Sized,
    A: ActuatorPort + ?Sized,
{
    ctx.changes = ctx.diff.apply(&mut ctx.store, patch);
    if ctx.changes.is_empty() {
        return;
    }
    report.updates_applied += 1;

    let changes = ctx.changes;
    for channel in changes.changed() {
        let new_state = ctx.store.current().get(channel);
        let message = OutboundMessage {
            message_id: ctx.take_message_id(),
            channel,
            new_state,
        };

        match transport.dispatch(codec::encode_telemetry(&message)) {
            Ok(tracking_id) => {
                let released = ctx.delivery.on_dispatch(DeliveryRecord::pending(
                    tracking_id,
                    message.message_id,
                    Some(channel),
                ));
                collect_released(released, report);
                report.outbound.push(message);
                info!(
                    %channel,
                    state = new_state,
                    message_id = message.message_id,
                    %tracking_id,
                    "channel event dispatched"
                );
            }
            Err(e) => {
                report.dispatch_failures += 1;
                warn!(
                    %channel,
                    message_id = message.message_id,
                    error = %e,
                    "channel event dropped"
                );
            }
        }

        send_reported(ctx, transport, report);

        report.actuator_writes.push((channel, new_state));
        if let Err(e) = actuator.write(channel, new_state) {
            report.actuator_failures += 1;
            error!(%channel, state = new_state, error = %e, "actuator write failed");
        }
    }

    ctx.changes.clear();
}

fn collect_released(released: Option<Released>, report: &mut TickReport) {
    if let Some(released) = released {
        debug!(
            count = released.records.len(),
            "deliveries settled; releasing retained messages"
        );
        report.released.extend(released.records);
    }
}

fn send_reported<T>(ctx: &ReconcilerContext, transport: &mut T, report: &mut TickReport)
where
    T: Transport + ?Sized,
{
    let payload = codec::encode_reported(&ctx.store.current(), &ctx.settings.aux_fields);
    match transport.dispatch_reported_state(payload) {
        Ok(()) => report.reported_updates += 1,
        Err(e) => {
            report.dispatch_failures += 1;
            warn!(error = %e, "reported state update dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Context plus the two ports, for loops that own everything in one place.
pub struct Reconciler<T, A> {
    ctx: ReconcilerContext,
    transport: T,
    actuator: A,
}

impl<T: Transport, A: ActuatorPort> Reconciler<T, A> {
    pub fn new(ctx: ReconcilerContext, transport: T, actuator: A) -> Self {
        Self {
            ctx,
            transport,
            actuator,
        }
    }

    pub fn tick(&mut self) -> TickReport {
        tick(&mut self.ctx, &mut self.transport, &mut self.actuator)
    }

    pub fn context(&self) -> &ReconcilerContext {
        &self.ctx
    }

    pub fn snapshot(&self) -> TwinSnapshot {
        self.ctx.snapshot()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}
