//! Scenario: transport and actuator failures never stop the cycle.
//!
//! A refused dispatch is logged and counted. The message id it would have
//! carried stays consumed, the actuator is still driven, and the change set
//! is still cleared.

use twin_reconcile::{Channel, StateVector};
use twin_schemas::DesiredScope;
use twin_testkit::{complete_doc, partial_doc, Harness};

fn ch(i: usize) -> Channel {
    Channel::new(i).unwrap()
}

#[test]
fn refused_event_dispatch_consumes_id_and_still_writes() {
    let mut h = Harness::booted(8);
    h.transport.refuse_next_events(1);
    h.inbound
        .desired(DesiredScope::Complete, complete_doc(&[(1, true), (2, true)]))
        .unwrap();

    let report = h.tick();
    assert_eq!(report.dispatch_failures, 1);
    assert_eq!(report.outbound.len(), 1);
    assert_eq!(report.outbound[0].channel, ch(1));
    assert_eq!(report.outbound[0].message_id, 2, "id 1 went to the refused event");
    assert_eq!(report.actuator_writes, vec![(ch(0), true), (ch(1), true)]);
    assert_eq!(report.reported_updates, 2);

    assert!(h.ctx.pending_changes().is_empty());
    assert_eq!(h.ctx.next_message_id(), 3);
    assert_eq!(h.ctx.delivery().dispatched(), 2, "boot + one accepted event");
    assert_eq!(h.actuator.levels(), StateVector::new([true, true, false, false]));
}

#[test]
fn refused_reported_state_is_counted_and_events_continue() {
    let mut h = Harness::booted(8);
    h.transport.set_refuse_reported(true);
    h.inbound
        .desired(DesiredScope::Partial, partial_doc(&[(3, true), (4, true)]))
        .unwrap();

    let report = h.tick();
    assert_eq!(report.reported_updates, 0);
    assert_eq!(report.dispatch_failures, 2);
    assert_eq!(report.outbound.len(), 2);
    assert_eq!(report.actuator_writes.len(), 2);
    assert_eq!(h.ctx.current(), StateVector::new([false, false, true, true]));
}

#[test]
fn actuator_failure_is_reported_and_twin_keeps_desired_level() {
    let mut h = Harness::booted(8);
    h.actuator.break_channel(ch(1));
    h.inbound
        .desired(DesiredScope::Partial, partial_doc(&[(2, true), (3, true)]))
        .unwrap();

    let report = h.tick();
    assert_eq!(report.actuator_failures, 1);
    assert_eq!(report.actuator_writes, vec![(ch(1), true), (ch(2), true)]);
    assert_eq!(report.outbound.len(), 2);
    assert_eq!(h.ctx.current(), StateVector::new([false, true, true, false]));
    assert_eq!(h.actuator.levels(), StateVector::new([false, false, true, false]));
    assert!(h.ctx.pending_changes().is_empty());
}
