//! Scenario: a patch naming one outlet touches one channel only.

use twin_reconcile::{Channel, StateVector};
use twin_schemas::DesiredScope;
use twin_testkit::{complete_doc, partial_doc, Harness};

#[test]
fn scenario_partial_patch_leaves_other_channels_untouched() {
    let mut h = Harness::booted(8);
    h.inbound
        .desired(DesiredScope::Complete, complete_doc(&[(1, true), (3, true), (4, false)]))
        .unwrap();
    h.tick();
    let writes_before = h.actuator.writes().len();

    h.inbound
        .desired(DesiredScope::Partial, partial_doc(&[(2, true)]))
        .unwrap();
    let report = h.tick();

    let ch1 = Channel::new(1).unwrap();
    assert_eq!(report.actuator_writes, vec![(ch1, true)]);
    assert_eq!(h.actuator.writes().len(), writes_before + 1);
    assert_eq!(report.outbound.len(), 1);
    assert_eq!(report.outbound[0].channel, ch1);
    assert_eq!(h.ctx.current(), StateVector::new([true, true, true, false]));
}

#[test]
fn repeated_identical_update_is_silent() {
    let mut h = Harness::booted(8);
    let doc = partial_doc(&[(1, true), (2, false)]);

    h.inbound.desired(DesiredScope::Partial, doc.clone()).unwrap();
    let first = h.tick();
    assert_eq!(first.updates_applied, 1);
    let events_after_first = h.transport.events().len();
    let reports_after_first = h.transport.reported_documents().unwrap().len();

    h.inbound.desired(DesiredScope::Partial, doc).unwrap();
    let second = h.tick();
    assert_eq!(second.updates_applied, 0);
    assert!(second.outbound.is_empty());
    assert!(second.actuator_writes.is_empty());
    assert_eq!(h.transport.events().len(), events_after_first);
    assert_eq!(
        h.transport.reported_documents().unwrap().len(),
        reports_after_first
    );
    assert_eq!(h.ctx.twin_updates(), 1);
}

#[test]
fn complete_snapshot_with_no_desired_section_changes_nothing() {
    let mut h = Harness::booted(8);
    h.inbound
        .desired(DesiredScope::Complete, r#"{"reported":{"outlet":{"1":true}}}"#)
        .unwrap();
    let report = h.tick();
    assert_eq!(report.updates_applied, 0);
    assert_eq!(report.decode_failures, 0);
    assert_eq!(h.ctx.current(), StateVector::all_off());
}
