//! Scenario: a desired document posted over HTTP reaches the outputs.
//!
//! Full in-process wiring: router, reconcile loop task, loopback hub with
//! auto-confirm, logging actuator. Asserts on the published twin status and
//! on the telemetry the hub put on the bus.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use twin_daemon::{actuator::LoggingActuator, hub::LoopbackHub, routes, state};
use twin_reconcile::{inbound_queue, Phase, ReconcilerContext, ReconcilerSettings, StateVector};

async fn wait_for<F>(st: &Arc<state::AppState>, mut done: F) -> state::TwinStatus
where
    F: FnMut(&state::TwinStatus) -> bool,
{
    for _ in 0..200 {
        {
            let snap = st.twin.read().await;
            if done(&snap) {
                return snap.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("reconcile loop did not reach expected state");
}

#[tokio::test]
async fn posted_snapshot_is_applied_confirmed_and_published() {
    let (inbound, rx) = inbound_queue(16);
    let ctx = ReconcilerContext::new(rx, ReconcilerSettings::default());
    let st = Arc::new(state::AppState::new(inbound.clone(), None, ctx.snapshot()));
    let mut bus_rx = st.bus.subscribe();

    let hub = LoopbackHub::new(st.bus.clone(), inbound, true);
    let task = state::spawn_reconcile_loop(
        Arc::clone(&st),
        ctx,
        hub,
        LoggingActuator::new(),
        Duration::from_millis(2),
    );

    let booted = wait_for(&st, |s| s.twin.phase == Phase::Steady).await;
    assert_eq!(booted.twin.next_message_id, 1);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/twin/desired?scope=complete")
        .body(axum::body::Body::from(
            r#"{"desired":{"outlet":{"1":true,"3":true}}}"#,
        ))
        .unwrap();
    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let _ = resp.into_body().collect().await.unwrap();

    let done = wait_for(&st, |s| {
        s.twin.state == StateVector::new([true, false, true, false]) && s.twin.settled
    })
    .await;
    assert_eq!(done.twin.dispatched, 3, "boot + two channel events");
    assert_eq!(done.twin.next_message_id, 3);
    assert_eq!(done.twin.twin_updates, 1);
    assert_eq!(done.dispatch_failures, 0);
    assert!(done.last_change_ts_millis.is_some());

    task.abort();

    let mut telemetry = Vec::new();
    while let Ok(msg) = bus_rx.try_recv() {
        if let state::BusMsg::Telemetry { payload, .. } = msg {
            telemetry.push(payload);
        }
    }
    assert_eq!(telemetry.len(), 3);
    assert_eq!(telemetry[0], serde_json::json!({"messageId": 0, "boot": true}));
    assert_eq!(
        telemetry[1],
        serde_json::json!({"messageId": 1, "outlet": 1, "state": true})
    );
    assert_eq!(
        telemetry[2],
        serde_json::json!({"messageId": 2, "outlet": 3, "state": true})
    );
}

#[tokio::test]
async fn rejected_cloud_message_keeps_twin_and_counts_failure() {
    let (inbound, rx) = inbound_queue(16);
    let ctx = ReconcilerContext::new(rx, ReconcilerSettings::default());
    let st = Arc::new(state::AppState::new(inbound.clone(), None, ctx.snapshot()));
    let hub = LoopbackHub::new(st.bus.clone(), inbound, true);
    let task = state::spawn_reconcile_loop(
        Arc::clone(&st),
        ctx,
        hub,
        LoggingActuator::new(),
        Duration::from_millis(2),
    );

    let req = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .body(axum::body::Body::from("switch everything on"))
        .unwrap();
    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let done = wait_for(&st, |s| s.decode_failures == 1).await;
    assert_eq!(done.twin.state, StateVector::all_off());
    assert_eq!(done.twin.twin_updates, 0);

    task.abort();
}
