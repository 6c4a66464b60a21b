mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use bodega_api::errors::ServiceError;
use bodega_api::events::Event;
use bodega_api::services::approvals::SubmitApproval;
use common::*;
use rust_decimal_macros::dec;
use tokio::sync::broadcast;
use uuid::Uuid;

fn submit_cmd(submitter: &str, reference: &str) -> SubmitApproval {
    SubmitApproval {
        submitted_by: submitter.into(),
        reference: reference.into(),
        amount: Some(dec!(45000)),
        detail: serde_json::json!({"payment_method": "bank_transfer"}),
    }
}

/// Pulls events off the feed until one matches, bounded by a timeout so a
/// missing event fails the test instead of hanging it.
async fn next_matching(
    rx: &mut broadcast::Receiver<Event>,
    mut pred: impl FnMut(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("feed open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event before timeout")
}

/// One alert per batch: the alert fires on the empty-to-nonempty transition
/// and stays silent until the queue drains to zero again.
#[tokio::test]
async fn queue_alert_is_edge_triggered() {
    let state = spawn_state().await;
    let mut feed = state.events_feed.subscribe();
    let approvals = &state.services.approvals;

    let first = approvals.submit(submit_cmd("caja-1", "VALE-100")).await.unwrap();
    next_matching(&mut feed, |e| matches!(e, Event::ApprovalQueueAlert { .. })).await;

    // Second arrival while the queue is nonempty: submitted event, no alert.
    let second = approvals.submit(submit_cmd("caja-2", "VALE-101")).await.unwrap();
    let mut saw_alert = false;
    next_matching(&mut feed, |e| {
        if matches!(e, Event::ApprovalQueueAlert { .. }) {
            saw_alert = true;
        }
        matches!(e, Event::ApprovalSubmitted { approval_id, .. } if *approval_id == second.id)
    })
    .await;
    assert!(!saw_alert, "no alert for arrivals into a nonempty queue");

    // Drain to zero, then the next submission alerts again.
    approvals.resolve(first.id, true, None, "supervisor").await.unwrap();
    approvals.resolve(second.id, false, None, "supervisor").await.unwrap();
    assert_eq!(approvals.pending_count(), 0);

    approvals.submit(submit_cmd("caja-1", "VALE-102")).await.unwrap();
    next_matching(&mut feed, |e| matches!(e, Event::ApprovalQueueAlert { .. })).await;
}

#[tokio::test]
async fn submitter_blocks_until_resolution() {
    let state = spawn_state().await;
    let approvals = state.services.approvals.clone();

    let resolver = {
        let approvals = approvals.clone();
        let state = state.clone();
        tokio::spawn(async move {
            // Wait until the entry shows up in the pending feed, then act.
            let mut feed = state.events_feed.subscribe();
            let id = loop {
                if let Some(p) = approvals.pending_list().first() {
                    break p.id;
                }
                let _ = tokio::time::timeout(Duration::from_millis(50), feed.recv()).await;
            };
            approvals
                .resolve(id, true, Some("ok to charge".into()), "supervisor")
                .await
                .unwrap()
        })
    };

    let (approval, decision) = approvals
        .submit_and_wait(submit_cmd("caja-3", "VALE-200"), Duration::from_secs(2))
        .await
        .unwrap();
    let decision = decision.expect("resolved before timeout");
    assert!(decision.approved);
    assert_eq!(decision.approval_id, approval.id);
    assert_eq!(decision.notes.as_deref(), Some("ok to charge"));
    resolver.await.unwrap();

    // Resolution destroyed the entry.
    assert_eq!(approvals.pending_count(), 0);
}

/// The timeout is advisory: the submitter unblocks but the entry stays
/// pending for the approver.
#[tokio::test]
async fn wait_timeout_leaves_the_entry_pending() {
    let state = spawn_state().await;
    let approvals = &state.services.approvals;

    let (approval, decision) = approvals
        .submit_and_wait(submit_cmd("caja-4", "VALE-300"), Duration::from_millis(20))
        .await
        .unwrap();
    assert!(decision.is_none());
    assert_eq!(approvals.pending_count(), 1);

    // The approver can still resolve it afterwards.
    approvals
        .resolve(approval.id, false, None, "supervisor")
        .await
        .unwrap();
    assert_eq!(approvals.pending_count(), 0);
}

#[tokio::test]
async fn disconnected_submitter_disables_approval_until_reconnect() {
    let state = spawn_state().await;
    let approvals = &state.services.approvals;

    let approval = approvals.submit(submit_cmd("caja-5", "VALE-400")).await.unwrap();
    approvals.mark_disconnected(approval.id).unwrap();

    let err = approvals
        .resolve(approval.id, true, None, "supervisor")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("disconnected"));

    // Rejection stays possible; but here the submitter comes back instead.
    approvals.reconnect(approval.id).unwrap();
    approvals
        .resolve(approval.id, true, None, "supervisor")
        .await
        .unwrap();
}

#[tokio::test]
async fn refresh_drops_disconnected_entries() {
    let state = spawn_state().await;
    let approvals = &state.services.approvals;

    let stale = approvals.submit(submit_cmd("caja-6", "VALE-500")).await.unwrap();
    let live = approvals.submit(submit_cmd("caja-7", "VALE-501")).await.unwrap();
    approvals.mark_disconnected(stale.id).unwrap();

    let remaining = approvals.refresh();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, live.id);
    assert_matches!(
        approvals.resolve(stale.id, true, None, "supervisor").await.unwrap_err(),
        ServiceError::NotFound(_)
    );
}

#[tokio::test]
async fn resolving_unknown_approval_is_not_found() {
    let state = spawn_state().await;
    assert_matches!(
        state
            .services
            .approvals
            .resolve(Uuid::new_v4(), true, None, "supervisor")
            .await
            .unwrap_err(),
        ServiceError::NotFound(_)
    );
}
