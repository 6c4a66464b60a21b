use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{ApprovalDecision, PendingApproval};

lazy_static! {
    static ref APPROVALS_SUBMITTED: IntCounter = register_int_counter!(
        "approvals_submitted_total",
        "Total number of operations submitted for remote approval"
    )
    .expect("metric can be created");
    static ref APPROVALS_RESOLVED: IntCounterVec = register_int_counter_vec!(
        "approvals_resolved_total",
        "Total number of resolved approvals",
        &["outcome"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitApproval {
    #[validate(length(min = 1, max = 100))]
    pub submitted_by: String,
    #[validate(length(min = 1, max = 200))]
    pub reference: String,
    pub amount: Option<Decimal>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,
}

struct PendingEntry {
    approval: PendingApproval,
    waiter: Option<oneshot::Sender<ApprovalDecision>>,
}

/// Best-effort second-party sign-off channel.
///
/// The channel only gates *when* the submitter proceeds; it never mutates
/// stock or money itself, so losing it can never leave a ledger operation
/// half-applied. Alerting is edge-triggered: one alert per transition of
/// the pending set from empty to nonempty, re-armed when it drains to zero.
pub struct ApprovalService {
    pending: DashMap<Uuid, PendingEntry>,
    pending_count: AtomicUsize,
    event_sender: EventSender,
}

impl ApprovalService {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            pending: DashMap::new(),
            pending_count: AtomicUsize::new(0),
            event_sender,
        }
    }

    /// Enqueues an operation for sign-off and returns immediately.
    #[instrument(skip(self, cmd), fields(submitted_by = %cmd.submitted_by))]
    pub async fn submit(&self, cmd: SubmitApproval) -> Result<PendingApproval, ServiceError> {
        self.submit_inner(cmd, None).await
    }

    /// Enqueues an operation and blocks until it is resolved or the local
    /// timeout elapses. The timeout is advisory: on expiry the entry stays
    /// pending and `None` is returned.
    #[instrument(skip(self, cmd), fields(submitted_by = %cmd.submitted_by))]
    pub async fn submit_and_wait(
        &self,
        cmd: SubmitApproval,
        timeout: Duration,
    ) -> Result<(PendingApproval, Option<ApprovalDecision>), ServiceError> {
        let (tx, rx) = oneshot::channel();
        let approval = self.submit_inner(cmd, Some(tx)).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(decision)) => Ok((approval, Some(decision))),
            // Entry dropped without a decision (queue refresh) or timeout:
            // no decision reached the submitter.
            Ok(Err(_)) | Err(_) => Ok((approval, None)),
        }
    }

    async fn submit_inner(
        &self,
        cmd: SubmitApproval,
        waiter: Option<oneshot::Sender<ApprovalDecision>>,
    ) -> Result<PendingApproval, ServiceError> {
        cmd.validate()?;
        if let Some(amount) = cmd.amount {
            if amount <= Decimal::ZERO {
                return Err(ServiceError::validation("amount must be positive"));
            }
        }

        let approval =
            PendingApproval::new(cmd.submitted_by, cmd.reference, cmd.amount, cmd.detail);
        self.pending.insert(
            approval.id,
            PendingEntry {
                approval: approval.clone(),
                waiter,
            },
        );
        let previously_pending = self.pending_count.fetch_add(1, Ordering::SeqCst);

        APPROVALS_SUBMITTED.inc();
        self.emit(Event::ApprovalSubmitted {
            approval_id: approval.id,
            submitted_by: approval.submitted_by.clone(),
        })
        .await;
        if previously_pending == 0 {
            self.emit(Event::ApprovalQueueAlert {
                pending_count: self.pending.len(),
            })
            .await;
        }
        Ok(approval)
    }

    /// Removes the entry and hands the decision back to a blocked
    /// submitter. Approving an entry whose submitter is flagged
    /// disconnected is refused; rejecting it remains possible.
    #[instrument(skip(self, notes))]
    pub async fn resolve(
        &self,
        approval_id: Uuid,
        approved: bool,
        notes: Option<String>,
        resolved_by: &str,
    ) -> Result<ApprovalDecision, ServiceError> {
        if resolved_by.trim().is_empty() {
            return Err(ServiceError::validation("resolver is required"));
        }
        {
            let entry = self.pending.get(&approval_id).ok_or_else(|| {
                ServiceError::not_found(format!("approval {} not found", approval_id))
            })?;
            if approved && entry.approval.submitter_disconnected {
                return Err(ServiceError::validation(
                    "submitter is disconnected; approval is disabled until refresh",
                ));
            }
        }
        let (_, entry) = self.pending.remove(&approval_id).ok_or_else(|| {
            ServiceError::not_found(format!("approval {} not found", approval_id))
        })?;
        self.pending_count.fetch_sub(1, Ordering::SeqCst);

        let decision = ApprovalDecision {
            approval_id,
            approved,
            notes,
            resolved_by: resolved_by.to_string(),
            resolved_at: Utc::now(),
        };
        if let Some(waiter) = entry.waiter {
            // Submitter may have timed out and walked away.
            let _ = waiter.send(decision.clone());
        }

        info!(%approval_id, approved, "approval resolved");
        APPROVALS_RESOLVED
            .with_label_values(&[if approved { "approved" } else { "rejected" }])
            .inc();
        self.emit(Event::ApprovalResolved {
            approval_id,
            approved,
            resolved_by: resolved_by.to_string(),
        })
        .await;
        Ok(decision)
    }

    /// Flags an entry whose submitter dropped mid-flight: it cannot be
    /// approved (nothing to confirm against) until state is re-established.
    #[instrument(skip(self))]
    pub fn mark_disconnected(&self, approval_id: Uuid) -> Result<PendingApproval, ServiceError> {
        let mut entry = self.pending.get_mut(&approval_id).ok_or_else(|| {
            ServiceError::not_found(format!("approval {} not found", approval_id))
        })?;
        entry.approval.submitter_disconnected = true;
        Ok(entry.approval.clone())
    }

    /// The submitter came back: clears the disconnect flag so the entry can
    /// be approved again.
    #[instrument(skip(self))]
    pub fn reconnect(&self, approval_id: Uuid) -> Result<PendingApproval, ServiceError> {
        let mut entry = self.pending.get_mut(&approval_id).ok_or_else(|| {
            ServiceError::not_found(format!("approval {} not found", approval_id))
        })?;
        entry.approval.submitter_disconnected = false;
        Ok(entry.approval.clone())
    }

    /// Approver-side queue refresh: drops entries whose submitter is gone
    /// (their waiters are woken with no decision) and returns the live
    /// pending set.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Vec<PendingApproval> {
        let stale: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|entry| entry.approval.submitter_disconnected)
            .map(|entry| *entry.key())
            .collect();
        for id in stale {
            if self.pending.remove(&id).is_some() {
                self.pending_count.fetch_sub(1, Ordering::SeqCst);
                warn!(approval_id = %id, "dropped stale approval on refresh");
            }
        }
        self.pending_list()
    }

    pub fn pending_list(&self) -> Vec<PendingApproval> {
        let mut approvals: Vec<PendingApproval> = self
            .pending
            .iter()
            .map(|entry| entry.approval.clone())
            .collect();
        approvals.sort_by_key(|a| a.submitted_at);
        approvals
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "event publication failed");
        }
    }
}
