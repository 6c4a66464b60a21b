use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events published by the services. Consumers (pending-approvals
/// feed, UI badges, audit sinks) subscribe through the broadcast side; the
/// services themselves only ever talk to the mpsc [`EventSender`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Transfer lifecycle
    TransferCreated {
        transfer_id: Uuid,
        variant_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        quantity: Decimal,
    },
    TransferApproved {
        transfer_id: Uuid,
        actor: String,
    },
    TransferReceived {
        transfer_id: Uuid,
        actor: String,
    },
    TransferCancelled {
        transfer_id: Uuid,
        actor: String,
        reason: Option<String>,
    },

    // Stock movements outside the transfer workflow
    StockReceived {
        variant_id: Uuid,
        warehouse_id: Uuid,
        quantity: Decimal,
    },
    StockAdjusted {
        variant_id: Uuid,
        warehouse_id: Uuid,
        old_quantity: Decimal,
        new_quantity: Decimal,
        reason: String,
    },
    StockRecordPruned {
        variant_id: Uuid,
        warehouse_id: Uuid,
    },

    // Remote-approval channel
    ApprovalSubmitted {
        approval_id: Uuid,
        submitted_by: String,
    },
    /// Raised once per batch: only on the empty-to-nonempty transition of
    /// the pending set, re-armed when the queue drains to zero.
    ApprovalQueueAlert {
        pending_count: usize,
    },
    ApprovalResolved {
        approval_id: Uuid,
        approved: bool,
        resolved_by: String,
    },

    // Warehouse registry
    WarehouseCreated(Uuid),
    WarehouseDeactivated(Uuid),
    WarehouseReactivated(Uuid),

    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Sending half handed to every service.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event queue: logs every event and republishes it on the
/// broadcast feed for interested parties. Lossy by design on the broadcast
/// side (a lagging subscriber misses events, the ledger does not care).
pub async fn process_events(mut receiver: mpsc::Receiver<Event>, feed: broadcast::Sender<Event>) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::TransferCreated {
                transfer_id,
                quantity,
                ..
            } => info!(%transfer_id, %quantity, "transfer created"),
            Event::TransferApproved { transfer_id, actor } => {
                info!(%transfer_id, %actor, "transfer approved")
            }
            Event::TransferReceived { transfer_id, actor } => {
                info!(%transfer_id, %actor, "transfer received")
            }
            Event::TransferCancelled { transfer_id, actor, .. } => {
                info!(%transfer_id, %actor, "transfer cancelled")
            }
            Event::ApprovalQueueAlert { pending_count } => {
                info!(%pending_count, "approval queue alert")
            }
            other => debug!(event = ?other, "event"),
        }
        // A send error just means no live subscriber; nothing to notify.
        let _ = feed.send(event);
    }
    warn!("event processor stopped: all senders dropped");
}
