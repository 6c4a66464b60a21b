use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of an inter-warehouse transfer. Transitions are one-directional;
/// `Completed` and `Cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }
}

/// One audited step of a transfer's lifecycle: who moved it, when, and from
/// where to where. Appended on every transition, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransferTransition {
    pub from: TransferStatus,
    pub to: TransferStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A request to move a quantity of one product variant between warehouses.
///
/// The quantity is reserved at the source the moment the transfer is admitted,
/// so it leaves the sellable pool before it physically moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transfer {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub quantity: Decimal,
    pub reason: String,
    pub status: TransferStatus,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub transitions: Vec<TransferTransition>,
}

impl Transfer {
    pub fn new(
        variant_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        quantity: Decimal,
        reason: String,
        requested_by: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            variant_id,
            source_warehouse_id,
            destination_warehouse_id,
            quantity,
            reason,
            status: TransferStatus::Pending,
            requested_by,
            created_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    /// Moves the transfer to `to`, appending the audit record.
    pub fn transition(&mut self, to: TransferStatus, actor: &str, note: Option<String>) {
        self.transitions.push(TransferTransition {
            from: self.status,
            to,
            actor: actor.to_string(),
            at: Utc::now(),
            note,
        });
        self.status = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransferStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
        assert_eq!(TransferStatus::InTransit.to_string(), "in_transit");
    }

    #[test]
    fn transition_appends_audit_trail() {
        let mut transfer = Transfer::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(3),
            "restock".into(),
            "ana".into(),
        );
        transfer.transition(TransferStatus::InTransit, "berta", None);
        transfer.transition(TransferStatus::Completed, "carla", Some("received".into()));

        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.transitions.len(), 2);
        assert_eq!(transfer.transitions[0].from, TransferStatus::Pending);
        assert_eq!(transfer.transitions[1].actor, "carla");
    }
}
