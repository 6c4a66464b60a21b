use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An operation awaiting a second party's sign-off (e.g. a bank-transfer
/// payment). Ephemeral: created on submission, destroyed on resolution or an
/// explicit refresh. Never a source of truth for money or stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PendingApproval {
    pub id: Uuid,
    pub submitted_by: String,
    pub reference: String,
    pub amount: Option<Decimal>,
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
    /// Set when the approver side detects the submitter dropped mid-flight;
    /// approving is refused until a refresh re-establishes state.
    pub submitter_disconnected: bool,
}

impl PendingApproval {
    pub fn new(
        submitted_by: String,
        reference: String,
        amount: Option<Decimal>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submitted_by,
            reference,
            amount,
            detail,
            submitted_at: Utc::now(),
            submitter_disconnected: false,
        }
    }
}

/// Outcome of a pending approval, handed back to the blocked submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalDecision {
    pub approval_id: Uuid,
    pub approved: bool,
    pub notes: Option<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}
