pub mod approval;
pub mod stock;
pub mod transfer;
pub mod variant;
pub mod warehouse;

pub use approval::{ApprovalDecision, PendingApproval};
pub use stock::{StockKey, StockRecord};
pub use transfer::{Transfer, TransferStatus, TransferTransition};
pub use variant::ProductVariant;
pub use warehouse::Warehouse;
