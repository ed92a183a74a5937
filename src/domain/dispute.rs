use super::party::UserId;
use super::transaction::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DisputeId = u64;
pub type DisputeMessageId = u64;

/// `Dismissed` is declared in the schema but never produced; `Resolved` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Pending,
    Resolved,
    Dismissed,
}

/// A complaint raised against a transaction. At most one per transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub transaction_id: TransactionId,
    pub complainant_id: UserId,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDispute {
    pub transaction_id: TransactionId,
    pub complainant_id: UserId,
    pub reason: String,
}

/// Append-only free text inside a dispute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeMessage {
    pub id: DisputeMessageId,
    pub dispute_id: DisputeId,
    pub sender_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDisputeMessage {
    pub dispute_id: DisputeId,
    pub sender_id: UserId,
    pub body: String,
}

/// An admin's terminal verdict on a dispute.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub text: String,
    pub resolved_by: UserId,
}
