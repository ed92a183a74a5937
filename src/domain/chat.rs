use super::party::{SellableId, UserId};
use super::transaction::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConversationId = u64;
pub type MessageId = u64;

/// A messaging thread between a fixed set of participants.
///
/// Created lazily the first time two users interact; never deleted. The
/// participant set is sorted and deduplicated by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }
}

/// Immutable once created, except for read-receipt association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub sellable_id: Option<SellableId>,
    pub transaction_id: Option<TransactionId>,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// System messages narrate a transaction or dispute state change inside
    /// the chat transcript; they are the only messages tagged with a
    /// transaction.
    pub fn is_system(&self) -> bool {
        self.transaction_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub sellable_id: Option<SellableId>,
    pub transaction_id: Option<TransactionId>,
}

impl NewMessage {
    /// A free-text chat message, optionally advertising a sellable.
    pub fn chat(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
        sellable_id: Option<SellableId>,
    ) -> Self {
        Self {
            conversation_id,
            sender_id,
            content,
            sellable_id,
            transaction_id: None,
        }
    }

    /// A system message attributed to the acting user. The store stamps the
    /// transaction tag when it commits the mutation the message narrates.
    pub fn system(conversation_id: ConversationId, sender_id: UserId, content: String) -> Self {
        Self {
            conversation_id,
            sender_id,
            content,
            sellable_id: None,
            transaction_id: None,
        }
    }
}

/// Marks a message read by a user; unique per (message, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub read_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_are_transaction_tagged() {
        let mut message = Message {
            id: 1,
            conversation_id: 1,
            sender_id: 7,
            content: "hello".to_string(),
            sellable_id: None,
            transaction_id: None,
            sent_at: Utc::now(),
        };
        assert!(!message.is_system());
        message.transaction_id = Some(42);
        assert!(message.is_system());
    }
}
