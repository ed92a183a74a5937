use crate::domain::chat::{Conversation, ConversationId, Message, NewMessage};
use crate::domain::dispute::{
    Dispute, DisputeId, DisputeMessage, NewDispute, NewDisputeMessage, Resolution,
};
use crate::domain::money::{Price, Quantity};
use crate::domain::party::{Business, BusinessId, User, UserId};
use crate::domain::ports::{ChatStoreBox, DirectoryStoreBox, DisputeStoreBox, TransactionStoreBox};
use crate::domain::transaction::{
    ItemInput, NewTransaction, PartyRole, StatusChange, Transaction, TransactionId,
    TransactionItem, TransactionStatus, transition_allowed,
};
use crate::error::{EngineError, Result};
use tracing::{debug, info};

/// The transaction/dispute workflow engine.
///
/// Owns the lifecycle of a transaction (created from chat, approved,
/// completed, marked incomplete) and the dispute that may attach to it,
/// enforcing role-based transition legality and emitting a system message
/// into the originating conversation for every state change. Every operation
/// takes the acting user explicitly; there is no ambient auth context.
pub struct Engine {
    directory: DirectoryStoreBox,
    chat: ChatStoreBox,
    transactions: TransactionStoreBox,
    disputes: DisputeStoreBox,
}

impl Engine {
    pub fn new(
        directory: DirectoryStoreBox,
        chat: ChatStoreBox,
        transactions: TransactionStoreBox,
        disputes: DisputeStoreBox,
    ) -> Self {
        Self {
            directory,
            chat,
            transactions,
            disputes,
        }
    }

    /// Creates a transaction in `Pending` on behalf of the business owner.
    ///
    /// Item prices are taken as supplied (the negotiated price), not
    /// re-derived from the sellable's live price.
    pub async fn create_transaction(
        &self,
        actor: UserId,
        business_id: BusinessId,
        customer_id: UserId,
        items: Vec<ItemInput>,
        notes: Option<String>,
        conversation_id: Option<ConversationId>,
    ) -> Result<(Transaction, Message)> {
        let business = self.require_business(business_id).await?;
        if business.owner_id != actor {
            debug!(actor, business = business_id, "transaction create rejected: not the owner");
            return Err(EngineError::Unauthorized);
        }
        self.require_user(customer_id).await?;
        if items.is_empty() {
            return Err(EngineError::Validation(
                "at least one item is required".to_string(),
            ));
        }
        let mut checked = Vec::with_capacity(items.len());
        for item in items {
            if self.directory.sellable(item.sellable_id).await?.is_none() {
                return Err(EngineError::NotFound("sellable"));
            }
            checked.push(TransactionItem {
                sellable_id: item.sellable_id,
                quantity: Quantity::new(item.quantity)?,
                price: Price::new(item.price)?,
            });
        }
        let conversation = self
            .resolve_conversation(conversation_id, customer_id, business.owner_id)
            .await?;
        let audit = NewMessage::system(
            conversation.id,
            actor,
            "Created a new transaction.".to_string(),
        );
        let new = NewTransaction {
            customer_id,
            business_id,
            items: checked,
            notes,
        };
        let (transaction, message) = self.transactions.create(new, audit).await?;
        info!(
            transaction = transaction.id,
            business = business_id,
            customer = customer_id,
            total = %transaction.total,
            "transaction created"
        );
        Ok((transaction, message))
    }

    /// Applies a status transition if the (role, from, to) triple is in the
    /// legal table. An `Incomplete` transition requires a reason, which is
    /// appended to the transaction's notes.
    pub async fn update_transaction_status(
        &self,
        actor: UserId,
        transaction_id: TransactionId,
        to: TransactionStatus,
        reason: Option<String>,
        conversation_id: Option<ConversationId>,
    ) -> Result<(Transaction, Message)> {
        let transaction = self.require_transaction(transaction_id).await?;
        let business = self.require_business(transaction.business_id).await?;
        let role = if transaction.customer_id == actor {
            PartyRole::Customer
        } else if business.owner_id == actor {
            PartyRole::Owner
        } else {
            return Err(EngineError::Unauthorized);
        };
        if !transition_allowed(role, transaction.status, to) {
            debug!(
                transaction = transaction_id,
                from = ?transaction.status,
                to = ?to,
                "status transition rejected"
            );
            return Err(EngineError::InvalidTransition);
        }

        let mut change = StatusChange {
            to,
            append_note: None,
        };
        let content = match to {
            TransactionStatus::Approved => "approved the transaction.".to_string(),
            TransactionStatus::Completed => match role {
                PartyRole::Customer => "marked the transaction as completed.".to_string(),
                PartyRole::Owner => "confirmed the transaction is completed.".to_string(),
            },
            TransactionStatus::Incomplete => {
                let reason = reason.filter(|r| !r.trim().is_empty()).ok_or_else(|| {
                    EngineError::Validation(
                        "a reason is required when marking a transaction incomplete".to_string(),
                    )
                })?;
                let content = format!("marked the transaction as incomplete: {reason}");
                change.append_note = Some(reason);
                content
            }
            // No legal edge leads back to Pending or into Finished.
            TransactionStatus::Pending | TransactionStatus::Finished => {
                return Err(EngineError::InvalidTransition);
            }
        };

        let conversation = self
            .resolve_conversation(conversation_id, transaction.customer_id, business.owner_id)
            .await?;
        let audit = NewMessage::system(conversation.id, actor, content);
        let (updated, message) = self
            .transactions
            .update_status(transaction_id, transaction.status, change, audit)
            .await?;
        info!(
            transaction = transaction_id,
            from = ?transaction.status,
            to = ?updated.status,
            "transaction status updated"
        );
        Ok((updated, message))
    }

    /// Opens the (single) dispute on a transaction. The reason doubles as
    /// the opening message of the dispute thread.
    pub async fn open_dispute(
        &self,
        actor: UserId,
        transaction_id: TransactionId,
        reason: String,
        conversation_id: Option<ConversationId>,
    ) -> Result<(Dispute, Message)> {
        let transaction = self.require_transaction(transaction_id).await?;
        let business = self.require_business(transaction.business_id).await?;
        if transaction.customer_id != actor && business.owner_id != actor {
            return Err(EngineError::Unauthorized);
        }
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "a reason is required to open a dispute".to_string(),
            ));
        }
        let conversation = self
            .resolve_conversation(conversation_id, transaction.customer_id, business.owner_id)
            .await?;
        let audit = NewMessage::system(
            conversation.id,
            actor,
            format!("Created a dispute: {reason}"),
        );
        let new = NewDispute {
            transaction_id,
            complainant_id: actor,
            reason,
        };
        let (dispute, message) = self.disputes.open(new, audit).await?;
        info!(
            dispute = dispute.id,
            transaction = transaction_id,
            complainant = actor,
            "dispute opened"
        );
        Ok((dispute, message))
    }

    /// Appends to the dispute thread and mirrors the text into the chat
    /// transcript. Open to both parties and admins.
    pub async fn add_dispute_message(
        &self,
        actor: UserId,
        dispute_id: DisputeId,
        body: String,
        conversation_id: Option<ConversationId>,
    ) -> Result<(DisputeMessage, Message)> {
        let dispute = self.require_dispute(dispute_id).await?;
        let transaction = self.require_transaction(dispute.transaction_id).await?;
        let business = self.require_business(transaction.business_id).await?;
        let user = self.require_user(actor).await?;
        if transaction.customer_id != actor && business.owner_id != actor && !user.is_admin() {
            return Err(EngineError::Unauthorized);
        }
        if body.trim().is_empty() {
            return Err(EngineError::Validation(
                "message text is required".to_string(),
            ));
        }
        let conversation = self
            .resolve_conversation(conversation_id, transaction.customer_id, business.owner_id)
            .await?;
        let audit = NewMessage::system(
            conversation.id,
            actor,
            format!("Added a message to the dispute: {body}"),
        );
        let new = NewDisputeMessage {
            dispute_id,
            sender_id: actor,
            body,
        };
        self.disputes.append_message(new, audit).await
    }

    /// Resolves a pending dispute. Admins only; terminal.
    pub async fn resolve_dispute(
        &self,
        actor: UserId,
        dispute_id: DisputeId,
        resolution: String,
        conversation_id: Option<ConversationId>,
    ) -> Result<(Dispute, Message)> {
        let user = self.require_user(actor).await?;
        if !user.is_admin() {
            return Err(EngineError::Unauthorized);
        }
        if resolution.trim().is_empty() {
            return Err(EngineError::Validation(
                "a resolution is required".to_string(),
            ));
        }
        let dispute = self.require_dispute(dispute_id).await?;
        let transaction = self.require_transaction(dispute.transaction_id).await?;
        let business = self.require_business(transaction.business_id).await?;
        let conversation = self
            .resolve_conversation(conversation_id, transaction.customer_id, business.owner_id)
            .await?;
        let audit = NewMessage::system(
            conversation.id,
            actor,
            format!("Resolved the dispute: {resolution}"),
        );
        let verdict = Resolution {
            text: resolution,
            resolved_by: actor,
        };
        let (resolved, message) = self.disputes.resolve(dispute_id, verdict, audit).await?;
        info!(dispute = dispute_id, resolver = actor, "dispute resolved");
        Ok((resolved, message))
    }

    /// Transaction details, restricted to the customer, the owner, or an
    /// admin.
    pub async fn transaction(&self, actor: UserId, id: TransactionId) -> Result<Transaction> {
        let transaction = self.require_transaction(id).await?;
        let business = self.require_business(transaction.business_id).await?;
        let user = self.require_user(actor).await?;
        if transaction.customer_id != actor && business.owner_id != actor && !user.is_admin() {
            return Err(EngineError::Unauthorized);
        }
        Ok(transaction)
    }

    /// Dispute details plus its thread, restricted like [`Self::transaction`].
    pub async fn dispute(
        &self,
        actor: UserId,
        id: DisputeId,
    ) -> Result<(Dispute, Vec<DisputeMessage>)> {
        let dispute = self.require_dispute(id).await?;
        let transaction = self.require_transaction(dispute.transaction_id).await?;
        let business = self.require_business(transaction.business_id).await?;
        let user = self.require_user(actor).await?;
        if transaction.customer_id != actor && business.owner_id != actor && !user.is_admin() {
            return Err(EngineError::Unauthorized);
        }
        let messages = self.disputes.messages(id).await?;
        Ok((dispute, messages))
    }

    /// Uses the supplied conversation when given (it must contain both
    /// transacting parties), otherwise finds or lazily creates the direct
    /// conversation between them.
    async fn resolve_conversation(
        &self,
        explicit: Option<ConversationId>,
        customer: UserId,
        owner: UserId,
    ) -> Result<Conversation> {
        match explicit {
            Some(id) => {
                let conversation = self
                    .chat
                    .conversation(id)
                    .await?
                    .ok_or(EngineError::NotFound("conversation"))?;
                if !conversation.has_participant(customer) || !conversation.has_participant(owner) {
                    return Err(EngineError::Validation(
                        "conversation does not include both transacting parties".to_string(),
                    ));
                }
                Ok(conversation)
            }
            None => match self.chat.find_direct(customer, owner).await? {
                Some(conversation) => Ok(conversation),
                None => self.chat.create_conversation(vec![customer, owner]).await,
            },
        }
    }

    async fn require_user(&self, id: UserId) -> Result<User> {
        self.directory
            .user(id)
            .await?
            .ok_or(EngineError::NotFound("user"))
    }

    async fn require_business(&self, id: BusinessId) -> Result<Business> {
        self.directory
            .business(id)
            .await?
            .ok_or(EngineError::NotFound("business"))
    }

    async fn require_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or(EngineError::NotFound("transaction"))
    }

    async fn require_dispute(&self, id: DisputeId) -> Result<Dispute> {
        self.disputes
            .get(id)
            .await?
            .ok_or(EngineError::NotFound("dispute"))
    }
}
