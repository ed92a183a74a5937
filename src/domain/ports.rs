use super::chat::{Conversation, ConversationId, Message, MessageId, NewMessage, ReadReceipt};
use super::dispute::{
    Dispute, DisputeId, DisputeMessage, NewDispute, NewDisputeMessage, Resolution,
};
use super::party::{
    Business, BusinessFilter, BusinessId, Location, LocationId, NewBusiness, NewLocation,
    NewReview, NewSellable, NewUser, Review, SavedBusiness, Sellable, SellableFilter, SellableId,
    User, UserId,
};
use super::transaction::{NewTransaction, StatusChange, Transaction, TransactionId, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Reference data and directory CRUD: users, locations, businesses,
/// sellables, bookmarks, reviews. Stores stamp all timestamps and allocate
/// all ids (auto-increment semantics).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn insert_user(&self, new: NewUser) -> Result<User>;
    async fn user(&self, id: UserId) -> Result<Option<User>>;
    async fn insert_location(&self, new: NewLocation) -> Result<Location>;
    async fn location(&self, id: LocationId) -> Result<Option<Location>>;
    async fn insert_business(&self, new: NewBusiness) -> Result<Business>;
    async fn business(&self, id: BusinessId) -> Result<Option<Business>>;
    async fn businesses(&self, filter: &BusinessFilter) -> Result<Vec<Business>>;
    async fn insert_sellable(&self, new: NewSellable) -> Result<Sellable>;
    async fn sellable(&self, id: SellableId) -> Result<Option<Sellable>>;
    async fn sellables(&self, filter: &SellableFilter) -> Result<Vec<Sellable>>;
    /// Fails with `Conflict` when the bookmark already exists.
    async fn save_business(&self, user: UserId, business: BusinessId) -> Result<SavedBusiness>;
    /// Returns whether a bookmark was actually removed.
    async fn unsave_business(&self, user: UserId, business: BusinessId) -> Result<bool>;
    async fn saved_businesses(&self, user: UserId) -> Result<Vec<Business>>;
    async fn insert_review(&self, new: NewReview) -> Result<Review>;
    async fn reviews(&self, business: BusinessId) -> Result<Vec<Review>>;
}

/// Conversations, messages, and read receipts. Appending a message bumps the
/// conversation's `updated_at`.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The conversation whose participant set is exactly `{a, b}`, if any.
    async fn find_direct(&self, a: UserId, b: UserId) -> Result<Option<Conversation>>;
    async fn create_conversation(&self, participants: Vec<UserId>) -> Result<Conversation>;
    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>>;
    /// Every conversation the user participates in, most recently active
    /// first.
    async fn conversations_for(&self, user: UserId) -> Result<Vec<Conversation>>;
    async fn append_message(&self, new: NewMessage) -> Result<Message>;
    /// Messages of one conversation in send order.
    async fn messages(&self, conversation: ConversationId) -> Result<Vec<Message>>;
    async fn latest_message(&self, conversation: ConversationId) -> Result<Option<Message>>;
    /// Idempotent: returns `None` when the user already read the message.
    async fn mark_read(&self, message: MessageId, user: UserId) -> Result<Option<ReadReceipt>>;
    async fn unread_count(&self, conversation: ConversationId, user: UserId) -> Result<u64>;
}

/// Transactions and their audit trail.
///
/// The mutating methods take the system message narrating the change and
/// commit entity + message as one unit; the store stamps the allocated
/// transaction id onto the message's transaction tag. Expected-status checks
/// run inside that commit, which is what makes them race-safe.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, new: NewTransaction, audit: NewMessage) -> Result<(Transaction, Message)>;
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;
    /// Fails with `InvalidTransition` when the current status is no longer
    /// `expect`.
    async fn update_status(
        &self,
        id: TransactionId,
        expect: TransactionStatus,
        change: StatusChange,
        audit: NewMessage,
    ) -> Result<(Transaction, Message)>;
    /// Every transaction, in creation order. Feeds the ledger export.
    async fn all(&self) -> Result<Vec<Transaction>>;
}

/// Disputes, their message threads, and their audit trail. Same atomic
/// commit contract as [`TransactionStore`].
#[async_trait]
pub trait DisputeStore: Send + Sync {
    /// Creates the dispute in `Pending` together with its opening
    /// [`DisputeMessage`] (the reason, from the complainant). Fails with
    /// `Conflict` when the transaction already has a dispute.
    async fn open(&self, new: NewDispute, audit: NewMessage) -> Result<(Dispute, Message)>;
    async fn get(&self, id: DisputeId) -> Result<Option<Dispute>>;
    async fn for_transaction(&self, transaction: TransactionId) -> Result<Option<Dispute>>;
    async fn append_message(
        &self,
        new: NewDisputeMessage,
        audit: NewMessage,
    ) -> Result<(DisputeMessage, Message)>;
    /// Fails with `InvalidTransition` unless the dispute is still `Pending`.
    async fn resolve(
        &self,
        id: DisputeId,
        resolution: Resolution,
        audit: NewMessage,
    ) -> Result<(Dispute, Message)>;
    /// Dispute thread in send order.
    async fn messages(&self, dispute: DisputeId) -> Result<Vec<DisputeMessage>>;
}

pub type DirectoryStoreBox = Box<dyn DirectoryStore>;
pub type ChatStoreBox = Box<dyn ChatStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type DisputeStoreBox = Box<dyn DisputeStore>;
