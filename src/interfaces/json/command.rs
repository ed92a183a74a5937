use crate::domain::chat::ConversationId;
use crate::domain::dispute::DisputeId;
use crate::domain::party::{
    BusinessId, LocationId, SellableId, SellableKind, UserId, UserRole,
};
use crate::domain::transaction::{ItemInput, TransactionId, TransactionStatus};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One line of a command script: the logical request payloads of the JSON
/// boundary, tagged by operation name. Workflow payloads mirror the REST
/// bodies (`create_transaction` is `POST transactions`, and so on); the
/// seeding and directory commands exist so a script is self-contained.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    // Seeding / directory mutations
    RegisterUser {
        name: String,
        email: String,
        role: UserRole,
    },
    AddLocation {
        city: String,
        province: String,
        postal_code: String,
    },
    RegisterBusiness {
        actor: UserId,
        name: String,
        description: Option<String>,
        category: Option<String>,
        location_id: Option<LocationId>,
    },
    AddSellable {
        actor: UserId,
        business_id: BusinessId,
        name: String,
        kind: SellableKind,
        price: Decimal,
        description: Option<String>,
    },

    // Chat
    OpenConversation {
        actor: UserId,
        user_id: UserId,
    },
    SendMessage {
        actor: UserId,
        conversation_id: ConversationId,
        content: String,
        sellable_id: Option<SellableId>,
    },
    ListMessages {
        actor: UserId,
        conversation_id: ConversationId,
    },
    MarkRead {
        actor: UserId,
        conversation_id: ConversationId,
    },
    ListConversations {
        actor: UserId,
    },

    // Workflow engine
    CreateTransaction {
        actor: UserId,
        customer_id: UserId,
        business_id: BusinessId,
        items: Vec<ItemInput>,
        notes: Option<String>,
        conversation_id: Option<ConversationId>,
    },
    UpdateTransactionStatus {
        actor: UserId,
        transaction_id: TransactionId,
        status: TransactionStatus,
        reason: Option<String>,
        conversation_id: Option<ConversationId>,
    },
    ShowTransaction {
        actor: UserId,
        transaction_id: TransactionId,
    },
    OpenDispute {
        actor: UserId,
        transaction_id: TransactionId,
        reason: String,
        conversation_id: Option<ConversationId>,
    },
    AddDisputeMessage {
        actor: UserId,
        dispute_id: DisputeId,
        message: String,
        conversation_id: Option<ConversationId>,
    },
    ResolveDispute {
        actor: UserId,
        dispute_id: DisputeId,
        resolution: String,
        conversation_id: Option<ConversationId>,
    },
    ShowDispute {
        actor: UserId,
        dispute_id: DisputeId,
    },

    // Directory queries
    ListBusinesses {
        category: Option<String>,
        location_id: Option<LocationId>,
        verified: Option<bool>,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
        query: Option<String>,
    },
    ListSellables {
        kind: Option<SellableKind>,
        business_id: Option<BusinessId>,
        category: Option<String>,
        location_id: Option<LocationId>,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
        query: Option<String>,
    },
    Search {
        query: String,
    },
    SaveBusiness {
        actor: UserId,
        business_id: BusinessId,
    },
    UnsaveBusiness {
        actor: UserId,
        business_id: BusinessId,
    },
    ListSavedBusinesses {
        actor: UserId,
    },
    AddReview {
        actor: UserId,
        business_id: BusinessId,
        rating: u8,
        body: Option<String>,
    },
    ListReviews {
        business_id: BusinessId,
    },
}
