use crate::domain::chat::{
    Conversation, ConversationId, Message, MessageId, NewMessage, ReadReceipt,
};
use crate::domain::dispute::{
    Dispute, DisputeId, DisputeMessage, DisputeMessageId, DisputeStatus, NewDispute,
    NewDisputeMessage, Resolution,
};
use crate::domain::party::{
    Business, BusinessFilter, BusinessId, Location, LocationId, NewBusiness, NewLocation,
    NewReview, NewSellable, NewUser, Review, ReviewId, SavedBusiness, Sellable, SellableFilter,
    SellableId, User, UserId,
};
use crate::domain::ports::{ChatStore, DirectoryStore, DisputeStore, TransactionStore};
use crate::domain::transaction::{
    NewTransaction, StatusChange, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory backend implementing all four store ports.
///
/// One `RwLock` guards the whole dataset, so every mutating method is a
/// single atomic commit: the entity change and its audit message land
/// together, and uniqueness/expected-status checks see a consistent
/// snapshot. `Clone` shares the underlying state, so services built from
/// clones of one store see the same data.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    locations: HashMap<LocationId, Location>,
    businesses: BTreeMap<BusinessId, Business>,
    sellables: BTreeMap<SellableId, Sellable>,
    saved: HashMap<(UserId, BusinessId), SavedBusiness>,
    reviews: BTreeMap<ReviewId, Review>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: BTreeMap<MessageId, Message>,
    receipts: HashMap<(MessageId, UserId), ReadReceipt>,
    transactions: BTreeMap<TransactionId, Transaction>,
    disputes: BTreeMap<DisputeId, Dispute>,
    dispute_by_transaction: HashMap<TransactionId, DisputeId>,
    dispute_messages: BTreeMap<DisputeMessageId, DisputeMessage>,
    sequences: Sequences,
}

/// Auto-increment counters, one per table.
#[derive(Default)]
struct Sequences {
    user: u64,
    location: u64,
    business: u64,
    sellable: u64,
    review: u64,
    conversation: u64,
    message: u64,
    transaction: u64,
    dispute: u64,
    dispute_message: u64,
}

fn next(sequence: &mut u64) -> u64 {
    *sequence += 1;
    *sequence
}

impl Inner {
    /// Appends a message and bumps the conversation's activity timestamp.
    /// `transaction`, when given, overrides the message's transaction tag;
    /// this is how audit messages get stamped with store-allocated ids.
    fn push_message(
        &mut self,
        new: NewMessage,
        transaction: Option<TransactionId>,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let conversation = self
            .conversations
            .get_mut(&new.conversation_id)
            .ok_or(EngineError::NotFound("conversation"))?;
        conversation.updated_at = now;
        let id = next(&mut self.sequences.message);
        let message = Message {
            id,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            sellable_id: new.sellable_id,
            transaction_id: transaction.or(new.transaction_id),
            sent_at: now,
        };
        self.messages.insert(id, message.clone());
        Ok(message)
    }
}

fn text_matches(query: &str, name: &str, description: Option<&str>) -> bool {
    let query = query.to_lowercase();
    name.to_lowercase().contains(&query)
        || description.is_some_and(|d| d.to_lowercase().contains(&query))
}

fn business_matches(inner: &Inner, business: &Business, filter: &BusinessFilter) -> bool {
    if let Some(category) = &filter.category
        && business.category.as_deref() != Some(category.as_str())
    {
        return false;
    }
    if let Some(location) = filter.location_id
        && business.location_id != Some(location)
    {
        return false;
    }
    if let Some(verified) = filter.verified
        && business.verified != verified
    {
        return false;
    }
    if filter.min_price.is_some() || filter.max_price.is_some() {
        let in_range = inner.sellables.values().any(|s| {
            s.business_id == business.id
                && filter.min_price.is_none_or(|min| s.price.value() >= min)
                && filter.max_price.is_none_or(|max| s.price.value() <= max)
        });
        if !in_range {
            return false;
        }
    }
    if let Some(query) = &filter.query
        && !text_matches(query, &business.name, business.description.as_deref())
    {
        return false;
    }
    true
}

fn sellable_matches(inner: &Inner, sellable: &Sellable, filter: &SellableFilter) -> bool {
    if let Some(kind) = filter.kind
        && sellable.kind != kind
    {
        return false;
    }
    if let Some(business) = filter.business_id
        && sellable.business_id != business
    {
        return false;
    }
    if let Some(min) = filter.min_price
        && sellable.price.value() < min
    {
        return false;
    }
    if let Some(max) = filter.max_price
        && sellable.price.value() > max
    {
        return false;
    }
    if filter.category.is_some() || filter.location_id.is_some() {
        let Some(business) = inner.businesses.get(&sellable.business_id) else {
            return false;
        };
        if let Some(category) = &filter.category
            && business.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        if let Some(location) = filter.location_id
            && business.location_id != Some(location)
        {
            return false;
        }
    }
    if let Some(query) = &filter.query
        && !text_matches(query, &sellable.name, sellable.description.as_deref())
    {
        return false;
    }
    true
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.user);
        let user = User {
            id,
            name: new.name,
            email: new.email,
            role: new.role,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert_location(&self, new: NewLocation) -> Result<Location> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.location);
        let location = Location {
            id,
            city: new.city,
            province: new.province,
            postal_code: new.postal_code,
        };
        inner.locations.insert(id, location.clone());
        Ok(location)
    }

    async fn location(&self, id: LocationId) -> Result<Option<Location>> {
        Ok(self.inner.read().await.locations.get(&id).cloned())
    }

    async fn insert_business(&self, new: NewBusiness) -> Result<Business> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.business);
        let business = Business {
            id,
            owner_id: new.owner_id,
            name: new.name,
            description: new.description,
            category: new.category,
            location_id: new.location_id,
            verified: false,
            registered_at: Utc::now(),
        };
        inner.businesses.insert(id, business.clone());
        Ok(business)
    }

    async fn business(&self, id: BusinessId) -> Result<Option<Business>> {
        Ok(self.inner.read().await.businesses.get(&id).cloned())
    }

    async fn businesses(&self, filter: &BusinessFilter) -> Result<Vec<Business>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Business> = inner
            .businesses
            .values()
            .filter(|b| business_matches(&inner, b, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn insert_sellable(&self, new: NewSellable) -> Result<Sellable> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.sellable);
        let sellable = Sellable {
            id,
            business_id: new.business_id,
            name: new.name,
            kind: new.kind,
            price: new.price,
            description: new.description,
            active: true,
        };
        inner.sellables.insert(id, sellable.clone());
        Ok(sellable)
    }

    async fn sellable(&self, id: SellableId) -> Result<Option<Sellable>> {
        Ok(self.inner.read().await.sellables.get(&id).cloned())
    }

    async fn sellables(&self, filter: &SellableFilter) -> Result<Vec<Sellable>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Sellable> = inner
            .sellables
            .values()
            .filter(|s| sellable_matches(&inner, s, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn save_business(&self, user: UserId, business: BusinessId) -> Result<SavedBusiness> {
        let mut inner = self.inner.write().await;
        if inner.saved.contains_key(&(user, business)) {
            return Err(EngineError::Conflict("business already saved".to_string()));
        }
        let saved = SavedBusiness {
            user_id: user,
            business_id: business,
            saved_at: Utc::now(),
        };
        inner.saved.insert((user, business), saved.clone());
        Ok(saved)
    }

    async fn unsave_business(&self, user: UserId, business: BusinessId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.saved.remove(&(user, business)).is_some())
    }

    async fn saved_businesses(&self, user: UserId) -> Result<Vec<Business>> {
        let inner = self.inner.read().await;
        let mut bookmarks: Vec<&SavedBusiness> = inner
            .saved
            .values()
            .filter(|s| s.user_id == user)
            .collect();
        bookmarks.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(bookmarks
            .into_iter()
            .filter_map(|s| inner.businesses.get(&s.business_id).cloned())
            .collect())
    }

    async fn insert_review(&self, new: NewReview) -> Result<Review> {
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.review);
        let review = Review {
            id,
            customer_id: new.customer_id,
            business_id: new.business_id,
            rating: new.rating,
            body: new.body,
            reviewed_at: Utc::now(),
        };
        inner.reviews.insert(id, review.clone());
        Ok(review)
    }

    async fn reviews(&self, business: BusinessId) -> Result<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .values()
            .filter(|r| r.business_id == business)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn find_direct(&self, a: UserId, b: UserId) -> Result<Option<Conversation>> {
        let pair = if a <= b { vec![a, b] } else { vec![b, a] };
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .values()
            .find(|c| c.participants == pair)
            .cloned())
    }

    async fn create_conversation(&self, mut participants: Vec<UserId>) -> Result<Conversation> {
        participants.sort_unstable();
        participants.dedup();
        if participants.len() < 2 {
            return Err(EngineError::Validation(
                "a conversation needs at least two participants".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        let id = next(&mut inner.sequences.conversation);
        let now = Utc::now();
        let conversation = Conversation {
            id,
            participants,
            created_at: now,
            updated_at: now,
        };
        inner.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn conversations_for(&self, user: UserId) -> Result<Vec<Conversation>> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.has_participant(user))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(conversations)
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message> {
        let mut inner = self.inner.write().await;
        inner.push_message(new, None, Utc::now())
    }

    async fn messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect())
    }

    async fn latest_message(&self, conversation: ConversationId) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .rev()
            .find(|m| m.conversation_id == conversation)
            .cloned())
    }

    async fn mark_read(&self, message: MessageId, user: UserId) -> Result<Option<ReadReceipt>> {
        let mut inner = self.inner.write().await;
        if !inner.messages.contains_key(&message) {
            return Err(EngineError::NotFound("message"));
        }
        if inner.receipts.contains_key(&(message, user)) {
            return Ok(None);
        }
        let receipt = ReadReceipt {
            message_id: message,
            user_id: user,
            read_at: Utc::now(),
        };
        inner.receipts.insert((message, user), receipt.clone());
        Ok(Some(receipt))
    }

    async fn unread_count(&self, conversation: ConversationId, user: UserId) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation
                    && m.sender_id != user
                    && !inner.receipts.contains_key(&(m.id, user))
            })
            .count() as u64)
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn create(&self, new: NewTransaction, audit: NewMessage) -> Result<(Transaction, Message)> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let id = next(&mut inner.sequences.transaction);
        let transaction = Transaction {
            id,
            customer_id: new.customer_id,
            business_id: new.business_id,
            status: TransactionStatus::Pending,
            total: new.total(),
            items: new.items,
            notes: new.notes,
            initiated_at: now,
            completed_at: None,
        };
        let message = inner.push_message(audit, Some(id), now)?;
        inner.transactions.insert(id, transaction.clone());
        Ok((transaction, message))
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: TransactionId,
        expect: TransactionStatus,
        change: StatusChange,
        audit: NewMessage,
    ) -> Result<(Transaction, Message)> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let current = inner
            .transactions
            .get(&id)
            .ok_or(EngineError::NotFound("transaction"))?
            .status;
        // The caller validated against its own snapshot; re-check here so
        // two racing updates cannot both apply.
        if current != expect {
            return Err(EngineError::InvalidTransition);
        }
        let message = inner.push_message(audit, Some(id), now)?;
        let transaction = inner
            .transactions
            .get_mut(&id)
            .ok_or(EngineError::NotFound("transaction"))?;
        transaction.status = change.to;
        if let Some(note) = change.append_note {
            transaction.notes = Some(match transaction.notes.take() {
                Some(existing) => format!("{existing}\n\n{note}"),
                None => note,
            });
        }
        if change.to == TransactionStatus::Completed {
            transaction.completed_at = Some(now);
        }
        Ok((transaction.clone(), message))
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        Ok(self.inner.read().await.transactions.values().cloned().collect())
    }
}

#[async_trait]
impl DisputeStore for InMemoryStore {
    async fn open(&self, new: NewDispute, audit: NewMessage) -> Result<(Dispute, Message)> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        if !inner.transactions.contains_key(&new.transaction_id) {
            return Err(EngineError::NotFound("transaction"));
        }
        if inner.dispute_by_transaction.contains_key(&new.transaction_id) {
            return Err(EngineError::Conflict(
                "a dispute already exists for this transaction".to_string(),
            ));
        }
        let message = inner.push_message(audit, Some(new.transaction_id), now)?;
        let id = next(&mut inner.sequences.dispute);
        let dispute = Dispute {
            id,
            transaction_id: new.transaction_id,
            complainant_id: new.complainant_id,
            reason: new.reason.clone(),
            status: DisputeStatus::Pending,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            opened_at: now,
        };
        inner.disputes.insert(id, dispute.clone());
        inner.dispute_by_transaction.insert(new.transaction_id, id);
        let opening_id = next(&mut inner.sequences.dispute_message);
        inner.dispute_messages.insert(
            opening_id,
            DisputeMessage {
                id: opening_id,
                dispute_id: id,
                sender_id: new.complainant_id,
                body: new.reason,
                sent_at: now,
            },
        );
        Ok((dispute, message))
    }

    async fn get(&self, id: DisputeId) -> Result<Option<Dispute>> {
        Ok(self.inner.read().await.disputes.get(&id).cloned())
    }

    async fn for_transaction(&self, transaction: TransactionId) -> Result<Option<Dispute>> {
        let inner = self.inner.read().await;
        Ok(inner
            .dispute_by_transaction
            .get(&transaction)
            .and_then(|id| inner.disputes.get(id))
            .cloned())
    }

    async fn append_message(
        &self,
        new: NewDisputeMessage,
        audit: NewMessage,
    ) -> Result<(DisputeMessage, Message)> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let transaction_id = inner
            .disputes
            .get(&new.dispute_id)
            .ok_or(EngineError::NotFound("dispute"))?
            .transaction_id;
        let message = inner.push_message(audit, Some(transaction_id), now)?;
        let id = next(&mut inner.sequences.dispute_message);
        let dispute_message = DisputeMessage {
            id,
            dispute_id: new.dispute_id,
            sender_id: new.sender_id,
            body: new.body,
            sent_at: now,
        };
        inner.dispute_messages.insert(id, dispute_message.clone());
        Ok((dispute_message, message))
    }

    async fn resolve(
        &self,
        id: DisputeId,
        resolution: Resolution,
        audit: NewMessage,
    ) -> Result<(Dispute, Message)> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let (transaction_id, status) = {
            let dispute = inner.disputes.get(&id).ok_or(EngineError::NotFound("dispute"))?;
            (dispute.transaction_id, dispute.status)
        };
        if status != DisputeStatus::Pending {
            return Err(EngineError::InvalidTransition);
        }
        let message = inner.push_message(audit, Some(transaction_id), now)?;
        let dispute = inner
            .disputes
            .get_mut(&id)
            .ok_or(EngineError::NotFound("dispute"))?;
        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = Some(resolution.text);
        dispute.resolved_by = Some(resolution.resolved_by);
        dispute.resolved_at = Some(now);
        Ok((dispute.clone(), message))
    }

    async fn messages(&self, dispute: DisputeId) -> Result<Vec<DisputeMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .dispute_messages
            .values()
            .filter(|m| m.dispute_id == dispute)
            .cloned()
            .collect())
    }
}
