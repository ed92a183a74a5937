use crate::domain::chat::{
    Conversation, ConversationId, Message, MessageId, NewMessage, ReadReceipt,
};
use crate::domain::dispute::{
    Dispute, DisputeId, DisputeMessage, DisputeStatus, NewDispute, NewDisputeMessage, Resolution,
};
use crate::domain::party::{
    Business, BusinessFilter, BusinessId, Location, LocationId, NewBusiness, NewLocation,
    NewReview, NewSellable, NewUser, Review, SavedBusiness, Sellable, SellableFilter, SellableId,
    User, UserId,
};
use crate::domain::ports::{ChatStore, DirectoryStore, DisputeStore, TransactionStore};
use crate::domain::transaction::{
    NewTransaction, StatusChange, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family per table, JSON-encoded rows, big-endian integer keys so
/// iteration order is id order.
pub const CF_USERS: &str = "users";
pub const CF_LOCATIONS: &str = "locations";
pub const CF_BUSINESSES: &str = "businesses";
pub const CF_SELLABLES: &str = "sellables";
pub const CF_SAVED: &str = "saved_businesses";
pub const CF_REVIEWS: &str = "reviews";
pub const CF_CONVERSATIONS: &str = "conversations";
pub const CF_MESSAGES: &str = "messages";
pub const CF_RECEIPTS: &str = "read_receipts";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_DISPUTES: &str = "disputes";
pub const CF_DISPUTE_MESSAGES: &str = "dispute_messages";
/// Sequence counters plus the secondary indexes (direct-conversation pair,
/// dispute-by-transaction).
pub const CF_META: &str = "meta";

const ALL_CFS: [&str; 13] = [
    CF_USERS,
    CF_LOCATIONS,
    CF_BUSINESSES,
    CF_SELLABLES,
    CF_SAVED,
    CF_REVIEWS,
    CF_CONVERSATIONS,
    CF_MESSAGES,
    CF_RECEIPTS,
    CF_TRANSACTIONS,
    CF_DISPUTES,
    CF_DISPUTE_MESSAGES,
    CF_META,
];

/// A persistent backend implementing all four store ports on RocksDB.
///
/// Every mutation is applied as one `WriteBatch` behind a write mutex, which
/// gives the same atomic commit + row serialization guarantees as the
/// in-memory backend: entity change and audit message land together, and
/// uniqueness/expected-status checks run against a settled snapshot.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(message: String) -> EngineError {
    EngineError::Internal(Box::new(std::io::Error::other(message)))
}

fn pair_key(a: UserId, b: UserId) -> Vec<u8> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut key = b"conv_pair:".to_vec();
    key.extend_from_slice(&low.to_be_bytes());
    key.extend_from_slice(&high.to_be_bytes());
    key
}

fn dispute_index_key(transaction: TransactionId) -> Vec<u8> {
    let mut key = b"dispute_ix:".to_vec();
    key.extend_from_slice(&transaction.to_be_bytes());
    key
}

fn composite_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| internal(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| internal(format!("serialization error: {e}")))?;
        batch.put_cf(cf, key, bytes);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(
                serde_json::from_slice(&value)
                    .map_err(|e| internal(format!("deserialization error: {e}")))?,
            );
        }
        Ok(rows)
    }

    /// Allocates the next id for a sequence and records the new high-water
    /// mark in the batch. Only called with the write mutex held.
    fn next_seq(&self, batch: &mut WriteBatch, name: &str) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let key = format!("seq:{name}");
        let current = match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| internal(format!("corrupt sequence {name}")))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let id = current + 1;
        batch.put_cf(cf, key.as_bytes(), id.to_be_bytes());
        Ok(id)
    }

    fn get_u64(&self, cf: &str, key: &[u8]) -> Result<Option<u64>> {
        let cf = self.cf(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| internal("corrupt index entry".to_string()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Stages a message append plus the conversation activity bump into
    /// `batch`. The counterpart of the in-memory backend's `push_message`.
    fn stage_message(
        &self,
        batch: &mut WriteBatch,
        new: NewMessage,
        transaction: Option<TransactionId>,
        now: chrono::DateTime<Utc>,
    ) -> Result<Message> {
        let mut conversation: Conversation = self
            .get_json(CF_CONVERSATIONS, &new.conversation_id.to_be_bytes())?
            .ok_or(EngineError::NotFound("conversation"))?;
        conversation.updated_at = now;
        self.put_json(
            batch,
            CF_CONVERSATIONS,
            &conversation.id.to_be_bytes(),
            &conversation,
        )?;

        let id = self.next_seq(batch, "message")?;
        let message = Message {
            id,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            sellable_id: new.sellable_id,
            transaction_id: transaction.or(new.transaction_id),
            sent_at: now,
        };
        self.put_json(batch, CF_MESSAGES, &id.to_be_bytes(), &message)?;
        Ok(message)
    }
}

#[async_trait]
impl DirectoryStore for RocksDbStore {
    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "user")?;
        let user = User {
            id,
            name: new.name,
            email: new.email,
            role: new.role,
        };
        self.put_json(&mut batch, CF_USERS, &id.to_be_bytes(), &user)?;
        self.db.write(batch)?;
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, &id.to_be_bytes())
    }

    async fn insert_location(&self, new: NewLocation) -> Result<Location> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "location")?;
        let location = Location {
            id,
            city: new.city,
            province: new.province,
            postal_code: new.postal_code,
        };
        self.put_json(&mut batch, CF_LOCATIONS, &id.to_be_bytes(), &location)?;
        self.db.write(batch)?;
        Ok(location)
    }

    async fn location(&self, id: LocationId) -> Result<Option<Location>> {
        self.get_json(CF_LOCATIONS, &id.to_be_bytes())
    }

    async fn insert_business(&self, new: NewBusiness) -> Result<Business> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "business")?;
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
        self.put_json(&mut batch, CF_BUSINESSES, &id.to_be_bytes(), &business)?;
        self.db.write(batch)?;
        Ok(business)
    }

    async fn business(&self, id: BusinessId) -> Result<Option<Business>> {
        self.get_json(CF_BUSINESSES, &id.to_be_bytes())
    }

    async fn businesses(&self, filter: &BusinessFilter) -> Result<Vec<Business>> {
        let sellables: Vec<Sellable> = self.scan(CF_SELLABLES)?;
        let mut matched: Vec<Business> = self
            .scan::<Business>(CF_BUSINESSES)?
            .into_iter()
            .filter(|b| business_matches(b, filter, &sellables))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn insert_sellable(&self, new: NewSellable) -> Result<Sellable> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "sellable")?;
        let sellable = Sellable {
            id,
            business_id: new.business_id,
            name: new.name,
            kind: new.kind,
            price: new.price,
            description: new.description,
            active: true,
        };
        self.put_json(&mut batch, CF_SELLABLES, &id.to_be_bytes(), &sellable)?;
        self.db.write(batch)?;
        Ok(sellable)
    }

    async fn sellable(&self, id: SellableId) -> Result<Option<Sellable>> {
        self.get_json(CF_SELLABLES, &id.to_be_bytes())
    }

    async fn sellables(&self, filter: &SellableFilter) -> Result<Vec<Sellable>> {
        let businesses: Vec<Business> = self.scan(CF_BUSINESSES)?;
        let mut matched: Vec<Sellable> = self
            .scan::<Sellable>(CF_SELLABLES)?
            .into_iter()
            .filter(|s| sellable_matches(s, filter, &businesses))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }

    async fn save_business(&self, user: UserId, business: BusinessId) -> Result<SavedBusiness> {
        let _guard = self.write_lock.lock().await;
        let key = composite_key(user, business);
        if self
            .get_json::<SavedBusiness>(CF_SAVED, &key)?
            .is_some()
        {
            return Err(EngineError::Conflict("business already saved".to_string()));
        }
        let saved = SavedBusiness {
            user_id: user,
            business_id: business,
            saved_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_SAVED, &key, &saved)?;
        self.db.write(batch)?;
        Ok(saved)
    }

    async fn unsave_business(&self, user: UserId, business: BusinessId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = composite_key(user, business);
        if self.get_json::<SavedBusiness>(CF_SAVED, &key)?.is_none() {
            return Ok(false);
        }
        let cf = self.cf(CF_SAVED)?;
        self.db.delete_cf(cf, key)?;
        Ok(true)
    }

    async fn saved_businesses(&self, user: UserId) -> Result<Vec<Business>> {
        let mut bookmarks: Vec<SavedBusiness> = self
            .scan::<SavedBusiness>(CF_SAVED)?
            .into_iter()
            .filter(|s| s.user_id == user)
            .collect();
        bookmarks.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        let mut businesses = Vec::with_capacity(bookmarks.len());
        for bookmark in bookmarks {
            if let Some(business) =
                self.get_json::<Business>(CF_BUSINESSES, &bookmark.business_id.to_be_bytes())?
            {
                businesses.push(business);
            }
        }
        Ok(businesses)
    }

    async fn insert_review(&self, new: NewReview) -> Result<Review> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "review")?;
        let review = Review {
            id,
            customer_id: new.customer_id,
            business_id: new.business_id,
            rating: new.rating,
            body: new.body,
            reviewed_at: Utc::now(),
        };
        self.put_json(&mut batch, CF_REVIEWS, &id.to_be_bytes(), &review)?;
        self.db.write(batch)?;
        Ok(review)
    }

    async fn reviews(&self, business: BusinessId) -> Result<Vec<Review>> {
        Ok(self
            .scan::<Review>(CF_REVIEWS)?
            .into_iter()
            .filter(|r| r.business_id == business)
            .collect())
    }
}

fn business_matches(business: &Business, filter: &BusinessFilter, sellables: &[Sellable]) -> bool {
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
        let in_range = sellables.iter().any(|s| {
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

fn sellable_matches(sellable: &Sellable, filter: &SellableFilter, businesses: &[Business]) -> bool {
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
        let Some(business) = businesses.iter().find(|b| b.id == sellable.business_id) else {
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

fn text_matches(query: &str, name: &str, description: Option<&str>) -> bool {
    let query = query.to_lowercase();
    name.to_lowercase().contains(&query)
        || description.is_some_and(|d| d.to_lowercase().contains(&query))
}

#[async_trait]
impl ChatStore for RocksDbStore {
    async fn find_direct(&self, a: UserId, b: UserId) -> Result<Option<Conversation>> {
        match self.get_u64(CF_META, &pair_key(a, b))? {
            Some(id) => self.get_json(CF_CONVERSATIONS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn create_conversation(&self, mut participants: Vec<UserId>) -> Result<Conversation> {
        participants.sort_unstable();
        participants.dedup();
        if participants.len() < 2 {
            return Err(EngineError::Validation(
                "a conversation needs at least two participants".to_string(),
            ));
        }
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "conversation")?;
        let now = Utc::now();
        let conversation = Conversation {
            id,
            participants,
            created_at: now,
            updated_at: now,
        };
        self.put_json(&mut batch, CF_CONVERSATIONS, &id.to_be_bytes(), &conversation)?;
        if let [a, b] = conversation.participants[..] {
            let meta = self.cf(CF_META)?;
            batch.put_cf(meta, pair_key(a, b), id.to_be_bytes());
        }
        self.db.write(batch)?;
        Ok(conversation)
    }

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.get_json(CF_CONVERSATIONS, &id.to_be_bytes())
    }

    async fn conversations_for(&self, user: UserId) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = self
            .scan::<Conversation>(CF_CONVERSATIONS)?
            .into_iter()
            .filter(|c| c.has_participant(user))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(conversations)
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let message = self.stage_message(&mut batch, new, None, Utc::now())?;
        self.db.write(batch)?;
        Ok(message)
    }

    async fn messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
        Ok(self
            .scan::<Message>(CF_MESSAGES)?
            .into_iter()
            .filter(|m| m.conversation_id == conversation)
            .collect())
    }

    async fn latest_message(&self, conversation: ConversationId) -> Result<Option<Message>> {
        Ok(self
            .scan::<Message>(CF_MESSAGES)?
            .into_iter()
            .filter(|m| m.conversation_id == conversation)
            .next_back())
    }

    async fn mark_read(&self, message: MessageId, user: UserId) -> Result<Option<ReadReceipt>> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<Message>(CF_MESSAGES, &message.to_be_bytes())?
            .is_none()
        {
            return Err(EngineError::NotFound("message"));
        }
        let key = composite_key(message, user);
        if self.get_json::<ReadReceipt>(CF_RECEIPTS, &key)?.is_some() {
            return Ok(None);
        }
        let receipt = ReadReceipt {
            message_id: message,
            user_id: user,
            read_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_RECEIPTS, &key, &receipt)?;
        self.db.write(batch)?;
        Ok(Some(receipt))
    }

    async fn unread_count(&self, conversation: ConversationId, user: UserId) -> Result<u64> {
        let mut count = 0;
        for message in self.scan::<Message>(CF_MESSAGES)? {
            if message.conversation_id == conversation
                && message.sender_id != user
                && self
                    .get_json::<ReadReceipt>(CF_RECEIPTS, &composite_key(message.id, user))?
                    .is_none()
            {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn create(&self, new: NewTransaction, audit: NewMessage) -> Result<(Transaction, Message)> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut batch = WriteBatch::default();
        let id = self.next_seq(&mut batch, "transaction")?;
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
        let message = self.stage_message(&mut batch, audit, Some(id), now)?;
        self.put_json(&mut batch, CF_TRANSACTIONS, &id.to_be_bytes(), &transaction)?;
        self.db.write(batch)?;
        Ok((transaction, message))
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())
    }

    async fn update_status(
        &self,
        id: TransactionId,
        expect: TransactionStatus,
        change: StatusChange,
        audit: NewMessage,
    ) -> Result<(Transaction, Message)> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut transaction: Transaction = self
            .get_json(CF_TRANSACTIONS, &id.to_be_bytes())?
            .ok_or(EngineError::NotFound("transaction"))?;
        // The caller validated against its own snapshot; re-check here so
        // two racing updates cannot both apply.
        if transaction.status != expect {
            return Err(EngineError::InvalidTransition);
        }
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
        let mut batch = WriteBatch::default();
        let message = self.stage_message(&mut batch, audit, Some(id), now)?;
        self.put_json(&mut batch, CF_TRANSACTIONS, &id.to_be_bytes(), &transaction)?;
        self.db.write(batch)?;
        Ok((transaction, message))
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        self.scan(CF_TRANSACTIONS)
    }
}

#[async_trait]
impl DisputeStore for RocksDbStore {
    async fn open(&self, new: NewDispute, audit: NewMessage) -> Result<(Dispute, Message)> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        if self
            .get_json::<Transaction>(CF_TRANSACTIONS, &new.transaction_id.to_be_bytes())?
            .is_none()
        {
            return Err(EngineError::NotFound("transaction"));
        }
        if self
            .get_u64(CF_META, &dispute_index_key(new.transaction_id))?
            .is_some()
        {
            return Err(EngineError::Conflict(
                "a dispute already exists for this transaction".to_string(),
            ));
        }
        let mut batch = WriteBatch::default();
        let message = self.stage_message(&mut batch, audit, Some(new.transaction_id), now)?;
        let id = self.next_seq(&mut batch, "dispute")?;
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
        self.put_json(&mut batch, CF_DISPUTES, &id.to_be_bytes(), &dispute)?;
        let meta = self.cf(CF_META)?;
        batch.put_cf(meta, dispute_index_key(new.transaction_id), id.to_be_bytes());
        let opening_id = self.next_seq(&mut batch, "dispute_message")?;
        let opening = DisputeMessage {
            id: opening_id,
            dispute_id: id,
            sender_id: new.complainant_id,
            body: new.reason,
            sent_at: now,
        };
        self.put_json(
            &mut batch,
            CF_DISPUTE_MESSAGES,
            &opening_id.to_be_bytes(),
            &opening,
        )?;
        self.db.write(batch)?;
        Ok((dispute, message))
    }

    async fn get(&self, id: DisputeId) -> Result<Option<Dispute>> {
        self.get_json(CF_DISPUTES, &id.to_be_bytes())
    }

    async fn for_transaction(&self, transaction: TransactionId) -> Result<Option<Dispute>> {
        match self.get_u64(CF_META, &dispute_index_key(transaction))? {
            Some(id) => self.get_json(CF_DISPUTES, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn append_message(
        &self,
        new: NewDisputeMessage,
        audit: NewMessage,
    ) -> Result<(DisputeMessage, Message)> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let dispute: Dispute = self
            .get_json(CF_DISPUTES, &new.dispute_id.to_be_bytes())?
            .ok_or(EngineError::NotFound("dispute"))?;
        let mut batch = WriteBatch::default();
        let message = self.stage_message(&mut batch, audit, Some(dispute.transaction_id), now)?;
        let id = self.next_seq(&mut batch, "dispute_message")?;
        let dispute_message = DisputeMessage {
            id,
            dispute_id: new.dispute_id,
            sender_id: new.sender_id,
            body: new.body,
            sent_at: now,
        };
        self.put_json(
            &mut batch,
            CF_DISPUTE_MESSAGES,
            &id.to_be_bytes(),
            &dispute_message,
        )?;
        self.db.write(batch)?;
        Ok((dispute_message, message))
    }

    async fn resolve(
        &self,
        id: DisputeId,
        resolution: Resolution,
        audit: NewMessage,
    ) -> Result<(Dispute, Message)> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut dispute: Dispute = self
            .get_json(CF_DISPUTES, &id.to_be_bytes())?
            .ok_or(EngineError::NotFound("dispute"))?;
        if dispute.status != DisputeStatus::Pending {
            return Err(EngineError::InvalidTransition);
        }
        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = Some(resolution.text);
        dispute.resolved_by = Some(resolution.resolved_by);
        dispute.resolved_at = Some(now);
        let mut batch = WriteBatch::default();
        let message = self.stage_message(&mut batch, audit, Some(dispute.transaction_id), now)?;
        self.put_json(&mut batch, CF_DISPUTES, &id.to_be_bytes(), &dispute)?;
        self.db.write(batch)?;
        Ok((dispute, message))
    }

    async fn messages(&self, dispute: DisputeId) -> Result<Vec<DisputeMessage>> {
        Ok(self
            .scan::<DisputeMessage>(CF_DISPUTE_MESSAGES)?
            .into_iter()
            .filter(|m| m.dispute_id == dispute)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Price, Quantity};
    use crate::domain::party::UserRole;
    use crate::domain::transaction::TransactionItem;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("Failed to open RocksDB");
        for cf in ALL_CFS {
            assert!(store.db.cf_handle(cf).is_some());
        }
    }

    #[tokio::test]
    async fn test_ids_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            let user = store
                .insert_user(NewUser {
                    name: "Olive".to_string(),
                    email: "olive@example.com".to_string(),
                    role: UserRole::BusinessOwner,
                })
                .await
                .unwrap();
            assert_eq!(user.id, 1);
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        let user = store
            .insert_user(NewUser {
                name: "Cass".to_string(),
                email: "cass@example.com".to_string(),
                role: UserRole::Customer,
            })
            .await
            .unwrap();
        assert_eq!(user.id, 2);
        assert!(DirectoryStore::user(&store, 1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transaction_commit_is_batched_with_audit() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let conversation = store.create_conversation(vec![1, 2]).await.unwrap();

        let (transaction, message) = store
            .create(
                NewTransaction {
                    customer_id: 2,
                    business_id: 1,
                    items: vec![TransactionItem {
                        sellable_id: 1,
                        quantity: Quantity::new(2).unwrap(),
                        price: Price::new(dec!(100)).unwrap(),
                    }],
                    notes: None,
                },
                NewMessage::system(
                    conversation.id,
                    1,
                    "Created a new transaction.".to_string(),
                ),
            )
            .await
            .unwrap();
        assert_eq!(transaction.total, dec!(200));
        assert_eq!(message.transaction_id, Some(transaction.id));

        let reread = TransactionStore::get(&store, transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread, transaction);
        assert_eq!(
            ChatStore::messages(&store, conversation.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_dispute_uniqueness_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            let conversation = store.create_conversation(vec![1, 2]).await.unwrap();
            let (transaction, _) = store
                .create(
                    NewTransaction {
                        customer_id: 2,
                        business_id: 1,
                        items: vec![TransactionItem {
                            sellable_id: 1,
                            quantity: Quantity::new(1).unwrap(),
                            price: Price::new(dec!(10)).unwrap(),
                        }],
                        notes: None,
                    },
                    NewMessage::system(conversation.id, 1, "Created a new transaction.".into()),
                )
                .await
                .unwrap();
            store
                .open(
                    NewDispute {
                        transaction_id: transaction.id,
                        complainant_id: 2,
                        reason: "late".to_string(),
                    },
                    NewMessage::system(conversation.id, 2, "Created a dispute: late".into()),
                )
                .await
                .unwrap();
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        let second = store
            .open(
                NewDispute {
                    transaction_id: 1,
                    complainant_id: 2,
                    reason: "again".to_string(),
                },
                NewMessage::system(1, 2, "Created a dispute: again".into()),
            )
            .await;
        assert!(matches!(second, Err(EngineError::Conflict(_))));
        let dispute = store.for_transaction(1).await.unwrap().unwrap();
        assert_eq!(dispute.reason, "late");
    }
}
