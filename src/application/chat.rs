use crate::domain::chat::{Conversation, ConversationId, Message, NewMessage};
use crate::domain::party::{SellableId, User, UserId};
use crate::domain::ports::{ChatStoreBox, DirectoryStoreBox};
use crate::error::{EngineError, Result};
use serde::Serialize;
use tracing::debug;

/// One row of the conversation list: who the thread is with, what was said
/// last, and how much of it the user has not read.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub counterparts: Vec<User>,
    pub latest_message: Option<Message>,
    pub unread: u64,
}

/// Free-text messaging between users: the substrate the workflow engine
/// writes its system messages into.
pub struct ChatService {
    directory: DirectoryStoreBox,
    chat: ChatStoreBox,
}

impl ChatService {
    pub fn new(directory: DirectoryStoreBox, chat: ChatStoreBox) -> Self {
        Self { directory, chat }
    }

    /// Finds or lazily creates the direct conversation between two users.
    pub async fn open_conversation(&self, actor: UserId, other: UserId) -> Result<Conversation> {
        if actor == other {
            return Err(EngineError::Validation(
                "cannot open a conversation with yourself".to_string(),
            ));
        }
        self.require_user(actor).await?;
        self.require_user(other).await?;
        if let Some(existing) = self.chat.find_direct(actor, other).await? {
            return Ok(existing);
        }
        debug!(a = actor, b = other, "creating conversation");
        self.chat.create_conversation(vec![actor, other]).await
    }

    /// Sends a free-text message, optionally advertising a sellable.
    pub async fn send_message(
        &self,
        actor: UserId,
        conversation_id: ConversationId,
        content: String,
        sellable_id: Option<SellableId>,
    ) -> Result<Message> {
        let conversation = self.require_conversation(conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(EngineError::Unauthorized);
        }
        if content.trim().is_empty() {
            return Err(EngineError::Validation(
                "message content is required".to_string(),
            ));
        }
        if let Some(sellable) = sellable_id
            && self.directory.sellable(sellable).await?.is_none()
        {
            return Err(EngineError::NotFound("sellable"));
        }
        self.chat
            .append_message(NewMessage::chat(
                conversation_id,
                actor,
                content,
                sellable_id,
            ))
            .await
    }

    /// The conversation transcript, oldest first. Participants only.
    pub async fn messages(
        &self,
        actor: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>> {
        let conversation = self.require_conversation(conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(EngineError::Unauthorized);
        }
        self.chat.messages(conversation_id).await
    }

    /// Marks every unread message (not sent by the actor) as read. Returns
    /// how many receipts were actually created.
    pub async fn mark_conversation_read(
        &self,
        actor: UserId,
        conversation_id: ConversationId,
    ) -> Result<u64> {
        let conversation = self.require_conversation(conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(EngineError::Unauthorized);
        }
        let mut marked = 0;
        for message in self.chat.messages(conversation_id).await? {
            if message.sender_id != actor
                && self.chat.mark_read(message.id, actor).await?.is_some()
            {
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// The actor's conversation list, most recently active first.
    pub async fn conversations(&self, actor: UserId) -> Result<Vec<ConversationSummary>> {
        self.require_user(actor).await?;
        let mut summaries = Vec::new();
        for conversation in self.chat.conversations_for(actor).await? {
            let mut counterparts = Vec::new();
            for participant in &conversation.participants {
                if *participant != actor
                    && let Some(user) = self.directory.user(*participant).await?
                {
                    counterparts.push(user);
                }
            }
            let latest_message = self.chat.latest_message(conversation.id).await?;
            let unread = self.chat.unread_count(conversation.id, actor).await?;
            summaries.push(ConversationSummary {
                conversation,
                counterparts,
                latest_message,
                unread,
            });
        }
        Ok(summaries)
    }

    async fn require_user(&self, id: UserId) -> Result<User> {
        self.directory
            .user(id)
            .await?
            .ok_or(EngineError::NotFound("user"))
    }

    async fn require_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.chat
            .conversation(id)
            .await?
            .ok_or(EngineError::NotFound("conversation"))
    }
}
