use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    ActivityDraft, ActivityType, Actor, Chat, ChatMessage, ChatType, Notification,
    NotificationType, Page, PageRequest, Project, TargetType, User, UserSummary,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use super::notify::Notifier;
use crate::store::{Filter, FindOptions, SortOrder, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    #[serde(default)]
    pub project: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageInput {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionInput {
    pub emoji: String,
}

/// Chat with participant details resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: Chat,
    pub members: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRead {
    pub chat: Uuid,
    pub marked: u64,
}

#[derive(Clone)]
pub struct ChatService {
    store: Store,
    recorder: ActivityRecorder,
    notifier: Notifier,
}

impl ChatService {
    pub fn new(store: Store, recorder: ActivityRecorder, notifier: Notifier) -> Self {
        Self {
            store,
            recorder,
            notifier,
        }
    }

    async fn view(&self, chat: Chat) -> Result<ChatView> {
        let mut members = Vec::with_capacity(chat.participants.len());
        for participant in &chat.participants {
            if let Some(user) = self.store.get::<User>(participant.user).await? {
                members.push(user.summary());
            }
        }
        Ok(ChatView { chat, members })
    }

    async fn readable(&self, actor: &Actor, id: Uuid, action: Action) -> Result<Chat> {
        let chat: Chat = self.store.require(id, "Chat").await?;
        ensure(&chat, actor, action)?;
        Ok(chat)
    }

    /// Chats the actor takes part in plus the team chat, most active first.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<ChatView>> {
        let chats: Vec<Chat> = self
            .store
            .find(
                Filter::or([
                    Filter::eq("type", ChatType::Team),
                    Filter::eq("participants.user", actor.id),
                ]),
                FindOptions::new().sort("lastActivity", SortOrder::Desc),
            )
            .await?;
        let mut views = Vec::with_capacity(chats.len());
        for chat in chats {
            views.push(self.view(chat).await?);
        }
        Ok(views)
    }

    /// Open a conversation. Asking for an existing direct chat returns it.
    pub async fn create(&self, actor: &Actor, input: ChatInput) -> Result<Outcome<ChatView>> {
        for user in &input.participants {
            match self.store.get::<User>(*user).await? {
                Some(u) if u.is_active => {}
                _ => return Err(TeamdeskError::validation("Participant not found or inactive")),
            }
        }

        if input.kind == ChatType::Direct {
            if let [other] = input.participants.as_slice() {
                if let Some(existing) = self.find_direct(actor.id, *other).await? {
                    return Ok(Outcome::new(self.view(existing).await?));
                }
            }
        }

        let mut chat = Chat::new(input.kind, input.name, actor.id, &input.participants)?;
        if let Some(project) = input.project {
            let project: Project = self.store.require(project, "Project").await?;
            ensure(&project, actor, Action::Read)?;
            chat.project = Some(project.id);
        }
        self.store.insert(&chat).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::ChatCreated,
                    "started a conversation",
                    TargetType::Chat,
                    chat.id,
                )
                .project(chat.project)
                .metadata(json!({ "type": chat.kind })),
            )
            .await;
        Ok(Outcome::new(self.view(chat).await?).with_activity(activity))
    }

    async fn find_direct(&self, a: Uuid, b: Uuid) -> Result<Option<Chat>> {
        let candidates: Vec<Chat> = self
            .store
            .find(
                Filter::and([
                    Filter::eq("type", ChatType::Direct),
                    Filter::eq("participants.user", a),
                    Filter::eq("participants.user", b),
                ]),
                FindOptions::new(),
            )
            .await?;
        Ok(candidates.into_iter().find(|c| c.is_direct_between(a, b)))
    }

    /// The team chat, created on first use.
    pub async fn ensure_team_chat(&self) -> Result<Chat> {
        if let Some(chat) = self.store.find_one(Filter::eq("type", ChatType::Team)).await? {
            return Ok(chat);
        }
        let chat = Chat::team();
        match self.store.insert(&chat).await {
            Ok(()) => {
                info!(id = %chat.id, "Team chat created");
                Ok(chat)
            }
            Err(e) if e.is_duplicate() => self
                .store
                .find_one(Filter::eq("type", ChatType::Team))
                .await?
                .ok_or_else(|| TeamdeskError::Internal("Team chat vanished".to_string())),
            Err(e) => Err(e),
        }
    }

    pub async fn team(&self) -> Result<ChatView> {
        let chat = self.ensure_team_chat().await?;
        self.view(chat).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ChatView> {
        let chat = self.readable(actor, id, Action::Read).await?;
        self.view(chat).await
    }

    /// One page of history counted from the newest message, returned in
    /// chronological order.
    pub async fn messages(
        &self,
        actor: &Actor,
        id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<ChatMessage>> {
        let chat = self.readable(actor, id, Action::Read).await?;
        let mut found: Page<ChatMessage> = self
            .store
            .page(Filter::eq("chat", chat.id), FindOptions::newest_first(), page)
            .await?;
        found.items.reverse();
        Ok(found)
    }

    /// Append a message. Participants of non-team chats are notified.
    pub async fn send_message(
        &self,
        actor: &Actor,
        id: Uuid,
        input: MessageInput,
    ) -> Result<Outcome<ChatMessage>> {
        let mut chat = self.readable(actor, id, Action::Comment).await?;
        let message = ChatMessage::new(chat.id, actor.id, input.content)?;
        self.store.insert(&message).await?;

        chat.last_message = Some(message.id);
        chat.last_activity = Some(message.created_at);
        chat.updated_at = message.created_at;
        self.store.save(&chat).await?;

        let mut outcome = Outcome::new(message);
        if !chat.is_team() {
            let title = chat
                .name
                .clone()
                .unwrap_or_else(|| format!("Message from {}", actor.name));
            let preview: String = outcome.entity.content.chars().take(100).collect();
            let notices = chat.participants.iter().map(|p| {
                Notification::direct(
                    p.user,
                    Some(actor.id),
                    NotificationType::ChatMessage,
                    title.clone(),
                    format!("{}: {}", actor.name, preview),
                )
                .with_related("chat", chat.id)
                .with_link(format!("/chat/{}", chat.id))
            }).collect::<Vec<_>>();
            outcome.notifications = self.notifier.send_all(notices).await;
        }
        Ok(outcome)
    }

    /// Toggle an emoji reaction on a message.
    pub async fn react(
        &self,
        actor: &Actor,
        chat_id: Uuid,
        message_id: Uuid,
        input: ReactionInput,
    ) -> Result<ChatMessage> {
        let chat = self.readable(actor, chat_id, Action::Read).await?;
        let mut message: ChatMessage = self.store.require(message_id, "Message").await?;
        if message.chat != chat.id {
            return Err(TeamdeskError::not_found("Message not found"));
        }
        message.toggle_reaction(actor.id, input.emoji.trim())?;
        self.store.save(&message).await?;
        Ok(message)
    }

    /// Record read receipts for every message the actor has not read.
    pub async fn mark_read(&self, actor: &Actor, id: Uuid, at: DateTime<Utc>) -> Result<ChatRead> {
        let chat = self.readable(actor, id, Action::Read).await?;
        let unread: Vec<ChatMessage> = self
            .store
            .find(
                Filter::and([
                    Filter::eq("chat", chat.id),
                    Filter::negate(Filter::eq("readBy.user", actor.id)),
                ]),
                FindOptions::new(),
            )
            .await?;
        let mut marked = 0;
        for mut message in unread {
            if message.mark_read(actor.id, at) {
                self.store.save(&message).await?;
                marked += 1;
            }
        }
        Ok(ChatRead {
            chat: chat.id,
            marked,
        })
    }

    /// Chat type lookup for the relay.
    pub async fn kind_of(&self, id: Uuid) -> Result<Option<ChatType>> {
        Ok(self.store.get::<Chat>(id).await?.map(|c| c.kind))
    }
}
