use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
    Project,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    #[default]
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user: Uuid,
    #[serde(default)]
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub project: Option<Uuid>,
    #[serde(default)]
    pub last_message: Option<Uuid>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// A direct, group or project conversation. The creator becomes admin.
    pub fn new(
        kind: ChatType,
        name: Option<String>,
        created_by: Uuid,
        members: &[Uuid],
    ) -> Result<Self> {
        if kind == ChatType::Team {
            return Err(TeamdeskError::validation(
                "The team chat is created by the system",
            ));
        }
        let now = Utc::now();
        let mut participants = vec![Participant {
            user: created_by,
            role: ParticipantRole::Admin,
            joined_at: now,
        }];
        for member in members {
            if participants.iter().all(|p| p.user != *member) {
                participants.push(Participant {
                    user: *member,
                    role: ParticipantRole::Member,
                    joined_at: now,
                });
            }
        }
        match kind {
            ChatType::Direct if participants.len() != 2 => {
                return Err(TeamdeskError::validation(
                    "A direct chat needs exactly one other participant",
                ))
            }
            ChatType::Group | ChatType::Project
                if name.as_deref().map_or(true, |n| n.trim().is_empty()) =>
            {
                return Err(TeamdeskError::validation("Chat name is required"))
            }
            _ => {}
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            kind,
            participants,
            project: None,
            last_message: None,
            last_activity: Some(now),
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }

    /// The singleton chat open to every user.
    pub fn team() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: Some("Team Chat".to_string()),
            kind: ChatType::Team,
            participants: Vec::new(),
            project: None,
            last_message: None,
            last_activity: Some(now),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_team(&self) -> bool {
        self.kind == ChatType::Team
    }

    pub fn is_participant(&self, user: Uuid) -> bool {
        self.participants.iter().any(|p| p.user == user)
    }

    /// Two-person chat between exactly `a` and `b`.
    pub fn is_direct_between(&self, a: Uuid, b: Uuid) -> bool {
        self.kind == ChatType::Direct
            && self.participants.len() == 2
            && self.is_participant(a)
            && self.is_participant(b)
    }
}

impl Document for Chat {
    const COLLECTION: &'static str = "chats";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<String> {
        self.is_team().then(|| "type:team".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user: Uuid,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat: Uuid,
    pub sender: Uuid,
    pub content: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(chat: Uuid, sender: Uuid, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(TeamdeskError::validation("Message content is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            chat,
            sender,
            content,
            reactions: Vec::new(),
            read_by: vec![ReadReceipt {
                user: sender,
                read_at: now,
            }],
            created_at: now,
        })
    }

    /// Add the reaction, or remove it if the user already reacted with it.
    pub fn toggle_reaction(&mut self, user: Uuid, emoji: &str) -> Result<bool> {
        if emoji.trim().is_empty() {
            return Err(TeamdeskError::validation("Emoji is required"));
        }
        let before = self.reactions.len();
        self.reactions
            .retain(|r| !(r.user == user && r.emoji == emoji));
        if self.reactions.len() != before {
            return Ok(false);
        }
        self.reactions.push(Reaction {
            user,
            emoji: emoji.to_string(),
        });
        Ok(true)
    }

    /// Record a read receipt. Returns false if one already exists.
    pub fn mark_read(&mut self, user: Uuid, now: DateTime<Utc>) -> bool {
        if self.read_by.iter().any(|r| r.user == user) {
            return false;
        }
        self.read_by.push(ReadReceipt { user, read_at: now });
        true
    }
}

impl Document for ChatMessage {
    const COLLECTION: &'static str = "chat_messages";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_chat_requires_one_other() {
        let me = Uuid::new_v4();
        assert!(Chat::new(ChatType::Direct, None, me, &[]).is_err());
        let other = Uuid::new_v4();
        let chat = Chat::new(ChatType::Direct, None, me, &[other, other]).unwrap();
        assert!(chat.is_direct_between(me, other));
    }

    #[test]
    fn test_group_chat_requires_name() {
        let me = Uuid::new_v4();
        assert!(Chat::new(ChatType::Group, None, me, &[Uuid::new_v4()]).is_err());
        let chat =
            Chat::new(ChatType::Group, Some("Ops".into()), me, &[Uuid::new_v4()]).unwrap();
        assert_eq!(chat.participants[0].role, ParticipantRole::Admin);
    }

    #[test]
    fn test_team_chat_not_user_creatable() {
        assert!(Chat::new(ChatType::Team, Some("x".into()), Uuid::new_v4(), &[]).is_err());
        assert!(Chat::team().is_team());
    }

    #[test]
    fn test_reaction_toggle() {
        let user = Uuid::new_v4();
        let mut msg = ChatMessage::new(Uuid::new_v4(), user, "hi").unwrap();
        assert!(msg.toggle_reaction(user, "👍").unwrap());
        assert_eq!(msg.reactions.len(), 1);
        assert!(!msg.toggle_reaction(user, "👍").unwrap());
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_sender_has_read_message() {
        let sender = Uuid::new_v4();
        let mut msg = ChatMessage::new(Uuid::new_v4(), sender, "hello").unwrap();
        assert!(!msg.mark_read(sender, Utc::now()));
        assert!(msg.mark_read(Uuid::new_v4(), Utc::now()));
        assert!(ChatMessage::new(Uuid::new_v4(), sender, "  ").is_err());
    }
}
