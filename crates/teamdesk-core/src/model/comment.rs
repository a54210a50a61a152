use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

/// A comment on a task, optionally mentioning users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author: Uuid,
    pub task: Uuid,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(task: Uuid, author: Uuid, content: impl Into<String>, mentions: Vec<Uuid>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(TeamdeskError::validation("Comment content is required"));
        }
        let mut unique = Vec::with_capacity(mentions.len());
        for m in mentions {
            if m != author && !unique.contains(&m) {
                unique.push(m);
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            author,
            task,
            mentions: unique,
            created_at: Utc::now(),
        })
    }
}

impl Document for Comment {
    const COLLECTION: &'static str = "comments";

    fn id(&self) -> Uuid {
        self.id
    }
}
