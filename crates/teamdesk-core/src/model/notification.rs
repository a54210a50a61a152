use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Actor, Document, Role};
use crate::error::{Result, TeamdeskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskUpdated,
    TaskCompleted,
    TaskComment,
    Mention,
    LeaveRequest,
    LeaveApproved,
    LeaveRejected,
    ProjectAdded,
    ProjectRemoved,
    ProjectUpdate,
    Announcement,
    ChatMessage,
    General,
}

/// Audience of a broadcast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastTarget {
    All,
    Employees,
    Admins,
    Department,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Entity a notification points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub kind: String,
    pub id: Uuid,
}

impl RelatedEntity {
    pub fn new(kind: impl Into<String>, id: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(default)]
    pub recipient: Option<Uuid>,
    #[serde(default)]
    pub sender: Option<Uuid>,
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default)]
    pub broadcast_target: Option<BroadcastTarget>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub related_entity: Option<RelatedEntity>,
    #[serde(default)]
    pub priority: NotificationPriority,
    /// Read flag for direct notifications.
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    /// Per-user read state for broadcast notifications.
    #[serde(default)]
    pub read_by: Vec<Uuid>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// A notification addressed to one user.
    pub fn direct(
        recipient: Uuid,
        sender: Option<Uuid>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: Some(recipient),
            sender,
            broadcast: false,
            broadcast_target: None,
            department: None,
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
            related_entity: None,
            priority: NotificationPriority::Medium,
            is_read: false,
            read_at: None,
            read_by: Vec::new(),
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// A single notification visible to a computed audience.
    pub fn broadcast(
        sender: Option<Uuid>,
        target: BroadcastTarget,
        department: Option<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: None,
            sender,
            broadcast: true,
            broadcast_target: Some(target),
            department,
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
            related_entity: None,
            priority: NotificationPriority::Medium,
            is_read: false,
            read_at: None,
            read_by: Vec::new(),
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_related(mut self, kind: impl Into<String>, id: Uuid) -> Self {
        self.related_entity = Some(RelatedEntity::new(kind, id));
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Checks the recipient/broadcast and department invariants.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(TeamdeskError::validation("Title and message are required"));
        }
        if self.broadcast {
            let target = self.broadcast_target.ok_or_else(|| {
                TeamdeskError::validation("Broadcast target is required for broadcasts")
            })?;
            let has_department = self
                .department
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty());
            if target == BroadcastTarget::Department && !has_department {
                return Err(TeamdeskError::validation(
                    "Department is required for department broadcasts",
                ));
            }
        } else if self.recipient.is_none() {
            return Err(TeamdeskError::validation(
                "Recipient is required for non-broadcast notifications",
            ));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether `user` is in the audience of this notification.
    ///
    /// The single audience predicate used by listing, unread counts and
    /// mark-all-read.
    pub fn is_visible_to(&self, user: &Actor) -> bool {
        if !self.broadcast {
            return self.recipient == Some(user.id);
        }
        match self.broadcast_target {
            Some(BroadcastTarget::All) => true,
            Some(BroadcastTarget::Admins) => user.role == Role::Admin,
            Some(BroadcastTarget::Employees) => user.role == Role::Employee,
            Some(BroadcastTarget::Department) => match (&self.department, &user.department) {
                (Some(target), Some(mine)) => target == mine,
                _ => false,
            },
            None => false,
        }
    }

    pub fn is_read_by(&self, user: Uuid) -> bool {
        if self.broadcast {
            self.read_by.contains(&user)
        } else {
            self.is_read
        }
    }

    /// Mark read for `user`. Returns false if it was already read.
    pub fn mark_read(&mut self, user: Uuid, now: DateTime<Utc>) -> bool {
        if self.is_read_by(user) {
            return false;
        }
        if self.broadcast {
            self.read_by.push(user);
        } else {
            self.is_read = true;
            self.read_at = Some(now);
        }
        true
    }

    /// Snapshot with `isRead` resolved for one viewer.
    pub fn view_for(&self, user: Uuid) -> Notification {
        let mut view = self.clone();
        view.is_read = self.is_read_by(user);
        view.read_by.clear();
        view
    }
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}
