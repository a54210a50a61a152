//! Notification inbox.
//!
//! A user's inbox is the union of notifications addressed to them and every
//! broadcast. [`Notification::is_visible_to`] narrows the broadcasts to the
//! audience; listing, unread counts and mark-all-read share that predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    flexible_date, ActivityDraft, ActivityType, Actor, BroadcastTarget, Notification,
    NotificationPriority, NotificationType, Page, PageRequest, TargetType,
};
use teamdesk_core::policy::ensure_admin;
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use crate::store::{Filter, FindOptions, Store};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastInput {
    pub title: String,
    pub message: String,
    #[serde(default = "default_target")]
    pub target: BroadcastTarget,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_target() -> BroadcastTarget {
    BroadcastTarget::All
}

/// One page of the inbox plus the unread count over all of it.
#[derive(Debug, Clone)]
pub struct Inbox {
    pub page: Page<Notification>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub updated: u64,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Store,
    recorder: ActivityRecorder,
}

impl NotificationService {
    pub fn new(store: Store, recorder: ActivityRecorder) -> Self {
        Self { store, recorder }
    }

    /// Every live notification in `actor`'s inbox, newest first.
    async fn inbox(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Vec<Notification>> {
        let candidates: Vec<Notification> = self
            .store
            .find(
                Filter::or([
                    Filter::eq("recipient", actor.id),
                    Filter::eq("broadcast", true),
                ]),
                FindOptions::newest_first(),
            )
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|n| n.is_visible_to(actor) && !n.is_expired(at))
            .collect())
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: InboxQuery,
        page: &PageRequest,
        at: DateTime<Utc>,
    ) -> Result<Inbox> {
        let inbox = self.inbox(actor, at).await?;
        let unread_count = inbox.iter().filter(|n| !n.is_read_by(actor.id)).count() as u64;

        let selected: Vec<Notification> = if query.unread_only {
            inbox
                .into_iter()
                .filter(|n| !n.is_read_by(actor.id))
                .collect()
        } else {
            inbox
        };
        let total = selected.len() as u64;
        let items = page
            .slice(selected)
            .into_iter()
            .map(|n| n.view_for(actor.id))
            .collect();
        Ok(Inbox {
            page: Page {
                items,
                pagination: page.pagination(total),
            },
            unread_count,
        })
    }

    async fn require_visible(&self, actor: &Actor, id: Uuid) -> Result<Notification> {
        let notification: Notification = self.store.require(id, "Notification").await?;
        if !notification.is_visible_to(actor) {
            return Err(TeamdeskError::forbidden(
                "Not authorized to access this notification",
            ));
        }
        Ok(notification)
    }

    pub async fn mark_read(
        &self,
        actor: &Actor,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Notification> {
        let mut notification = self.require_visible(actor, id).await?;
        if notification.mark_read(actor.id, at) {
            self.store.save(&notification).await?;
        }
        Ok(notification.view_for(actor.id))
    }

    pub async fn mark_all_read(&self, actor: &Actor, at: DateTime<Utc>) -> Result<MarkedRead> {
        let mut updated = 0;
        for mut notification in self.inbox(actor, at).await? {
            if notification.mark_read(actor.id, at) {
                self.store.save(&notification).await?;
                updated += 1;
            }
        }
        Ok(MarkedRead { updated })
    }

    /// Recipients delete their own notifications; broadcasts need an admin.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let notification = self.require_visible(actor, id).await?;
        if notification.broadcast {
            ensure_admin(actor)?;
        }
        self.store.delete::<Notification>(notification.id).await?;
        Ok(())
    }

    /// Admin announcement to a computed audience.
    pub async fn broadcast(
        &self,
        actor: &Actor,
        input: BroadcastInput,
    ) -> Result<Outcome<Notification>> {
        ensure_admin(actor)?;

        let mut notification = Notification::broadcast(
            Some(actor.id),
            input.target,
            input.department,
            NotificationType::Announcement,
            input.title,
            input.message,
        )
        .with_priority(input.priority);
        notification.link = input.link;
        notification.expires_at = input.expires_at;
        notification.validate()?;
        self.store.insert(&notification).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::AnnouncementSent,
                    format!("sent announcement \"{}\"", notification.title),
                    TargetType::Notification,
                    notification.id,
                )
                .metadata(json!({
                    "target": notification.broadcast_target,
                    "department": notification.department,
                })),
            )
            .await;
        Ok(Outcome::new(notification).with_activity(activity))
    }

    /// Delete notifications whose expiry has passed.
    pub async fn purge_expired(&self, at: DateTime<Utc>) -> Result<u64> {
        self.store
            .delete_many::<Notification>(Filter::lte("expiresAt", at))
            .await
    }
}
