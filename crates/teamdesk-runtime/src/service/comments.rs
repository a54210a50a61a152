use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teamdesk_core::error::Result;
use teamdesk_core::model::{
    ActivityDraft, ActivityType, Actor, Comment, Notification, NotificationType, TargetType, Task,
    User, UserSummary,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use super::notify::Notifier;
use crate::store::{Filter, FindOptions, SortOrder, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub author: Option<UserSummary>,
    pub task: Uuid,
    pub mentions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CommentService {
    store: Store,
    recorder: ActivityRecorder,
    notifier: Notifier,
}

impl CommentService {
    pub fn new(store: Store, recorder: ActivityRecorder, notifier: Notifier) -> Self {
        Self {
            store,
            recorder,
            notifier,
        }
    }

    async fn view(&self, comment: Comment) -> Result<CommentView> {
        let author = self
            .store
            .get::<User>(comment.author)
            .await?
            .map(|u| u.summary());
        Ok(CommentView {
            id: comment.id,
            content: comment.content,
            author,
            task: comment.task,
            mentions: comment.mentions,
            created_at: comment.created_at,
        })
    }

    /// Comments on a task, oldest first.
    pub async fn list(&self, actor: &Actor, task_id: Uuid) -> Result<Vec<CommentView>> {
        let task: Task = self.store.require(task_id, "Task").await?;
        ensure(&task, actor, Action::Read)?;

        let comments: Vec<Comment> = self
            .store
            .find(
                Filter::eq("task", task.id),
                FindOptions::new().sort("createdAt", SortOrder::Asc),
            )
            .await?;
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(self.view(comment).await?);
        }
        Ok(views)
    }

    /// Add a comment. Mentioned users get a `mention`; the assignee and
    /// creator get a `task_comment` unless they were mentioned.
    pub async fn add(
        &self,
        actor: &Actor,
        task_id: Uuid,
        input: CommentInput,
    ) -> Result<Outcome<CommentView>> {
        let task: Task = self.store.require(task_id, "Task").await?;
        ensure(&task, actor, Action::Comment)?;

        let mut mentions = Vec::with_capacity(input.mentions.len());
        for id in input.mentions {
            if self.store.get::<User>(id).await?.is_some_and(|u| u.is_active) {
                mentions.push(id);
            }
        }
        let comment = Comment::new(task.id, actor.id, input.content, mentions)?;
        self.store.insert(&comment).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::CommentAdded,
                    format!("commented on \"{}\"", task.title),
                    TargetType::Comment,
                    comment.id,
                )
                .project(task.project)
                .task(task.id),
            )
            .await;

        let mut notices = Vec::new();
        for user in &comment.mentions {
            notices.push(
                Notification::direct(
                    *user,
                    Some(actor.id),
                    NotificationType::Mention,
                    "You were mentioned",
                    format!("{} mentioned you on \"{}\"", actor.name, task.title),
                )
                .with_related("task", task.id)
                .with_link(format!("/tasks/{}", task.id)),
            );
        }
        let mut followers = vec![task.assigned_to];
        if task.created_by != task.assigned_to {
            followers.push(task.created_by);
        }
        for user in followers {
            if comment.mentions.contains(&user) {
                continue;
            }
            notices.push(
                Notification::direct(
                    user,
                    Some(actor.id),
                    NotificationType::TaskComment,
                    "New comment",
                    format!("{} commented on \"{}\"", actor.name, task.title),
                )
                .with_related("task", task.id)
                .with_link(format!("/tasks/{}", task.id)),
            );
        }
        let notifications = self.notifier.send_all(notices).await;

        let mut outcome = Outcome::new(self.view(comment).await?).with_activity(activity);
        outcome.notifications = notifications;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::error::TeamdeskError;
    use teamdesk_core::model::Role;
    use teamdesk_core::StepOutcome;

    async fn setup() -> (Store, CommentService, User, User, User, Task) {
        let store = Store::memory();
        let creator = User::new("Creator", "c@example.com", "h", Role::Employee);
        let assignee = User::new("Assignee", "a@example.com", "h", Role::Employee);
        let outsider = User::new("Outsider", "o@example.com", "h", Role::Employee);
        for u in [&creator, &assignee, &outsider] {
            store.insert(u).await.unwrap();
        }
        let task = Task::new("Review PR", assignee.id, creator.id);
        store.insert(&task).await.unwrap();
        let service = CommentService::new(
            store.clone(),
            ActivityRecorder::new(store.clone()),
            Notifier::new(store.clone()),
        );
        (store, service, creator, assignee, outsider, task)
    }

    #[tokio::test]
    async fn test_comment_notifies_followers_and_mentions() {
        let (store, comments, creator, assignee, outsider, task) = setup().await;
        let added = comments
            .add(
                &assignee.actor(),
                task.id,
                CommentInput {
                    content: "ping @creator".into(),
                    mentions: vec![creator.id, outsider.id, Uuid::new_v4()],
                },
            )
            .await
            .unwrap();
        assert_eq!(added.entity.mentions, vec![creator.id, outsider.id]);
        assert_eq!(added.entity.author.as_ref().unwrap().name, "Assignee");
        // two mentions, assignee skipped as self, creator already mentioned
        assert_eq!(added.notifications.len(), 3);
        assert_eq!(added.notifications[2], StepOutcome::Skipped);

        let to_creator: Vec<Notification> = store
            .find(Filter::eq("recipient", creator.id), FindOptions::new())
            .await
            .unwrap();
        assert_eq!(to_creator.len(), 1);
        assert_eq!(to_creator[0].kind, NotificationType::Mention);
    }

    #[tokio::test]
    async fn test_outsider_cannot_comment() {
        let (_, comments, _, _, outsider, task) = setup().await;
        let err = comments
            .add(
                &outsider.actor(),
                task.id,
                CommentInput {
                    content: "hello".into(),
                    mentions: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TeamdeskError::Forbidden(_)));
        assert!(comments.list(&outsider.actor(), task.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_oldest_first() {
        let (_, comments, creator, _, _, task) = setup().await;
        for text in ["first", "second"] {
            comments
                .add(
                    &creator.actor(),
                    task.id,
                    CommentInput {
                        content: text.into(),
                        mentions: vec![],
                    },
                )
                .await
                .unwrap();
        }
        let listed = comments.list(&creator.actor(), task.id).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
