//! Activity recorder.
//!
//! Every mutating service operation appends one audit entry through
//! [`ActivityRecorder::record`].

use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    Activity, ActivityDraft, Actor, Page, PageRequest, Project, Task, User, UserSummary,
};
use teamdesk_core::StepOutcome;

use crate::store::{Filter, FindOptions, Store};

/// An activity with its references resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub actor: Option<UserSummary>,
    pub project_name: Option<String>,
    pub task_title: Option<String>,
}

#[derive(Clone)]
pub struct ActivityRecorder {
    store: Store,
}

impl ActivityRecorder {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Validate and append an activity, then resolve it for display.
    ///
    /// Failures are logged and returned to the caller.
    pub async fn record(&self, draft: ActivityDraft) -> Result<ActivityView> {
        let kind = draft.kind();
        let activity = draft.build().inspect_err(|e| {
            error!(?kind, error = %e, "Rejected activity");
        })?;

        self.store.insert(&activity).await.inspect_err(|e| {
            error!(?kind, error = %e, "Failed to record activity");
        })?;
        debug!(id = %activity.id, ?kind, "Activity recorded");

        self.view(activity).await
    }

    /// [`record`](Self::record) folded into a side-effect step.
    pub async fn record_step(&self, draft: ActivityDraft) -> StepOutcome {
        StepOutcome::from_result(self.record(draft).await.map(|v| v.activity.id))
    }

    pub async fn view(&self, activity: Activity) -> Result<ActivityView> {
        let actor = self
            .store
            .get::<User>(activity.user)
            .await?
            .map(|u| u.summary());
        let project_name = match activity.project {
            Some(id) => self.store.get::<Project>(id).await?.map(|p| p.name),
            None => None,
        };
        let task_title = match activity.task {
            Some(id) => self.store.get::<Task>(id).await?.map(|t| t.title),
            None => None,
        };

        Ok(ActivityView {
            activity,
            actor,
            project_name,
            task_title,
        })
    }

    /// Activity feed of one user, newest first. Visible to the user and admins.
    pub async fn list_for_user(
        &self,
        actor: &Actor,
        user: Uuid,
        page: &PageRequest,
    ) -> Result<Page<ActivityView>> {
        if !actor.is_admin() && actor.id != user {
            return Err(TeamdeskError::forbidden(
                "Not authorized to view this activity feed",
            ));
        }

        let found: Page<Activity> = self
            .store
            .page(Filter::eq("user", user), FindOptions::newest_first(), page)
            .await?;

        let mut items = Vec::with_capacity(found.items.len());
        for activity in found.items {
            items.push(self.view(activity).await?);
        }
        Ok(Page {
            items,
            pagination: found.pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::model::{ActivityType, Role, TargetType};

    #[tokio::test]
    async fn test_record_resolves_references() {
        let store = Store::memory();
        let user = User::new("Ada", "ada@example.com", "h", Role::Employee);
        store.insert(&user).await.unwrap();
        let task = Task::new("Ship it", user.id, user.id);
        store.insert(&task).await.unwrap();

        let recorder = ActivityRecorder::new(store);
        let view = recorder
            .record(
                ActivityDraft::new(
                    user.id,
                    ActivityType::TaskCreated,
                    "created task Ship it",
                    TargetType::Task,
                    task.id,
                )
                .task(task.id),
            )
            .await
            .unwrap();

        assert_eq!(view.actor.unwrap().name, "Ada");
        assert_eq!(view.task_title.as_deref(), Some("Ship it"));
        assert!(view.project_name.is_none());
    }

    #[tokio::test]
    async fn test_missing_action_fails_step() {
        let recorder = ActivityRecorder::new(Store::memory());
        let step = recorder
            .record_step(ActivityDraft::new(
                Uuid::new_v4(),
                ActivityType::CheckIn,
                "",
                TargetType::Attendance,
                Uuid::new_v4(),
            ))
            .await;
        assert!(step.is_failed());
    }

    #[tokio::test]
    async fn test_feed_visibility() {
        let store = Store::memory();
        let owner = User::new("Owner", "o@example.com", "h", Role::Employee);
        let other = User::new("Other", "x@example.com", "h", Role::Employee);
        let recorder = ActivityRecorder::new(store);
        for i in 0..3 {
            recorder
                .record(ActivityDraft::new(
                    owner.id,
                    ActivityType::CheckIn,
                    format!("checked in {}", i),
                    TargetType::Attendance,
                    Uuid::new_v4(),
                ))
                .await
                .unwrap();
        }

        let page = recorder
            .list_for_user(&owner.actor(), owner.id, &PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 2);

        let err = recorder
            .list_for_user(&other.actor(), owner.id, &PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TeamdeskError::Forbidden(_)));
    }
}
