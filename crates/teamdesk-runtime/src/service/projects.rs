use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    flexible_date, ActivityDraft, ActivityType, Actor, Notification, NotificationType, Page,
    PageRequest, Project, ProjectPriority, ProjectStatus, TargetType, Task, TaskStatus, TeamRole,
    User,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::{Outcome, StepOutcome};

use super::activity::ActivityRecorder;
use super::notify::Notifier;
use crate::store::{Filter, FindOptions, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInput {
    pub user: Uuid,
    #[serde(default)]
    pub role: TeamRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub priority: Option<ProjectPriority>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub team: Vec<MemberInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub end_date: Option<DateTime<Utc>>,
    pub progress: Option<u8>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
}

/// Task counts per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub todo: u64,
    pub in_progress: u64,
    pub review: u64,
    pub done: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub task_stats: TaskStats,
}

#[derive(Clone)]
pub struct ProjectService {
    store: Store,
    recorder: ActivityRecorder,
    notifier: Notifier,
}

impl ProjectService {
    pub fn new(store: Store, recorder: ActivityRecorder, notifier: Notifier) -> Self {
        Self {
            store,
            recorder,
            notifier,
        }
    }

    async fn require_active_user(&self, id: Uuid) -> Result<User> {
        match self.store.get::<User>(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(TeamdeskError::validation("Team member not found or inactive")),
        }
    }

    fn team_notice(
        actor: &Actor,
        project: &Project,
        user: Uuid,
        kind: NotificationType,
        title: &str,
        message: String,
    ) -> Notification {
        Notification::direct(user, Some(actor.id), kind, title, message)
            .with_related("project", project.id)
            .with_link(format!("/projects/{}", project.id))
    }

    /// Create a project owned by the actor, with an optional initial team.
    pub async fn create(&self, actor: &Actor, input: ProjectInput) -> Result<Outcome<Project>> {
        let mut project = Project::new(input.name.trim(), actor.id);
        project.description = input.description;
        project.status = input.status.unwrap_or_default();
        project.priority = input.priority.unwrap_or_default();
        project.start_date = input.start_date;
        project.end_date = input.end_date;
        project.progress = input.progress.unwrap_or(0);
        project.tags = input.tags;
        for member in &input.team {
            self.require_active_user(member.user).await?;
            project.add_member(member.user, member.role)?;
        }
        project.validate()?;
        self.store.insert(&project).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::ProjectCreated,
                    format!("created project \"{}\"", project.name),
                    TargetType::Project,
                    project.id,
                )
                .project(Some(project.id)),
            )
            .await;
        let notices: Vec<Notification> = project
            .team
            .iter()
            .map(|m| {
                Self::team_notice(
                    actor,
                    &project,
                    m.user,
                    NotificationType::ProjectAdded,
                    "Added to project",
                    format!("{} added you to \"{}\"", actor.name, project.name),
                )
            })
            .collect();
        let notifications = self.notifier.send_all(notices).await;

        let mut outcome = Outcome::new(project).with_activity(activity);
        outcome.notifications = notifications;
        Ok(outcome)
    }

    /// Newest first. Non-admins see projects they own or belong to.
    pub async fn list(
        &self,
        actor: &Actor,
        query: ProjectQuery,
        page: &PageRequest,
    ) -> Result<Page<Project>> {
        let mut filters = Vec::new();
        if !actor.is_admin() {
            filters.push(Filter::or([
                Filter::eq("owner", actor.id),
                Filter::eq("team.user", actor.id),
            ]));
        }
        if let Some(status) = query.status {
            filters.push(Filter::eq("status", status));
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            filters.push(Filter::contains("name", search.trim()));
        }
        self.store
            .page(Filter::and(filters), FindOptions::newest_first(), page)
            .await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ProjectDetail> {
        let project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::Read)?;
        let task_stats = self.task_stats(project.id).await?;
        Ok(ProjectDetail {
            project,
            task_stats,
        })
    }

    async fn task_stats(&self, project: Uuid) -> Result<TaskStats> {
        let tasks: Vec<Task> = self
            .store
            .find(Filter::eq("project", project), FindOptions::new())
            .await?;
        let mut stats = TaskStats {
            total: tasks.len() as u64,
            ..Default::default()
        };
        for task in &tasks {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Review => stats.review += 1,
                TaskStatus::Done => stats.done += 1,
            }
        }
        Ok(stats)
    }

    /// Apply field changes. A status change notifies the team and owner.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: ProjectUpdate,
    ) -> Result<Outcome<Project>> {
        let mut project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::Update)?;

        let mut changed = Vec::new();
        if let Some(name) = update.name {
            project.name = name.trim().to_string();
            changed.push("name");
        }
        if update.description.is_some() {
            project.description = update.description;
            changed.push("description");
        }
        let previous_status = project.status;
        if let Some(status) = update.status {
            project.status = status;
            changed.push("status");
        }
        if let Some(priority) = update.priority {
            project.priority = priority;
            changed.push("priority");
        }
        if update.start_date.is_some() {
            project.start_date = update.start_date;
            changed.push("startDate");
        }
        if update.end_date.is_some() {
            project.end_date = update.end_date;
            changed.push("endDate");
        }
        if let Some(progress) = update.progress {
            project.progress = progress;
            changed.push("progress");
        }
        if let Some(tags) = update.tags {
            project.tags = tags;
            changed.push("tags");
        }
        project.validate()?;
        project.updated_at = Utc::now();
        self.store.save(&project).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::ProjectUpdated,
                    format!("updated project \"{}\"", project.name),
                    TargetType::Project,
                    project.id,
                )
                .project(Some(project.id))
                .metadata(json!({ "fields": changed })),
            )
            .await;

        let mut notifications = Vec::new();
        if project.status != previous_status {
            let audience = std::iter::once(project.owner)
                .chain(project.team.iter().map(|m| m.user))
                .collect::<Vec<_>>();
            let notices: Vec<Notification> = audience
                .into_iter()
                .map(|user| {
                    Self::team_notice(
                        actor,
                        &project,
                        user,
                        NotificationType::ProjectUpdate,
                        "Project status changed",
                        format!("\"{}\" status changed by {}", project.name, actor.name),
                    )
                })
                .collect();
            notifications = self.notifier.send_all(notices).await;
        }

        let mut outcome = Outcome::new(project).with_activity(activity);
        outcome.notifications = notifications;
        Ok(outcome)
    }

    /// Delete a project that no task references.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<Outcome<()>> {
        let project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::Delete)?;
        if self
            .store
            .exists::<Task>(Filter::eq("project", project.id))
            .await?
        {
            return Err(TeamdeskError::Conflict(
                "Cannot delete project with existing tasks".to_string(),
            ));
        }
        self.store.delete::<Project>(project.id).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::ProjectDeleted,
                    format!("deleted project \"{}\"", project.name),
                    TargetType::Project,
                    project.id,
                )
                .metadata(json!({ "name": project.name })),
            )
            .await;
        Ok(Outcome::new(()).with_activity(activity))
    }

    pub async fn add_member(
        &self,
        actor: &Actor,
        id: Uuid,
        input: MemberInput,
    ) -> Result<Outcome<Project>> {
        let mut project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::ManageTeam)?;
        let member = self.require_active_user(input.user).await?;
        project.add_member(member.id, input.role)?;
        project.updated_at = Utc::now();
        self.store.save(&project).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::MemberAdded,
                    format!("added {} to \"{}\"", member.name, project.name),
                    TargetType::Project,
                    project.id,
                )
                .project(Some(project.id))
                .metadata(json!({ "member": member.id, "role": input.role })),
            )
            .await;
        let notified = self
            .notifier
            .send(Self::team_notice(
                actor,
                &project,
                member.id,
                NotificationType::ProjectAdded,
                "Added to project",
                format!("{} added you to \"{}\"", actor.name, project.name),
            ))
            .await;

        let mut outcome = Outcome::new(project).with_activity(activity);
        outcome.push_notification(notified);
        Ok(outcome)
    }

    pub async fn remove_member(
        &self,
        actor: &Actor,
        id: Uuid,
        user: Uuid,
    ) -> Result<Outcome<Project>> {
        let mut project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::ManageTeam)?;
        project.remove_member(user)?;
        project.updated_at = Utc::now();
        self.store.save(&project).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::MemberRemoved,
                    format!("removed a member from \"{}\"", project.name),
                    TargetType::Project,
                    project.id,
                )
                .project(Some(project.id))
                .metadata(json!({ "member": user })),
            )
            .await;
        let notified: StepOutcome = self
            .notifier
            .send(Self::team_notice(
                actor,
                &project,
                user,
                NotificationType::ProjectRemoved,
                "Removed from project",
                format!("You were removed from \"{}\"", project.name),
            ))
            .await;

        let mut outcome = Outcome::new(project).with_activity(activity);
        outcome.push_notification(notified);
        Ok(outcome)
    }
}
