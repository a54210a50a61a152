use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    flexible_date, ActivityDraft, ActivityType, Actor, Comment, Notification, NotificationType,
    Page, PageRequest, Project, TargetType, Task, TaskPriority, TaskStatus, User, UserSummary,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use super::notify::Notifier;
use crate::store::{Filter, FindOptions, Store};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub assigned_to: Uuid,
    #[serde(default)]
    pub project: Option<Uuid>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub watchers: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub project: Option<Uuid>,
    #[serde(default, deserialize_with = "flexible_date::option::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub watchers: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

/// Task with its people and project resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: Option<UserSummary>,
    pub creator: Option<UserSummary>,
    pub project_name: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    store: Store,
    recorder: ActivityRecorder,
    notifier: Notifier,
}

impl TaskService {
    pub fn new(store: Store, recorder: ActivityRecorder, notifier: Notifier) -> Self {
        Self {
            store,
            recorder,
            notifier,
        }
    }

    async fn active_assignee(&self, id: Uuid) -> Result<User> {
        match self.store.get::<User>(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(TeamdeskError::validation(
                "Assigned user not found or inactive",
            )),
        }
    }

    async fn readable_project(&self, actor: &Actor, id: Uuid) -> Result<Project> {
        let project: Project = self.store.require(id, "Project").await?;
        ensure(&project, actor, Action::Read)?;
        Ok(project)
    }

    pub async fn view(&self, task: Task) -> Result<TaskView> {
        let assignee = self
            .store
            .get::<User>(task.assigned_to)
            .await?
            .map(|u| u.summary());
        let creator = self
            .store
            .get::<User>(task.created_by)
            .await?
            .map(|u| u.summary());
        let project_name = match task.project {
            Some(id) => self.store.get::<Project>(id).await?.map(|p| p.name),
            None => None,
        };
        Ok(TaskView {
            task,
            assignee,
            creator,
            project_name,
        })
    }

    pub async fn create(&self, actor: &Actor, input: TaskInput) -> Result<Outcome<TaskView>> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(TeamdeskError::validation("Task title is required"));
        }
        let assignee = self.active_assignee(input.assigned_to).await?;
        if let Some(project) = input.project {
            self.readable_project(actor, project).await?;
        }

        let now = Utc::now();
        let mut task = Task::new(title, assignee.id, actor.id);
        task.description = input.description;
        task.priority = input.priority.unwrap_or_default();
        task.project = input.project;
        task.due_date = input.due_date;
        task.estimated_hours = input.estimated_hours;
        task.tags = input.tags;
        task.watchers = input.watchers;
        if let Some(status) = input.status {
            task.set_status(status, now);
        }
        self.store.insert(&task).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::TaskCreated,
                    format!("created task \"{}\"", task.title),
                    TargetType::Task,
                    task.id,
                )
                .project(task.project)
                .task(task.id),
            )
            .await;
        let assigned = self
            .notifier
            .send(assignment_notice(actor, &task))
            .await;

        let mut outcome = Outcome::new(self.view(task).await?).with_activity(activity);
        outcome.push_notification(assigned);
        Ok(outcome)
    }

    /// Newest first. Non-admins see tasks they created, own or watch.
    pub async fn list(
        &self,
        actor: &Actor,
        query: TaskQuery,
        page: &PageRequest,
    ) -> Result<Page<TaskView>> {
        let mut filters = Vec::new();
        if !actor.is_admin() {
            filters.push(Filter::or([
                Filter::eq("assignedTo", actor.id),
                Filter::eq("createdBy", actor.id),
                Filter::eq("watchers", actor.id),
            ]));
        }
        if let Some(status) = query.status {
            filters.push(Filter::eq("status", status));
        }
        if let Some(priority) = query.priority {
            filters.push(Filter::eq("priority", priority));
        }
        if let Some(project) = query.project {
            filters.push(Filter::eq("project", project));
        }
        if let Some(assignee) = query.assigned_to {
            filters.push(Filter::eq("assignedTo", assignee));
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            filters.push(Filter::or([
                Filter::contains("title", search.trim()),
                Filter::contains("description", search.trim()),
            ]));
        }

        let found: Page<Task> = self
            .store
            .page(Filter::and(filters), FindOptions::newest_first(), page)
            .await?;
        let mut items = Vec::with_capacity(found.items.len());
        for task in found.items {
            items.push(self.view(task).await?);
        }
        Ok(Page {
            items,
            pagination: found.pagination,
        })
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<TaskView> {
        let task: Task = self.store.require(id, "Task").await?;
        ensure(&task, actor, Action::Read)?;
        self.view(task).await
    }

    /// Apply field changes. Reassignment notifies the new assignee; entering
    /// `done` notifies the creator.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: TaskUpdate,
    ) -> Result<Outcome<TaskView>> {
        let mut task: Task = self.store.require(id, "Task").await?;
        ensure(&task, actor, Action::Update)?;
        let now = Utc::now();

        let mut changed = Vec::new();
        let mut reassigned = false;
        if let Some(assignee) = update.assigned_to.filter(|a| *a != task.assigned_to) {
            self.active_assignee(assignee).await?;
            task.assigned_to = assignee;
            reassigned = true;
            changed.push("assignedTo");
        }
        if let Some(project) = update.project {
            if task.project != Some(project) {
                self.readable_project(actor, project).await?;
                task.project = Some(project);
                changed.push("project");
            }
        }
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(TeamdeskError::validation("Task title is required"));
            }
            task.title = title.trim().to_string();
            changed.push("title");
        }
        if update.description.is_some() {
            task.description = update.description;
            changed.push("description");
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
            changed.push("priority");
        }
        if update.due_date.is_some() {
            task.due_date = update.due_date;
            changed.push("dueDate");
        }
        if update.estimated_hours.is_some() {
            task.estimated_hours = update.estimated_hours;
            changed.push("estimatedHours");
        }
        if update.actual_hours.is_some() {
            task.actual_hours = update.actual_hours;
            changed.push("actualHours");
        }
        if let Some(tags) = update.tags {
            task.tags = tags;
            changed.push("tags");
        }
        if let Some(watchers) = update.watchers {
            task.watchers = watchers;
            changed.push("watchers");
        }
        let previous_status = task.status;
        let mut completed = false;
        if let Some(status) = update.status {
            completed = task.set_status(status, now);
            changed.push("status");
        }
        task.updated_at = now;
        self.store.save(&task).await?;

        let (kind, action) = if completed {
            (
                ActivityType::TaskCompleted,
                format!("completed task \"{}\"", task.title),
            )
        } else {
            (
                ActivityType::TaskUpdated,
                format!("updated task \"{}\"", task.title),
            )
        };
        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(actor.id, kind, action, TargetType::Task, task.id)
                    .project(task.project)
                    .task(task.id)
                    .metadata(json!({
                        "fields": changed,
                        "previousStatus": previous_status,
                        "status": task.status,
                    })),
            )
            .await;

        let mut notices = Vec::new();
        if reassigned {
            notices.push(assignment_notice(actor, &task));
        }
        if completed {
            notices.push(
                Notification::direct(
                    task.created_by,
                    Some(actor.id),
                    NotificationType::TaskCompleted,
                    "Task completed",
                    format!("{} completed \"{}\"", actor.name, task.title),
                )
                .with_related("task", task.id)
                .with_link(task_link(task.id)),
            );
        } else if task.status != previous_status && !reassigned {
            notices.push(
                Notification::direct(
                    task.assigned_to,
                    Some(actor.id),
                    NotificationType::TaskUpdated,
                    "Task updated",
                    format!("{} moved \"{}\" to {}", actor.name, task.title, status_label(task.status)),
                )
                .with_related("task", task.id)
                .with_link(task_link(task.id)),
            );
        }
        let notifications = self.notifier.send_all(notices).await;

        let mut outcome = Outcome::new(self.view(task).await?).with_activity(activity);
        outcome.notifications = notifications;
        Ok(outcome)
    }

    /// Delete a task together with its comments.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<Outcome<()>> {
        let task: Task = self.store.require(id, "Task").await?;
        ensure(&task, actor, Action::Delete)?;

        self.store.delete::<Task>(task.id).await?;
        let comments = self
            .store
            .delete_many::<Comment>(Filter::eq("task", task.id))
            .await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::TaskDeleted,
                    format!("deleted task \"{}\"", task.title),
                    TargetType::Task,
                    task.id,
                )
                .project(task.project)
                .metadata(json!({ "title": task.title, "comments": comments })),
            )
            .await;
        Ok(Outcome::new(()).with_activity(activity))
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in progress",
        TaskStatus::Review => "review",
        TaskStatus::Done => "done",
    }
}

fn task_link(id: Uuid) -> String {
    format!("/tasks/{}", id)
}

fn assignment_notice(actor: &Actor, task: &Task) -> Notification {
    Notification::direct(
        task.assigned_to,
        Some(actor.id),
        NotificationType::TaskAssigned,
        "New task assigned",
        format!("{} assigned you \"{}\"", actor.name, task.title),
    )
    .with_related("task", task.id)
    .with_link(task_link(task.id))
}
