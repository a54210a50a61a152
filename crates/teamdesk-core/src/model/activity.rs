use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

/// Closed set of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    UserRegistered,
    UserUpdated,
    UserDeactivated,
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    TaskDeleted,
    CommentAdded,
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    MemberAdded,
    MemberRemoved,
    CheckIn,
    CheckOut,
    BreakStarted,
    BreakEnded,
    AttendanceUpdated,
    LeaveRequested,
    LeaveApproved,
    LeaveRejected,
    LeaveCancelled,
    AnnouncementSent,
    ChatCreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    User,
    Task,
    Project,
    Attendance,
    Leave,
    Notification,
    Chat,
    Comment,
}

/// Immutable audit-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub user: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub action: String,
    pub target_type: TargetType,
    pub target_id: Uuid,
    #[serde(default)]
    pub project: Option<Uuid>,
    #[serde(default)]
    pub task: Option<Uuid>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Document for Activity {
    const COLLECTION: &'static str = "activities";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Builder for an [`Activity`]; `build` enforces the required fields.
#[derive(Debug, Clone)]
pub struct ActivityDraft {
    user: Uuid,
    kind: ActivityType,
    action: String,
    target_type: TargetType,
    target_id: Uuid,
    project: Option<Uuid>,
    task: Option<Uuid>,
    metadata: serde_json::Value,
}

impl ActivityDraft {
    pub fn new(
        user: Uuid,
        kind: ActivityType,
        action: impl Into<String>,
        target_type: TargetType,
        target_id: Uuid,
    ) -> Self {
        Self {
            user,
            kind,
            action: action.into(),
            target_type,
            target_id,
            project: None,
            task: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn project(mut self, project: Option<Uuid>) -> Self {
        self.project = project;
        self
    }

    pub fn task(mut self, task: Uuid) -> Self {
        self.task = Some(task);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn kind(&self) -> ActivityType {
        self.kind
    }

    pub fn build(self) -> Result<Activity> {
        if self.action.trim().is_empty() {
            return Err(TeamdeskError::validation("Activity action is required"));
        }
        if self.user.is_nil() || self.target_id.is_nil() {
            return Err(TeamdeskError::validation(
                "Activity actor and target are required",
            ));
        }
        Ok(Activity {
            id: Uuid::new_v4(),
            user: self.user,
            kind: self.kind,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            project: self.project,
            task: self.task,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_activity() {
        let user = Uuid::new_v4();
        let task = Uuid::new_v4();
        let activity = ActivityDraft::new(
            user,
            ActivityType::TaskCreated,
            "created task \"Docs\"",
            TargetType::Task,
            task,
        )
        .task(task)
        .metadata(serde_json::json!({"priority": "high"}))
        .build()
        .unwrap();

        assert_eq!(activity.user, user);
        assert_eq!(activity.task, Some(task));
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], "task_created");
        assert_eq!(json["targetType"], "task");
    }

    #[test]
    fn test_missing_fields_rejected() {
        let empty_action =
            ActivityDraft::new(Uuid::new_v4(), ActivityType::CheckIn, " ", TargetType::Attendance, Uuid::new_v4());
        assert!(empty_action.build().is_err());

        let nil_target = ActivityDraft::new(
            Uuid::new_v4(),
            ActivityType::CheckIn,
            "checked in",
            TargetType::Attendance,
            Uuid::nil(),
        );
        assert!(nil_target.build().is_err());
    }
}
