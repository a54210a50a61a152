use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// Task workflow status. Any status may be assigned from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    #[serde(default)]
    pub project: Option<Uuid>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub watchers: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, assigned_to: Uuid, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assigned_to,
            created_by,
            project: None,
            due_date: None,
            completed_date: None,
            estimated_hours: None,
            actual_hours: None,
            tags: Vec::new(),
            watchers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign a new status. Returns true when this call moved the task into
    /// `done`, in which case the completion timestamp is recorded.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> bool {
        let entering_done = status == TaskStatus::Done && self.status != TaskStatus::Done;
        if entering_done {
            self.completed_date = Some(now);
        } else if status != TaskStatus::Done {
            self.completed_date = None;
        }
        self.status = status;
        entering_done
    }

    pub fn is_watcher(&self, user: Uuid) -> bool {
        self.watchers.contains(&user)
    }
}

impl Document for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in-progress"
        );
        let s: TaskStatus = serde_json::from_str("\"review\"").unwrap();
        assert_eq!(s, TaskStatus::Review);
    }

    #[test]
    fn test_completed_date_only_on_entering_done() {
        let mut task = Task::new("Write docs", Uuid::new_v4(), Uuid::new_v4());
        let t1 = Utc::now();
        assert!(!task.set_status(TaskStatus::InProgress, t1));
        assert!(task.completed_date.is_none());

        assert!(task.set_status(TaskStatus::Done, t1));
        assert_eq!(task.completed_date, Some(t1));

        // Re-assigning done keeps the original timestamp.
        let t2 = t1 + chrono::Duration::hours(1);
        assert!(!task.set_status(TaskStatus::Done, t2));
        assert_eq!(task.completed_date, Some(t1));
    }

    #[test]
    fn test_reopening_clears_completion() {
        let mut task = Task::new("Ship", Uuid::new_v4(), Uuid::new_v4());
        task.set_status(TaskStatus::Done, Utc::now());
        task.set_status(TaskStatus::Todo, Utc::now());
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.completed_date.is_none());
    }
}
