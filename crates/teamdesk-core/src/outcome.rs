//! Result of a mutation together with its side effects.
//!
//! A mutation saves an entity, records an activity and may create
//! notifications. These writes are independent; a failure after the entity
//! save is reported here instead of being discarded.

use serde::Serialize;
use uuid::Uuid;

/// State of one side-effect write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Recorded { id: Uuid },
    Skipped,
    Failed { reason: String },
}

impl StepOutcome {
    pub fn from_result<E: std::fmt::Display>(result: Result<Uuid, E>) -> Self {
        match result {
            Ok(id) => Self::Recorded { id },
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn recorded_id(&self) -> Option<Uuid> {
        match self {
            Self::Recorded { id } => Some(*id),
            _ => None,
        }
    }
}

/// A persisted entity plus the outcome of its side effects.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub entity: T,
    pub activity: StepOutcome,
    pub notifications: Vec<StepOutcome>,
}

impl<T> Outcome<T> {
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            activity: StepOutcome::Skipped,
            notifications: Vec::new(),
        }
    }

    pub fn with_activity(mut self, activity: StepOutcome) -> Self {
        self.activity = activity;
        self
    }

    pub fn push_notification(&mut self, step: StepOutcome) {
        self.notifications.push(step);
    }

    /// True when no side effect failed.
    pub fn is_complete(&self) -> bool {
        !self.activity.is_failed() && !self.notifications.iter().any(StepOutcome::is_failed)
    }

    /// Reasons of the failed steps, for logging.
    pub fn failures(&self) -> Vec<&str> {
        std::iter::once(&self.activity)
            .chain(self.notifications.iter())
            .filter_map(|s| match s {
                StepOutcome::Failed { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            entity: f(self.entity),
            activity: self.activity,
            notifications: self.notifications,
        }
    }
}
