use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Vacation,
    Personal,
    Maternity,
    Paternity,
    Emergency,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalfDayPeriod {
    Morning,
    Afternoon,
}

/// Inclusive day count between two dates.
///
/// A half-day request spanning a single day counts as 0.5; every other span
/// counts at least 0.5. Fails when `end` precedes `start`.
pub fn compute_total_days(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    is_half_day: bool,
) -> Result<f64> {
    if end < start {
        return Err(TeamdeskError::validation(
            "End date must be on or after start date",
        ));
    }
    let days_diff = ((end - start).num_milliseconds() as f64 / MS_PER_DAY).ceil() + 1.0;
    if is_half_day && days_diff == 1.0 {
        Ok(0.5)
    } else {
        Ok(days_diff.max(0.5))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: Uuid,
    pub employee: Uuid,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_days: f64,
    #[serde(default)]
    pub is_half_day: bool,
    #[serde(default)]
    pub half_day_period: Option<HalfDayPeriod>,
    pub reason: String,
    #[serde(default)]
    pub status: LeaveStatus,
    #[serde(default)]
    pub approved_by: Option<Uuid>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Build a pending request with `total_days` already derived.
    pub fn new(
        employee: Uuid,
        leave_type: LeaveType,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        reason: impl Into<String>,
        is_half_day: bool,
    ) -> Result<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(TeamdeskError::validation("Reason is required"));
        }
        let now = Utc::now();
        let mut request = Self {
            id: Uuid::new_v4(),
            employee,
            leave_type,
            start_date,
            end_date,
            total_days: 0.0,
            is_half_day,
            half_day_period: None,
            reason,
            status: LeaveStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        request.recompute()?;
        Ok(request)
    }

    /// Re-derive `total_days`; runs before every save.
    pub fn recompute(&mut self) -> Result<()> {
        self.total_days = compute_total_days(self.start_date, self.end_date, self.is_half_day)?;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }

    /// Fail with `Conflict` unless the request is still pending.
    pub fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TeamdeskError::Conflict(
                "Leave request has already been processed".to_string(),
            ))
        }
    }

    /// Approve or reject a pending request.
    pub fn decide(
        &mut self,
        status: LeaveStatus,
        decided_by: Uuid,
        rejection_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_pending()?;
        match status {
            LeaveStatus::Approved | LeaveStatus::Rejected => {}
            _ => {
                return Err(TeamdeskError::validation(
                    "Status must be approved or rejected",
                ))
            }
        }
        self.status = status;
        self.approved_by = Some(decided_by);
        self.approved_at = Some(now);
        if status == LeaveStatus::Rejected {
            self.rejection_reason = rejection_reason;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Withdraw a pending request.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_pending() {
            return Err(TeamdeskError::Conflict(
                "Only pending leave requests can be cancelled".to_string(),
            ));
        }
        self.status = LeaveStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}

impl Document for LeaveRequest {
    const COLLECTION: &'static str = "leave_requests";

    fn id(&self) -> Uuid {
        self.id
    }
}
