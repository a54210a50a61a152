use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;
use crate::error::{Result, TeamdeskError};

/// Hours in a standard working day; anything beyond counts as overtime.
pub const STANDARD_WORK_HOURS: f64 = 8.0;

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// A check-in or check-out event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckPoint {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl CheckPoint {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            location: None,
            note: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BreakType {
    Lunch,
    #[default]
    Short,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Break {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes; zero while the break is open.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, rename = "type")]
    pub kind: BreakType,
}

impl Break {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// One user's attendance for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub user: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub check_in: Option<CheckPoint>,
    #[serde(default)]
    pub check_out: Option<CheckPoint>,
    #[serde(default)]
    pub breaks: Vec<Break>,
    #[serde(default)]
    pub total_hours: f64,
    /// Minutes.
    #[serde(default)]
    pub total_break_time: f64,
    #[serde(default)]
    pub overtime_hours: f64,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    /// Start a day by checking in.
    pub fn check_in(user: Uuid, check_in: CheckPoint) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user,
            date: check_in.time.date_naive(),
            check_in: Some(check_in),
            check_out: None,
            breaks: Vec::new(),
            total_hours: 0.0,
            total_break_time: 0.0,
            overtime_hours: 0.0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn open_break(&self) -> Option<&Break> {
        self.breaks.iter().find(|b| b.is_open())
    }

    pub fn is_checked_out(&self) -> bool {
        self.check_out.is_some()
    }

    /// Open a new break. Rejected after check-out or while another break is open.
    pub fn start_break(&mut self, at: DateTime<Utc>, kind: BreakType) -> Result<()> {
        if self.check_in.is_none() {
            return Err(TeamdeskError::validation("You must check in first"));
        }
        if self.is_checked_out() {
            return Err(TeamdeskError::validation("Already checked out today"));
        }
        if self.open_break().is_some() {
            return Err(TeamdeskError::validation("A break is already in progress"));
        }
        self.breaks.push(Break {
            start_time: at,
            end_time: None,
            duration: 0.0,
            kind,
        });
        Ok(())
    }

    /// Close the open break.
    pub fn end_break(&mut self, at: DateTime<Utc>) -> Result<()> {
        let open = self
            .breaks
            .iter_mut()
            .find(|b| b.is_open())
            .ok_or_else(|| TeamdeskError::validation("No active break found"))?;
        if at < open.start_time {
            return Err(TeamdeskError::validation(
                "Break cannot end before it started",
            ));
        }
        open.end_time = Some(at);
        Ok(())
    }

    /// Record check-out. A break still open stays open and counts as zero.
    pub fn check_out(&mut self, check_out: CheckPoint) -> Result<()> {
        let check_in = self
            .check_in
            .as_ref()
            .ok_or_else(|| TeamdeskError::validation("You must check in first"))?;
        if self.check_out.is_some() {
            return Err(TeamdeskError::validation("Already checked out today"));
        }
        if check_out.time < check_in.time {
            return Err(TeamdeskError::validation(
                "Check-out time cannot be before check-in time",
            ));
        }
        self.check_out = Some(check_out);
        Ok(())
    }

    /// Derive break durations, worked hours and overtime from timestamps.
    ///
    /// Must run before every save. Does nothing to the totals until both
    /// check-in and check-out are present; open breaks count as zero.
    pub fn recompute(&mut self) {
        let mut break_minutes = 0.0;
        for b in &mut self.breaks {
            match b.end_time {
                Some(end) => {
                    b.duration = (end - b.start_time).num_milliseconds() as f64 / MS_PER_MINUTE;
                    break_minutes += b.duration;
                }
                None => b.duration = 0.0,
            }
        }
        self.total_break_time = break_minutes;

        let (Some(check_in), Some(check_out)) = (&self.check_in, &self.check_out) else {
            return;
        };
        let raw_hours =
            (check_out.time - check_in.time).num_milliseconds() as f64 / MS_PER_HOUR;
        self.total_hours = raw_hours - self.total_break_time / 60.0;
        self.overtime_hours = (self.total_hours - STANDARD_WORK_HOURS).max(0.0);
    }
}

impl Document for Attendance {
    const COLLECTION: &'static str = "attendance";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("user-date:{}:{}", self.user, self.date))
    }
}
