//! Daily attendance: check-in, breaks, check-out and admin corrections.
//!
//! Every operation takes the instant it happens at, so the calendar day a
//! record belongs to is derived from the caller's clock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    ActivityDraft, ActivityType, Actor, Attendance, Break, BreakType, CheckPoint, Page,
    PageRequest, TargetType,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use crate::store::{Filter, FindOptions, SortOrder, Store};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckInput {
    pub location: Option<String>,
    pub note: Option<String>,
}

impl CheckInput {
    fn at(self, time: DateTime<Utc>) -> CheckPoint {
        CheckPoint {
            time,
            location: self.location,
            note: self.note,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreakInput {
    #[serde(default, rename = "type")]
    pub kind: BreakType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub user: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Admin correction of a record's timestamps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub breaks: Option<Vec<Break>>,
    pub notes: Option<String>,
}

/// Totals over a date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_days: u64,
    pub completed_days: u64,
    pub total_hours: f64,
    pub total_break_minutes: f64,
    pub overtime_hours: f64,
    pub average_hours: f64,
}

#[derive(Clone)]
pub struct AttendanceService {
    store: Store,
    recorder: ActivityRecorder,
}

impl AttendanceService {
    pub fn new(store: Store, recorder: ActivityRecorder) -> Self {
        Self { store, recorder }
    }

    async fn for_day(&self, user: Uuid, date: NaiveDate) -> Result<Option<Attendance>> {
        self.store
            .find_one(Filter::and([
                Filter::eq("user", user),
                Filter::eq("date", date),
            ]))
            .await
    }

    async fn require_today(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Attendance> {
        self.for_day(actor.id, at.date_naive())
            .await?
            .ok_or_else(|| TeamdeskError::validation("You must check in first"))
    }

    async fn persist(
        &self,
        actor: &Actor,
        mut record: Attendance,
        kind: ActivityType,
        action: &str,
    ) -> Result<Outcome<Attendance>> {
        record.recompute();
        record.updated_at = Utc::now();
        self.store.save(&record).await?;
        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(actor.id, kind, action, TargetType::Attendance, record.id)
                    .metadata(json!({
                        "date": record.date,
                        "totalHours": record.total_hours,
                    })),
            )
            .await;
        Ok(Outcome::new(record).with_activity(activity))
    }

    pub async fn check_in(
        &self,
        actor: &Actor,
        input: CheckInput,
        at: DateTime<Utc>,
    ) -> Result<Outcome<Attendance>> {
        let already = || TeamdeskError::Conflict("Already checked in today".to_string());
        if self.for_day(actor.id, at.date_naive()).await?.is_some() {
            return Err(already());
        }

        let mut record = Attendance::check_in(actor.id, input.at(at));
        record.recompute();
        // the store's (user, date) key settles concurrent check-ins
        self.store.insert(&record).await.map_err(|e| {
            if e.is_duplicate() {
                already()
            } else {
                e
            }
        })?;

        let activity = self
            .recorder
            .record_step(ActivityDraft::new(
                actor.id,
                ActivityType::CheckIn,
                "checked in",
                TargetType::Attendance,
                record.id,
            ))
            .await;
        Ok(Outcome::new(record).with_activity(activity))
    }

    pub async fn check_out(
        &self,
        actor: &Actor,
        input: CheckInput,
        at: DateTime<Utc>,
    ) -> Result<Outcome<Attendance>> {
        let mut record = self.require_today(actor, at).await?;
        record.check_out(input.at(at))?;
        self.persist(actor, record, ActivityType::CheckOut, "checked out")
            .await
    }

    pub async fn start_break(
        &self,
        actor: &Actor,
        input: BreakInput,
        at: DateTime<Utc>,
    ) -> Result<Outcome<Attendance>> {
        let mut record = self.require_today(actor, at).await?;
        record.start_break(at, input.kind)?;
        self.persist(actor, record, ActivityType::BreakStarted, "started a break")
            .await
    }

    pub async fn end_break(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Outcome<Attendance>> {
        let mut record = self.require_today(actor, at).await?;
        record.end_break(at)?;
        self.persist(actor, record, ActivityType::BreakEnded, "ended a break")
            .await
    }

    pub async fn today(&self, actor: &Actor, at: DateTime<Utc>) -> Result<Option<Attendance>> {
        self.for_day(actor.id, at.date_naive()).await
    }

    fn scope(actor: &Actor, query: &AttendanceQuery) -> Filter {
        let user = if actor.is_admin() {
            query.user
        } else {
            Some(actor.id)
        };
        let mut filters = Vec::new();
        if let Some(user) = user {
            filters.push(Filter::eq("user", user));
        }
        if let Some(start) = query.start_date {
            filters.push(Filter::gte("date", start));
        }
        if let Some(end) = query.end_date {
            filters.push(Filter::lte("date", end));
        }
        Filter::and(filters)
    }

    /// Most recent day first. Non-admins only see their own records.
    pub async fn list(
        &self,
        actor: &Actor,
        query: AttendanceQuery,
        page: &PageRequest,
    ) -> Result<Page<Attendance>> {
        self.store
            .page(
                Self::scope(actor, &query),
                FindOptions::new().sort("date", SortOrder::Desc),
                page,
            )
            .await
    }

    pub async fn summary(
        &self,
        actor: &Actor,
        query: AttendanceQuery,
    ) -> Result<AttendanceSummary> {
        let records: Vec<Attendance> = self
            .store
            .find(Self::scope(actor, &query), FindOptions::new())
            .await?;

        let mut summary = AttendanceSummary {
            total_days: records.len() as u64,
            ..Default::default()
        };
        for record in &records {
            if record.is_checked_out() {
                summary.completed_days += 1;
            }
            summary.total_hours += record.total_hours;
            summary.total_break_minutes += record.total_break_time;
            summary.overtime_hours += record.overtime_hours;
        }
        if summary.completed_days > 0 {
            summary.average_hours = summary.total_hours / summary.completed_days as f64;
        }
        Ok(summary)
    }

    /// Admin correction; derived totals are recomputed from the new timestamps.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        update: AttendanceUpdate,
    ) -> Result<Outcome<Attendance>> {
        let mut record: Attendance = self.store.require(id, "Attendance record").await?;
        ensure(&record, actor, Action::Update)?;

        if let Some(time) = update.check_in {
            match record.check_in.as_mut() {
                Some(point) => point.time = time,
                None => record.check_in = Some(CheckPoint::at(time)),
            }
        }
        if let Some(time) = update.check_out {
            match record.check_out.as_mut() {
                Some(point) => point.time = time,
                None => record.check_out = Some(CheckPoint::at(time)),
            }
        }
        if let Some(breaks) = update.breaks {
            if breaks.iter().filter(|b| b.is_open()).count() > 1 {
                return Err(TeamdeskError::validation(
                    "Only one break can be open at a time",
                ));
            }
            record.breaks = breaks;
        }
        if update.notes.is_some() {
            record.notes = update.notes;
        }

        if let (Some(check_in), Some(check_out)) = (&record.check_in, &record.check_out) {
            if check_out.time < check_in.time {
                return Err(TeamdeskError::validation(
                    "Check-out time cannot be before check-in time",
                ));
            }
        }
        if record.check_out.is_some() && record.check_in.is_none() {
            return Err(TeamdeskError::validation("You must check in first"));
        }

        self.persist(
            actor,
            record,
            ActivityType::AttendanceUpdated,
            "updated an attendance record",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use teamdesk_core::model::{Role, User};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    async fn setup() -> (AttendanceService, User, User) {
        let store = Store::memory();
        let admin = User::new("Admin", "admin@example.com", "h", Role::Admin);
        let emp = User::new("Emp", "emp@example.com", "h", Role::Employee);
        store.insert(&admin).await.unwrap();
        store.insert(&emp).await.unwrap();
        (
            AttendanceService::new(store.clone(), ActivityRecorder::new(store)),
            admin,
            emp,
        )
    }

    #[tokio::test]
    async fn test_full_day() {
        let (attendance, _, emp) = setup().await;
        let me = emp.actor();
        attendance
            .check_in(&me, CheckInput::default(), at(9, 0))
            .await
            .unwrap();
        attendance
            .start_break(&me, BreakInput { kind: BreakType::Lunch }, at(13, 0))
            .await
            .unwrap();
        attendance.end_break(&me, at(13, 30)).await.unwrap();
        let day = attendance
            .check_out(&me, CheckInput::default(), at(17, 30))
            .await
            .unwrap();
        assert!(day.is_complete());

        let record = day.entity;
        assert_eq!(record.total_break_time, 30.0);
        assert_eq!(record.total_hours, 8.0);
        assert_eq!(record.overtime_hours, 0.0);
        assert_eq!(
            attendance.today(&me, at(18, 0)).await.unwrap().unwrap().id,
            record.id
        );
    }

    #[tokio::test]
    async fn test_second_check_in_same_day_conflicts() {
        let (attendance, _, emp) = setup().await;
        attendance
            .check_in(&emp.actor(), CheckInput::default(), at(9, 0))
            .await
            .unwrap();
        let err = attendance
            .check_in(&emp.actor(), CheckInput::default(), at(10, 0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Conflict: Already checked in today");
    }

    #[tokio::test]
    async fn test_store_key_settles_racing_check_in() {
        use std::sync::Arc;

        use teamdesk_core::model::Document;

        use crate::store::{DocumentStore, MemoryStore};

        let backend = Arc::new(MemoryStore::new());
        let store = Store::new(backend.clone());
        let emp = User::new("Emp", "emp@example.com", "h", Role::Employee);
        store.insert(&emp).await.unwrap();
        let attendance = AttendanceService::new(store.clone(), ActivityRecorder::new(store));

        // a concurrent check-in that landed after the day lookup
        let rival = Attendance::check_in(emp.id, CheckPoint::at(at(8, 59)));
        backend
            .insert(
                Attendance::COLLECTION,
                rival.id,
                rival.unique_key(),
                json!({ "pending": true }),
            )
            .await
            .unwrap();

        let err = attendance
            .check_in(&emp.actor(), CheckInput::default(), at(9, 0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Conflict: Already checked in today");
    }

    #[tokio::test]
    async fn test_check_out_requires_check_in() {
        let (attendance, _, emp) = setup().await;
        let err = attendance
            .check_out(&emp.actor(), CheckInput::default(), at(17, 0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: You must check in first");
    }

    #[tokio::test]
    async fn test_one_open_break() {
        let (attendance, _, emp) = setup().await;
        let me = emp.actor();
        attendance
            .check_in(&me, CheckInput::default(), at(9, 0))
            .await
            .unwrap();
        attendance
            .start_break(&me, BreakInput::default(), at(10, 0))
            .await
            .unwrap();
        assert!(attendance
            .start_break(&me, BreakInput::default(), at(10, 5))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_admin_update_recomputes() {
        let (attendance, admin, emp) = setup().await;
        let record = attendance
            .check_in(&emp.actor(), CheckInput::default(), at(9, 0))
            .await
            .unwrap()
            .entity;

        let update = AttendanceUpdate {
            check_out: Some(at(19, 0)),
            ..Default::default()
        };
        assert!(attendance
            .update(&emp.actor(), record.id, update.clone())
            .await
            .is_err());
        let fixed = attendance
            .update(&admin.actor(), record.id, update)
            .await
            .unwrap()
            .entity;
        assert_eq!(fixed.total_hours, 10.0);
        assert_eq!(fixed.overtime_hours, 2.0);
    }

    #[tokio::test]
    async fn test_list_scope_and_summary() {
        let (attendance, admin, emp) = setup().await;
        for (who, day) in [(&emp, 14), (&emp, 15), (&admin, 15)] {
            let start = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
            let end = Utc.with_ymd_and_hms(2024, 3, day, 18, 0, 0).unwrap();
            attendance
                .check_in(&who.actor(), CheckInput::default(), start)
                .await
                .unwrap();
            attendance
                .check_out(&who.actor(), CheckInput::default(), end)
                .await
                .unwrap();
        }

        let mine = attendance
            .list(&emp.actor(), AttendanceQuery::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.pagination.total, 2);
        assert_eq!(mine.items[0].date.to_string(), "2024-03-15");

        let ranged = attendance
            .summary(
                &admin.actor(),
                AttendanceQuery {
                    user: None,
                    start_date: NaiveDate::from_ymd_opt(2024, 3, 15),
                    end_date: NaiveDate::from_ymd_opt(2024, 3, 15),
                },
            )
            .await
            .unwrap();
        assert_eq!(ranged.total_days, 2);
        assert_eq!(ranged.completed_days, 2);
        assert_eq!(ranged.total_hours, 18.0);
        assert_eq!(ranged.overtime_hours, 2.0);
        assert_eq!(ranged.average_hours, 9.0);
    }
}
