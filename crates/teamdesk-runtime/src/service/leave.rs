use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{
    flexible_date, ActivityDraft, ActivityType, Actor, HalfDayPeriod, LeaveRequest, LeaveStatus,
    LeaveType, Notification, NotificationType, Page, PageRequest, Role, TargetType, User,
};
use teamdesk_core::policy::{ensure, Action};
use teamdesk_core::Outcome;

use super::activity::ActivityRecorder;
use super::notify::Notifier;
use crate::store::{Filter, FindOptions, Store};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveInput {
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[serde(deserialize_with = "flexible_date::deserialize")]
    pub start_date: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_date::deserialize")]
    pub end_date: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub is_half_day: bool,
    #[serde(default)]
    pub half_day_period: Option<HalfDayPeriod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDecision {
    pub status: LeaveStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveQuery {
    pub status: Option<LeaveStatus>,
    pub employee: Option<Uuid>,
}

#[derive(Clone)]
pub struct LeaveService {
    store: Store,
    recorder: ActivityRecorder,
    notifier: Notifier,
}

impl LeaveService {
    pub fn new(store: Store, recorder: ActivityRecorder, notifier: Notifier) -> Self {
        Self {
            store,
            recorder,
            notifier,
        }
    }

    /// File a pending request and notify every active admin.
    pub async fn create(&self, actor: &Actor, input: LeaveInput) -> Result<Outcome<LeaveRequest>> {
        let mut request = LeaveRequest::new(
            actor.id,
            input.leave_type,
            input.start_date,
            input.end_date,
            input.reason,
            input.is_half_day,
        )?;
        if request.is_half_day {
            request.half_day_period = input.half_day_period;
        }
        self.store.insert(&request).await?;

        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    ActivityType::LeaveRequested,
                    format!("requested {} day(s) of leave", request.total_days),
                    TargetType::Leave,
                    request.id,
                )
                .metadata(json!({ "type": request.leave_type, "totalDays": request.total_days })),
            )
            .await;

        let admins: Vec<User> = self
            .store
            .find(
                Filter::and([Filter::eq("role", Role::Admin), Filter::eq("isActive", true)]),
                FindOptions::new(),
            )
            .await?;
        let notices = admins.into_iter().map(|admin| {
            Notification::direct(
                admin.id,
                Some(actor.id),
                NotificationType::LeaveRequest,
                "New leave request",
                format!(
                    "{} requested {} day(s) of leave",
                    actor.name, request.total_days
                ),
            )
            .with_related("leave", request.id)
            .with_link(format!("/leave/{}", request.id))
        });
        let notifications = self.notifier.send_all(notices).await;

        let mut outcome = Outcome::new(request).with_activity(activity);
        outcome.notifications = notifications;
        Ok(outcome)
    }

    /// Newest first. Non-admins only see their own requests.
    pub async fn list(
        &self,
        actor: &Actor,
        query: LeaveQuery,
        page: &PageRequest,
    ) -> Result<Page<LeaveRequest>> {
        let mut filters = Vec::new();
        let employee = if actor.is_admin() {
            query.employee
        } else {
            Some(actor.id)
        };
        if let Some(employee) = employee {
            filters.push(Filter::eq("employee", employee));
        }
        if let Some(status) = query.status {
            filters.push(Filter::eq("status", status));
        }
        self.store
            .page(Filter::and(filters), FindOptions::newest_first(), page)
            .await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<LeaveRequest> {
        let request: LeaveRequest = self.store.require(id, "Leave request").await?;
        ensure(&request, actor, Action::Read)?;
        Ok(request)
    }

    /// Approve or reject. Anyone who can see the request is told when it is
    /// no longer pending; everyone else is refused first.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: LeaveDecision,
        at: DateTime<Utc>,
    ) -> Result<Outcome<LeaveRequest>> {
        let mut request: LeaveRequest = self.store.require(id, "Leave request").await?;
        ensure(&request, actor, Action::Read)?;
        request.ensure_pending()?;
        ensure(&request, actor, Action::Decide)?;

        request.decide(decision.status, actor.id, decision.rejection_reason, at)?;
        self.store.save(&request).await?;

        let (kind, verb, notice_kind) = match request.status {
            LeaveStatus::Approved => (
                ActivityType::LeaveApproved,
                "approved",
                NotificationType::LeaveApproved,
            ),
            _ => (
                ActivityType::LeaveRejected,
                "rejected",
                NotificationType::LeaveRejected,
            ),
        };
        let activity = self
            .recorder
            .record_step(
                ActivityDraft::new(
                    actor.id,
                    kind,
                    format!("{} a leave request", verb),
                    TargetType::Leave,
                    request.id,
                )
                .metadata(json!({ "employee": request.employee })),
            )
            .await;

        let mut message = format!(
            "Your leave request for {} day(s) was {}",
            request.total_days, verb
        );
        if let Some(reason) = request.rejection_reason.as_deref() {
            message.push_str(&format!(": {}", reason));
        }
        let notified = self
            .notifier
            .send(
                Notification::direct(
                    request.employee,
                    Some(actor.id),
                    notice_kind,
                    format!("Leave request {}", verb),
                    message,
                )
                .with_related("leave", request.id)
                .with_link(format!("/leave/{}", request.id)),
            )
            .await;

        let mut outcome = Outcome::new(request).with_activity(activity);
        outcome.push_notification(notified);
        Ok(outcome)
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Outcome<LeaveRequest>> {
        let mut request: LeaveRequest = self.store.require(id, "Leave request").await?;
        ensure(&request, actor, Action::Cancel)?;
        request.cancel(at)?;
        self.store.save(&request).await?;

        let activity = self
            .recorder
            .record_step(ActivityDraft::new(
                actor.id,
                ActivityType::LeaveCancelled,
                "cancelled a leave request",
                TargetType::Leave,
                request.id,
            ))
            .await;
        Ok(Outcome::new(request).with_activity(activity))
    }
}

impl From<LeaveStatus> for LeaveDecision {
    fn from(status: LeaveStatus) -> Self {
        Self {
            status,
            rejection_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Store, LeaveService, User, User) {
        let store = Store::memory();
        let admin = User::new("Admin", "admin@example.com", "h", Role::Admin);
        let emp = User::new("Emp", "emp@example.com", "h", Role::Employee);
        store.insert(&admin).await.unwrap();
        store.insert(&emp).await.unwrap();
        let service = LeaveService::new(
            store.clone(),
            ActivityRecorder::new(store.clone()),
            Notifier::new(store.clone()),
        );
        (store, service, admin, emp)
    }

    fn input(start: &str, end: &str) -> LeaveInput {
        serde_json::from_value(json!({
            "type": "vacation",
            "startDate": start,
            "endDate": end,
            "reason": "Trip",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_approve_then_already_processed() {
        let (store, leave, admin, emp) = setup().await;
        let created = leave
            .create(&emp.actor(), input("2024-03-15", "2024-03-20"))
            .await
            .unwrap();
        assert_eq!(created.entity.total_days, 6.0);
        assert_eq!(created.notifications.len(), 1);

        let approved = leave
            .update_status(
                &admin.actor(),
                created.entity.id,
                LeaveStatus::Approved.into(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(approved.entity.status, LeaveStatus::Approved);
        assert_eq!(approved.entity.approved_by, Some(admin.id));

        let to_emp: Vec<Notification> = store
            .find(Filter::eq("recipient", emp.id), FindOptions::new())
            .await
            .unwrap();
        assert_eq!(to_emp[0].kind, NotificationType::LeaveApproved);

        let err = leave
            .update_status(
                &emp.actor(),
                created.entity.id,
                LeaveStatus::Rejected.into(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already been processed"));
    }

    #[tokio::test]
    async fn test_outsider_cannot_see_processed_state() {
        let (store, leave, admin, emp) = setup().await;
        let other = User::new("Other", "other@example.com", "h", Role::Employee);
        store.insert(&other).await.unwrap();
        let created = leave
            .create(&emp.actor(), input("2024-05-01", "2024-05-01"))
            .await
            .unwrap();
        leave
            .update_status(
                &admin.actor(),
                created.entity.id,
                LeaveStatus::Rejected.into(),
                Utc::now(),
            )
            .await
            .unwrap();

        let err = leave
            .update_status(
                &other.actor(),
                created.entity.id,
                LeaveStatus::Approved.into(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TeamdeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_employee_cannot_decide_pending() {
        let (_, leave, _, emp) = setup().await;
        let created = leave
            .create(&emp.actor(), input("2024-03-15", "2024-03-15"))
            .await
            .unwrap();
        let err = leave
            .update_status(
                &emp.actor(),
                created.entity.id,
                LeaveStatus::Approved.into(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TeamdeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_end_before_start_rejected() {
        let (store, leave, _, emp) = setup().await;
        let err = leave
            .create(&emp.actor(), input("2024-03-20", "2024-03-15"))
            .await
            .unwrap_err();
        assert!(matches!(err, TeamdeskError::Validation(_)));
        assert_eq!(store.count::<LeaveRequest>(Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_and_scoped_list() {
        let (_, leave, admin, emp) = setup().await;
        let created = leave
            .create(&emp.actor(), input("2024-04-01", "2024-04-02"))
            .await
            .unwrap();
        leave
            .create(&admin.actor(), input("2024-04-03", "2024-04-03"))
            .await
            .unwrap();

        let mine = leave
            .list(&emp.actor(), LeaveQuery::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.pagination.total, 1);

        let cancelled = leave
            .cancel(&emp.actor(), created.entity.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(cancelled.entity.status, LeaveStatus::Cancelled);
        assert!(leave
            .cancel(&emp.actor(), created.entity.id, Utc::now())
            .await
            .is_err());
    }
}
