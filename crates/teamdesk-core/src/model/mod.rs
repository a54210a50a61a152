//! Document types persisted by TeamDesk.
//!
//! Every persisted entity implements [`Document`], which names its collection
//! and exposes the identity and uniqueness keys the store enforces.

mod activity;
mod attendance;
mod chat;
mod comment;
mod leave;
mod notification;
mod project;
mod task;
mod user;

pub use activity::{Activity, ActivityDraft, ActivityType, TargetType};
pub use attendance::{Attendance, Break, BreakType, CheckPoint, STANDARD_WORK_HOURS};
pub use chat::{Chat, ChatMessage, ChatType, Participant, ParticipantRole, Reaction, ReadReceipt};
pub use comment::Comment;
pub use leave::{compute_total_days, HalfDayPeriod, LeaveRequest, LeaveStatus, LeaveType};
pub use notification::{
    BroadcastTarget, Notification, NotificationPriority, NotificationType, RelatedEntity,
};
pub use project::{Project, ProjectPriority, ProjectStatus, TeamMember, TeamRole};
pub use task::{Task, TaskPriority, TaskStatus};
pub use user::{normalize_email, Actor, PublicUser, Role, User, UserSummary};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A value persisted in a named collection of the document store.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name.
    const COLLECTION: &'static str;

    /// Primary identifier.
    fn id(&self) -> Uuid;

    /// Key that must be unique across the collection, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Upper bound on page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Page selection from `page` / `limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// 1-based page number.
    pub fn page(&self) -> u64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> u64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    /// Number of items to skip, capped at `i64::MAX` so it always binds as a
    /// SQL offset.
    pub fn offset(&self) -> u64 {
        (self.page() - 1)
            .saturating_mul(self.limit())
            .min(i64::MAX as u64)
    }

    /// Build pagination metadata for a result of `total` items.
    pub fn pagination(&self, total: u64) -> Pagination {
        let limit = self.limit();
        Pagination {
            page: self.page(),
            limit,
            total,
            pages: total.div_ceil(limit),
        }
    }

    /// Slice an in-memory result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit() as usize)
            .collect()
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// A page of results with its metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Serde helpers for timestamps that clients may send as bare dates.
pub mod flexible_date {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer};

    /// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s)))
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(s) if s.is_empty() => Ok(None),
                Some(s) => parse(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps_limit() {
        let req = PageRequest::new(0, 10_000);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let req = PageRequest::new(u64::MAX, 100);
        assert_eq!(req.offset(), i64::MAX as u64);
        assert!(req.slice(vec![1, 2, 3]).is_empty());
        assert_eq!(req.pagination(3).page, u64::MAX);
    }

    #[test]
    fn test_pagination_pages() {
        let req = PageRequest::new(2, 10);
        let p = req.pagination(25);
        assert_eq!(p.pages, 3);
        assert_eq!(p.page, 2);
        assert_eq!(req.pagination(0).pages, 0);
    }

    #[test]
    fn test_slice() {
        let req = PageRequest::new(2, 2);
        assert_eq!(req.slice(vec![1, 2, 3, 4, 5]), vec![3, 4]);
    }

    #[test]
    fn test_flexible_date_parsing() {
        let d = flexible_date::parse("2024-03-15").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-03-15T00:00:00+00:00");
        let ts = flexible_date::parse("2024-03-15T09:30:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-15T09:30:00+00:00");
        assert!(flexible_date::parse("15/03/2024").is_none());
    }
}
