use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use teamdesk_core::Result;

use crate::service::NotificationService;

/// Deletes notifications past their `expiresAt` on a fixed interval.
pub struct NotificationPurger {
    notifications: NotificationService,
    interval: Duration,
}

impl NotificationPurger {
    pub fn new(notifications: NotificationService, interval: Duration) -> Self {
        Self {
            notifications,
            interval,
        }
    }

    /// Run until shutdown. The first purge happens immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        tracing::info!(interval = ?self.interval, "Notification purger started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.purge(Utc::now()).await {
                        tracing::error!(error = %e, "Notification purge failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification purger shutting down");
                    break;
                }
            }
        }
    }

    pub async fn purge(&self, at: DateTime<Utc>) -> Result<u64> {
        let removed = self.notifications.purge_expired(at).await?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired notifications");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use teamdesk_core::model::{BroadcastTarget, Notification, NotificationType};

    use crate::auth::TokenService;
    use crate::service::Services;
    use crate::store::{Filter, Store};

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let store = Store::memory();
        let services = Services::new(store.clone(), TokenService::new("s", 60));
        let now = Utc::now();

        let mut expired = Notification::broadcast(
            None,
            BroadcastTarget::All,
            None,
            NotificationType::Announcement,
            "Old",
            "gone",
        );
        expired.expires_at = Some(now - ChronoDuration::hours(1));
        let current = Notification::broadcast(
            None,
            BroadcastTarget::All,
            None,
            NotificationType::Announcement,
            "New",
            "stays",
        );
        store.insert(&expired).await.unwrap();
        store.insert(&current).await.unwrap();

        let purger = NotificationPurger::new(services.notifications, Duration::from_secs(60));
        assert_eq!(purger.purge(now).await.unwrap(), 1);
        assert_eq!(store.count::<Notification>(Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let services = Services::new(Store::memory(), TokenService::new("s", 60));
        let purger = NotificationPurger::new(services.notifications, Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), purger.run(token))
            .await
            .unwrap();
    }
}
