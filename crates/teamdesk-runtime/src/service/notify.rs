//! Notification fan-out.

use tracing::{debug, error};

use teamdesk_core::error::Result;
use teamdesk_core::model::Notification;
use teamdesk_core::StepOutcome;

use crate::store::Store;

const ABORTED: &str = "not attempted after an earlier notification failed";

/// Creates notification documents as side effects of mutations.
#[derive(Clone)]
pub struct Notifier {
    store: Store,
}

impl Notifier {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Persist one notification. Direct notifications to the sender are skipped.
    pub async fn send(&self, notification: Notification) -> StepOutcome {
        if !notification.broadcast && notification.recipient == notification.sender {
            return StepOutcome::Skipped;
        }
        let kind = notification.kind;
        match self.deliver(&notification).await {
            Ok(()) => {
                debug!(id = %notification.id, ?kind, "Notification created");
                StepOutcome::Recorded {
                    id: notification.id,
                }
            }
            Err(e) => {
                error!(?kind, error = %e, "Failed to create notification");
                StepOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Send in order; the first failure aborts the rest.
    pub async fn send_all(
        &self,
        notifications: impl IntoIterator<Item = Notification>,
    ) -> Vec<StepOutcome> {
        let mut steps = Vec::new();
        let mut aborted = false;
        for notification in notifications {
            if aborted {
                steps.push(StepOutcome::Failed {
                    reason: ABORTED.to_string(),
                });
                continue;
            }
            let step = self.send(notification).await;
            aborted = step.is_failed();
            steps.push(step);
        }
        steps
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        notification.validate()?;
        self.store.insert(notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::model::{BroadcastTarget, NotificationType};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_self_notification_skipped() {
        let notifier = Notifier::new(Store::memory());
        let me = Uuid::new_v4();
        let step = notifier
            .send(Notification::direct(
                me,
                Some(me),
                NotificationType::TaskAssigned,
                "t",
                "m",
            ))
            .await;
        assert_eq!(step, StepOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_invalid_notification_aborts_rest() {
        let store = Store::memory();
        let notifier = Notifier::new(store.clone());
        let bad = Notification::broadcast(
            None,
            BroadcastTarget::Department,
            None,
            NotificationType::Announcement,
            "t",
            "m",
        );
        let good = Notification::direct(
            Uuid::new_v4(),
            None,
            NotificationType::General,
            "t",
            "m",
        );
        let steps = notifier.send_all([bad, good]).await;
        assert!(steps[0].is_failed());
        assert!(steps[1].is_failed());
        assert_eq!(
            store
                .count::<Notification>(crate::store::Filter::All)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_direct_recorded() {
        let store = Store::memory();
        let notifier = Notifier::new(store.clone());
        let n = Notification::direct(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            NotificationType::TaskAssigned,
            "New task",
            "You have a task",
        );
        let id = n.id;
        assert_eq!(notifier.send(n).await.recorded_id(), Some(id));
        assert!(store.get::<Notification>(id).await.unwrap().is_some());
    }
}
