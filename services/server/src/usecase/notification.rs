//! In-app notification feed.

use chrono::Utc;
use uuid::Uuid;

use mealdrop_domain::pagination::PageRequest;

use crate::domain::repository::NotificationRepository;
use crate::domain::types::Notification;
use crate::error::ServerError;

pub struct ListNotificationsUseCase<N: NotificationRepository> {
    pub notifications: N,
}

impl<N: NotificationRepository> ListNotificationsUseCase<N> {
    pub async fn execute(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Notification>, ServerError> {
        self.notifications
            .list_for_account(account_id, page.clamped())
            .await
    }
}

pub struct MarkNotificationReadUseCase<N: NotificationRepository> {
    pub notifications: N,
}

impl<N: NotificationRepository> MarkNotificationReadUseCase<N> {
    pub async fn execute(
        &self,
        account_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, ServerError> {
        // Ownership by masking.
        let notification = self
            .notifications
            .find_by_id(notification_id)
            .await?
            .ok_or(ServerError::NotificationNotFound)?;
        if notification.account_id != account_id {
            return Err(ServerError::NotificationNotFound);
        }

        // Re-reading keeps the original stamp.
        if notification.read_at.is_some() {
            return Ok(notification);
        }
        let now = Utc::now();
        self.notifications.mark_read(notification.id, now).await?;
        Ok(Notification {
            read_at: Some(now),
            ..notification
        })
    }
}

pub struct MarkAllNotificationsReadUseCase<N: NotificationRepository> {
    pub notifications: N,
}

impl<N: NotificationRepository> MarkAllNotificationsReadUseCase<N> {
    /// Returns how many notifications were newly marked read.
    pub async fn execute(&self, account_id: Uuid) -> Result<u64, ServerError> {
        self.notifications.mark_all_read(account_id, Utc::now()).await
    }
}
