use axum::Json;
use axum::extract::{Path, RawQuery, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealdrop_domain::pagination::PageRequest;

use crate::domain::types::{Notification, NotificationChannel};
use crate::error::ServerError;
use crate::identity::Identity;
use crate::state::AppState;
use crate::usecase::notification::{
    ListNotificationsUseCase, MarkAllNotificationsReadUseCase, MarkNotificationReadUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub channel: NotificationChannel,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<Uuid>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mealdrop_core::serde::to_rfc3339_ms_opt"
    )]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "mealdrop_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            channel: notification.channel,
            subject: notification.subject,
            body: notification.body,
            sent: notification.sent,
            meal_id: notification.meal_id,
            claim_id: notification.claim_id,
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ReadAllResponse {
    pub updated: u64,
}

// ── Query params ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationListQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

// ── GET /notifications ───────────────────────────────────────────────────────

pub async fn list_notifications(
    identity: Identity,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<NotificationResponse>>, ServerError> {
    let query: NotificationListQuery = raw_query
        .as_deref()
        .map(serde_qs::from_str)
        .transpose()
        .map_err(|e| ServerError::InvalidQuery(e.to_string()))?
        .unwrap_or_default();

    let uc = ListNotificationsUseCase {
        notifications: state.notification_repo(),
    };
    let notifications = uc
        .execute(
            identity.account_id,
            PageRequest {
                per_page: query.per_page.unwrap_or(25),
                page: query.page.unwrap_or(1),
            },
        )
        .await?;

    Ok(Json(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

// ── POST /notifications/{id}/read ────────────────────────────────────────────

pub async fn mark_read(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, ServerError> {
    let uc = MarkNotificationReadUseCase {
        notifications: state.notification_repo(),
    };
    let notification = uc.execute(identity.account_id, id).await?;
    Ok(Json(notification.into()))
}

// ── POST /notifications/read-all ─────────────────────────────────────────────

pub async fn mark_all_read(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<ReadAllResponse>, ServerError> {
    let uc = MarkAllNotificationsReadUseCase {
        notifications: state.notification_repo(),
    };
    let updated = uc.execute(identity.account_id).await?;
    Ok(Json(ReadAllResponse { updated }))
}
