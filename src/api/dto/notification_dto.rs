//! Notification DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Notification;

/// A stored notification as returned by the REST endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationDto {
    /// Notification ID.
    pub id: i64,
    /// Recipient user ID.
    pub user_id: i64,
    /// Listing the notification is about.
    pub listing_id: i64,
    /// Notification type, e.g. `"price_drop_notification"`.
    #[serde(rename = "type")]
    #[schema(example = "price_drop_notification")]
    pub kind: String,
    /// Human-readable text.
    #[schema(example = "Price Drop: 1 Main St was reduced to $400,000")]
    pub message: String,
    /// Whether the recipient has marked it read.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.get(),
            user_id: n.user_id.get(),
            listing_id: n.listing_id.get(),
            kind: n.kind.as_str().to_string(),
            message: n.message,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}
