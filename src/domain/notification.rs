//! Notification records and the notification type catalog.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ListingId, NotificationId, UserId};

/// The closed set of notification types.
///
/// The wire string doubles as the inbound event type that triggers the
/// notification and the `type` of the outgoing push, so a client that sends
/// `price_drop_notification` receives `price_drop_notification` pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Someone favorited a listing; the listing's agent is notified.
    #[serde(rename = "favorited_listing_notification")]
    FavoritedListing,
    /// A listing's price was reduced; everyone who favorited it is notified.
    #[serde(rename = "price_drop_notification")]
    PriceDrop,
    /// A listing's status changed; everyone who favorited it is notified.
    #[serde(rename = "status_changed_notification")]
    StatusChanged,
}

impl NotificationKind {
    /// Every kind, in registration order.
    pub const ALL: [Self; 3] = [Self::FavoritedListing, Self::PriceDrop, Self::StatusChanged];

    /// Returns the wire string for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FavoritedListing => "favorited_listing_notification",
            Self::PriceDrop => "price_drop_notification",
            Self::StatusChanged => "status_changed_notification",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A notification about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    /// Recipient account.
    pub user_id: UserId,
    /// Listing the notification is about.
    pub listing_id: ListingId,
    /// Notification type.
    pub kind: NotificationKind,
    /// Human-readable text pushed to the client.
    pub message: String,
}

/// A persisted notification row.
///
/// Created by the hub's handlers; read status is only ever changed through
/// the REST surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Row ID assigned by the store.
    pub id: NotificationId,
    /// Recipient account.
    pub user_id: UserId,
    /// Listing the notification is about.
    pub listing_id: ListingId,
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Human-readable text.
    pub message: String,
    /// Whether the recipient marked it read.
    pub is_read: bool,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Materializes a stored row from a pending notification.
    #[must_use]
    pub fn from_new(id: NotificationId, new: NewNotification, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            listing_id: new.listing_id,
            kind: new.kind,
            message: new.message,
            is_read: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_wire_strings() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(
            "price_hike_notification".parse::<NotificationKind>(),
            Err("price_hike_notification".to_string())
        );
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&NotificationKind::StatusChanged).unwrap_or_default();
        assert_eq!(json, "\"status_changed_notification\"");
    }

    #[test]
    fn notification_serializes_kind_as_type() {
        let new = NewNotification {
            user_id: UserId::new(7),
            listing_id: ListingId::new(42),
            kind: NotificationKind::FavoritedListing,
            message: "New favorite on 1 Main St".to_string(),
        };
        let row = Notification::from_new(NotificationId::new(1), new, Utc::now());
        let json = serde_json::to_value(&row).unwrap_or_default();
        assert_eq!(json["type"], "favorited_listing_notification");
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["is_read"], false);
    }
}
