//! Database row shapes and their conversion into domain types.

use chrono::{DateTime, Utc};

use crate::domain::{
    Identity, ListingId, Notification, NotificationId, NotificationKind, Role, UserId,
};
use crate::error::HubError;

/// A row from the `notifications` table, in column order.
pub type NotificationRow = (i64, i64, i64, String, String, bool, DateTime<Utc>);

/// Column list matching [`NotificationRow`].
pub const NOTIFICATION_COLUMNS: &str = "id, user_id, listing_id, type, message, is_read, created_at";

/// Converts a raw row into a [`Notification`].
///
/// # Errors
///
/// Returns [`HubError::PersistenceError`] if the stored `type` is not a
/// known notification kind.
pub fn notification_from_row(row: NotificationRow) -> Result<Notification, HubError> {
    let (id, user_id, listing_id, kind, message, is_read, created_at) = row;
    let kind: NotificationKind = kind
        .parse()
        .map_err(|k| HubError::PersistenceError(format!("unknown notification type {k:?}")))?;
    Ok(Notification {
        id: NotificationId::new(id),
        user_id: UserId::new(user_id),
        listing_id: ListingId::new(listing_id),
        kind,
        message,
        is_read,
        created_at,
    })
}

/// A `sessions ⋈ users` row: `(user_id, role)`.
pub type SessionRow = (i64, String);

/// Converts a session row into an [`Identity`].
///
/// # Errors
///
/// Returns [`HubError::PersistenceError`] if the stored role is unknown.
pub fn identity_from_row(row: SessionRow) -> Result<Identity, HubError> {
    let (user_id, role) = row;
    let role: Role = role
        .parse()
        .map_err(|e| HubError::PersistenceError(format!("{e}")))?;
    Ok(Identity::new(UserId::new(user_id), role))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn converts_notification_row() {
        let row = (
            1,
            7,
            42,
            "favorited_listing_notification".to_string(),
            "New favorite on 1 Main St".to_string(),
            false,
            Utc::now(),
        );
        let Ok(n) = notification_from_row(row) else {
            panic!("row should convert");
        };
        assert_eq!(n.user_id, UserId::new(7));
        assert_eq!(n.kind, NotificationKind::FavoritedListing);
    }

    #[test]
    fn rejects_unknown_type() {
        let row = (1, 7, 42, "legacy".to_string(), String::new(), true, Utc::now());
        assert!(matches!(
            notification_from_row(row),
            Err(HubError::PersistenceError(_))
        ));
    }

    #[test]
    fn converts_session_row() {
        assert_eq!(
            identity_from_row((3, "agent".to_string())).ok(),
            Some(Identity::new(UserId::new(3), Role::Agent))
        );
        assert!(identity_from_row((3, "root".to_string())).is_err());
    }
}
