//! Domain layer: identifiers, identities, wire events and notification
//! records.

pub mod event;
pub mod identity;
pub mod ids;
pub mod notification;

pub use event::{Envelope, ListingEvent, NotificationPush};
pub use identity::{Identity, Role};
pub use ids::{ConnectionId, ListingId, NotificationId, UserId};
pub use notification::{NewNotification, Notification, NotificationKind};
