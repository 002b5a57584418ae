//! Persistence layer: notification rows, recipient lookups and sessions.
//!
//! The hub consumes three narrow traits. [`PostgresStore`] implements all
//! three with `sqlx`; [`InMemoryStore`] implements them for development
//! runs with persistence disabled and for tests.

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::domain::{Identity, ListingId, NewNotification, Notification, NotificationId, UserId};
use crate::error::HubError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Durable storage of notification rows.
#[async_trait]
pub trait NotificationStore: fmt::Debug + Send + Sync + 'static {
    /// Persists a notification and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PersistenceError`] on storage failure.
    async fn create(&self, notification: NewNotification) -> Result<Notification, HubError>;

    /// Returns every notification addressed to `user_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PersistenceError`] on storage failure.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, HubError>;

    /// Flips `is_read` on a notification owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotificationNotFound`] if the row does not exist
    /// or belongs to someone else, [`HubError::PersistenceError`] on
    /// storage failure.
    async fn toggle_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, HubError>;
}

/// Resolves who should hear about a listing.
#[async_trait]
pub trait RecipientDirectory: fmt::Debug + Send + Sync + 'static {
    /// Returns the agent responsible for `listing_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ListingNotFound`] if the listing does not exist,
    /// [`HubError::LookupFailed`] on storage failure.
    async fn agent_of(&self, listing_id: ListingId) -> Result<UserId, HubError>;

    /// Returns every user who favorited `listing_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::LookupFailed`] on storage failure.
    async fn interested_users(&self, listing_id: ListingId) -> Result<HashSet<UserId>, HubError>;
}

/// Maps a session token to the identity it was issued for.
#[async_trait]
pub trait SessionResolver: fmt::Debug + Send + Sync + 'static {
    /// Returns the identity for a live session, or `None` for unknown or
    /// expired tokens.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PersistenceError`] on storage failure.
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, HubError>;
}
