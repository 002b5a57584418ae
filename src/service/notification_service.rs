//! Notification service: recipient resolution and persistence.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{
    ListingEvent, NewNotification, Notification, NotificationId, UserId,
};
use crate::error::HubError;
use crate::persistence::{NotificationStore, RecipientDirectory};

/// Orchestration layer between listing events and the notification store.
///
/// Stateless coordinator: owns a [`NotificationStore`] for rows and a
/// [`RecipientDirectory`] for lookups. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn RecipientDirectory>,
}

impl NotificationService {
    /// Creates a new `NotificationService`.
    #[must_use]
    pub fn new(store: Arc<dyn NotificationStore>, directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { store, directory }
    }

    /// Users who should be notified about `event`.
    ///
    /// A favorite goes to the listing's agent; price and status changes go
    /// to everyone who favorited the listing.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ListingNotFound`] or [`HubError::LookupFailed`]
    /// from the directory.
    pub async fn recipients(&self, event: &ListingEvent) -> Result<HashSet<UserId>, HubError> {
        match event {
            ListingEvent::FavoritedListing(p) => {
                let agent = self.directory.agent_of(p.listing_id).await?;
                Ok(HashSet::from([agent]))
            }
            ListingEvent::PriceDrop(_) | ListingEvent::StatusChange(_) => {
                self.directory.interested_users(event.listing_id()).await
            }
        }
    }

    /// Resolves recipients for `event` and stores one notification each.
    ///
    /// Rows are written in ascending user order. The first failure aborts
    /// and rows already written stay in place.
    ///
    /// # Errors
    ///
    /// Returns the first lookup or persistence error.
    pub async fn record(&self, event: &ListingEvent) -> Result<HashSet<UserId>, HubError> {
        let recipients = self.recipients(event).await?;
        if recipients.is_empty() {
            return Ok(recipients);
        }

        let message = event.message();
        let mut ordered: Vec<UserId> = recipients.iter().copied().collect();
        ordered.sort_unstable();

        for user_id in ordered {
            let stored = self
                .store
                .create(NewNotification {
                    user_id,
                    listing_id: event.listing_id(),
                    kind: event.kind(),
                    message: message.clone(),
                })
                .await?;
            tracing::debug!(
                notification_id = %stored.id,
                user_id = %user_id,
                listing_id = %stored.listing_id,
                "notification stored"
            );
        }

        Ok(recipients)
    }

    /// Every notification addressed to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::PersistenceError`] on storage failure.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, HubError> {
        self.store.list_for_user(user_id).await
    }

    /// Flips the read flag on one of `user_id`'s notifications.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotificationNotFound`] if the notification does
    /// not exist or is not owned by `user_id`.
    pub async fn toggle_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, HubError> {
        self.store.toggle_read(id, user_id).await
    }
}
