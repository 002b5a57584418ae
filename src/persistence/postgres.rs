//! PostgreSQL implementation of the persistence layer.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{
    NOTIFICATION_COLUMNS, NotificationRow, SessionRow, identity_from_row, notification_from_row,
};
use super::{NotificationStore, RecipientDirectory, SessionResolver};
use crate::domain::{Identity, ListingId, NewNotification, Notification, NotificationId, UserId};
use crate::error::HubError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`HubError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), HubError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| HubError::PersistenceError(e.to_string()))
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification, HubError> {
        let sql = format!(
            "INSERT INTO notifications (user_id, listing_id, type, message) \
             VALUES ($1, $2, $3, $4) RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(notification.user_id.get())
            .bind(notification.listing_id.get())
            .bind(notification.kind.as_str())
            .bind(&notification.message)
            .fetch_one(&self.pool)
            .await?;

        notification_from_row(row)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, HubError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(notification_from_row).collect()
    }

    async fn toggle_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, HubError> {
        let sql = format!(
            "UPDATE notifications SET is_read = NOT is_read \
             WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id.get())
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(HubError::NotificationNotFound(id))?;

        notification_from_row(row)
    }
}

#[async_trait]
impl RecipientDirectory for PostgresStore {
    async fn agent_of(&self, listing_id: ListingId) -> Result<UserId, HubError> {
        let agent = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT agent_id FROM listings WHERE id = $1",
        )
        .bind(listing_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HubError::LookupFailed {
            listing_id,
            reason: e.to_string(),
        })?;

        agent
            .flatten()
            .map(UserId::new)
            .ok_or(HubError::ListingNotFound(listing_id))
    }

    async fn interested_users(&self, listing_id: ListingId) -> Result<HashSet<UserId>, HubError> {
        let users = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT user_id FROM favorites WHERE listing_id = $1",
        )
        .bind(listing_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HubError::LookupFailed {
            listing_id,
            reason: e.to_string(),
        })?;

        Ok(users.into_iter().map(UserId::new).collect())
    }
}

#[async_trait]
impl SessionResolver for PostgresStore {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, HubError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT u.id, u.role FROM sessions s \
             INNER JOIN users u ON s.user_id = u.id \
             WHERE s.token = $1 AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(identity_from_row).transpose()
    }
}
