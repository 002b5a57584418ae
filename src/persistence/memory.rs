//! In-memory store for runs without a database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{NotificationStore, RecipientDirectory, SessionResolver};
use crate::domain::{Identity, ListingId, NewNotification, Notification, NotificationId, UserId};
use crate::error::HubError;

#[derive(Debug, Default)]
struct Tables {
    notifications: Vec<Notification>,
    next_id: i64,
    agents: HashMap<ListingId, UserId>,
    favorites: HashMap<ListingId, HashSet<UserId>>,
    sessions: HashMap<String, Identity>,
}

/// Store backed by process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `agent` to `listing_id`.
    pub async fn set_agent(&self, listing_id: ListingId, agent: UserId) {
        self.tables.write().await.agents.insert(listing_id, agent);
    }

    /// Records that `user_id` favorited `listing_id`.
    pub async fn add_favorite(&self, user_id: UserId, listing_id: ListingId) {
        self.tables
            .write()
            .await
            .favorites
            .entry(listing_id)
            .or_default()
            .insert(user_id);
    }

    /// Issues `token` for `identity`.
    pub async fn add_session(&self, token: impl Into<String>, identity: Identity) {
        self.tables
            .write()
            .await
            .sessions
            .insert(token.into(), identity);
    }

    /// Every stored notification, in insertion order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.tables.read().await.notifications.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification, HubError> {
        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        let stored = Notification::from_new(
            NotificationId::new(tables.next_id),
            notification,
            Utc::now(),
        );
        tables.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, HubError> {
        Ok(self
            .tables
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn toggle_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, HubError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or(HubError::NotificationNotFound(id))?;
        stored.is_read = !stored.is_read;
        Ok(stored.clone())
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryStore {
    async fn agent_of(&self, listing_id: ListingId) -> Result<UserId, HubError> {
        self.tables
            .read()
            .await
            .agents
            .get(&listing_id)
            .copied()
            .ok_or(HubError::ListingNotFound(listing_id))
    }

    async fn interested_users(&self, listing_id: ListingId) -> Result<HashSet<UserId>, HubError> {
        Ok(self
            .tables
            .read()
            .await
            .favorites
            .get(&listing_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SessionResolver for InMemoryStore {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, HubError> {
        Ok(self.tables.read().await.sessions.get(token).copied())
    }
}
