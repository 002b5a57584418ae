//! Set of live connections with snapshot-then-deliver fan-out.
//!
//! [`Registry`] is the single source of truth for who is currently
//! reachable. It is the only state shared across connections and is guarded
//! by one [`tokio::sync::RwLock`]. Fan-out copies the matching connections
//! out under the read lock and delivers after releasing it, so a slow
//! consumer can never stall registration or removal.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::connection::{Connection, Delivery};
use crate::domain::{ConnectionId, Envelope, UserId};

/// What fan-out does when a recipient's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Remove the connection: a consumer that cannot keep up is dropped.
    #[default]
    Disconnect,
    /// Discard the new message for that connection and keep it open.
    DropMessage,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => f.write_str("disconnect"),
            Self::DropMessage => f.write_str("drop"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disconnect" => Ok(Self::Disconnect),
            "drop" => Ok(Self::DropMessage),
            other => Err(format!("unknown overflow policy {other:?}")),
        }
    }
}

/// Registry of all live connections.
///
/// # Concurrency
///
/// - `add` and `remove` take the write lock for an O(1) map operation.
/// - `broadcast` holds the read lock only while building its snapshot.
/// - Queue sends never happen under the lock.
#[derive(Debug)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    overflow: OverflowPolicy,
}

impl Registry {
    /// Creates an empty registry with the given overflow policy.
    #[must_use]
    pub fn new(overflow: OverflowPolicy) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            overflow,
        }
    }

    /// Registers a connection and marks it open.
    ///
    /// Returns `false` if this exact connection is already registered; the
    /// same user may hold any number of distinct connections.
    pub async fn add(&self, connection: Arc<Connection>) -> bool {
        let mut map = self.connections.write().await;
        if map.contains_key(&connection.id()) {
            return false;
        }
        connection.mark_open();
        map.insert(connection.id(), connection);
        true
    }

    /// Removes a connection and starts closing its socket.
    ///
    /// Idempotent: returns `true` only for the call that actually removed
    /// the connection. The connection is moved to `Closing` before the lock
    /// is released, so no fan-out can queue into it afterwards.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut map = self.connections.write().await;
        let Some(connection) = map.remove(&id) else {
            return false;
        };
        connection.begin_close();
        drop(map);
        tracing::debug!(conn_id = %id, user_id = %connection.user_id(), "connection removed from registry");
        true
    }

    /// Delivers `envelope` to every connection matching `predicate`.
    ///
    /// Returns the number of connections whose queue accepted the envelope.
    /// Delivery order across connections is unspecified.
    pub async fn broadcast<P>(&self, predicate: P, envelope: &Envelope) -> usize
    where
        P: Fn(&Connection) -> bool,
    {
        let targets: Vec<Arc<Connection>> = {
            let map = self.connections.read().await;
            map.values()
                .filter(|c| predicate(c))
                .map(Arc::clone)
                .collect()
        };

        let mut delivered = 0;
        let mut overflowed = Vec::new();
        for connection in &targets {
            match connection.deliver(envelope.clone()) {
                Delivery::Queued => delivered += 1,
                Delivery::Closed => {}
                Delivery::Full => {
                    tracing::warn!(
                        conn_id = %connection.id(),
                        user_id = %connection.user_id(),
                        policy = %self.overflow,
                        "outbound queue full"
                    );
                    if self.overflow == OverflowPolicy::Disconnect {
                        overflowed.push(connection.id());
                    }
                }
            }
        }

        for id in overflowed {
            self.remove(id).await;
        }

        tracing::debug!(
            event_type = %envelope.event_type,
            matched = targets.len(),
            delivered,
            "broadcast complete"
        );
        delivered
    }

    /// Removes every connection. Used on shutdown.
    ///
    /// Returns the number of connections that were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut map = self.connections.write().await;
            map.drain().map(|(_, c)| c).collect()
        };
        for connection in &drained {
            connection.begin_close();
        }
        drained.len()
    }

    /// Returns `true` if the connection is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Number of live connections owned by `user_id`.
    pub async fn connections_for(&self, user_id: UserId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.user_id() == user_id)
            .count()
    }

    /// Returns the number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}
