//! Realtime hub: connection registry, pump pair and event routing.
//!
//! ```text
//! socket frame ─► read pump ─► EventRouter ─► handler ─► Registry::broadcast
//!                                                              │
//! socket ◄─ write pump ◄─ outbound queue (one per connection) ◄┘
//! ```

pub mod connection;
pub mod handler;
pub(crate) mod pump;
pub mod registry;
pub mod router;
pub mod settings;

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};

pub use connection::{Connection, ConnectionState, Delivery};
pub use registry::{OverflowPolicy, Registry};
pub use router::{EventHandler, EventRouter};
pub use settings::ConnectionSettings;

use crate::domain::Identity;

/// Entry point that turns an upgraded socket into a registered connection.
///
/// Cheap to clone; all clones share one registry and one router.
#[derive(Debug, Clone)]
pub struct Hub {
    registry: Arc<Registry>,
    router: Arc<EventRouter>,
    settings: ConnectionSettings,
}

impl Hub {
    /// Creates a hub over an existing registry and a fully-populated router.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        router: Arc<EventRouter>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            registry,
            router,
            settings,
        }
    }

    /// Shared registry of live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Per-connection limits.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Serves one upgraded socket until it closes.
    ///
    /// Registers the connection, spawns the write pump, runs the read pump on
    /// the calling task and returns the connection once both have exited
    /// and it is `Closed`.
    pub async fn serve<Tx, Rx, E>(&self, identity: Identity, sink: Tx, stream: Rx) -> Arc<Connection>
    where
        Tx: Sink<Message> + Unpin + Send + 'static,
        Tx::Error: fmt::Display,
        Rx: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let (connection, outbound) = Connection::new(identity, self.settings.outbound_capacity);
        self.registry.add(Arc::clone(&connection)).await;
        tracing::info!(
            conn_id = %connection.id(),
            user_id = %identity.user_id,
            role = %identity.role,
            "connection opened"
        );

        let writer = tokio::spawn(pump::write_loop(
            sink,
            outbound,
            Arc::clone(&connection),
            Arc::clone(&self.registry),
            self.settings,
        ));

        let read_exit = pump::read_loop(
            stream,
            &connection,
            &self.registry,
            &self.router,
            &self.settings,
        )
        .await;

        let write_exit = match writer.await {
            Ok(exit) => exit.to_string(),
            Err(e) => format!("write pump failed: {e}"),
        };

        connection.mark_closed();
        let lifetime = chrono::Utc::now() - connection.connected_at();
        tracing::info!(
            conn_id = %connection.id(),
            user_id = %identity.user_id,
            lifetime_ms = lifetime.num_milliseconds(),
            read = %read_exit,
            write = %write_exit,
            "connection closed"
        );
        connection
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use futures::channel::mpsc as fmpsc;
    use futures_util::StreamExt;

    use super::*;
    use crate::domain::{Role, UserId};

    fn hub(pong_wait: Duration) -> Hub {
        let settings = ConnectionSettings {
            pong_wait,
            ..ConnectionSettings::default()
        };
        Hub::new(
            Arc::new(Registry::default()),
            Arc::new(EventRouter::new()),
            settings,
        )
    }

    async fn wait_for_len(registry: &Registry, expected: usize) {
        for _ in 0..200 {
            if registry.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {expected} connections");
    }

    #[tokio::test]
    async fn silent_peer_is_closed_after_pong_deadline() {
        let hub = hub(Duration::from_millis(500));
        let (sink, mut sent) = fmpsc::unbounded::<Message>();
        let (_inbound, stream) = fmpsc::unbounded::<Result<Message, String>>();
        let identity = Identity::new(UserId::new(5), Role::User);
        let started = chrono::Utc::now();

        let served = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.serve(identity, sink, stream).await })
        };

        wait_for_len(hub.registry(), 1).await;
        let Ok(Ok(connection)) = tokio::time::timeout(Duration::from_secs(2), served).await else {
            panic!("serve should return after the pong deadline");
        };
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.connected_at() >= started);
        assert!(connection.connected_at() <= chrono::Utc::now());
        assert!(hub.registry().is_empty().await);

        let mut frames = Vec::new();
        while let Some(frame) = sent.next().await {
            frames.push(frame);
        }
        assert!(frames.iter().any(|f| matches!(f, Message::Ping(_))));
        assert!(matches!(frames.last(), Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn external_removal_ends_both_pumps() {
        let hub = hub(Duration::from_secs(10));
        let (sink, _sent) = fmpsc::unbounded::<Message>();
        let (_inbound, stream) = fmpsc::unbounded::<Result<Message, String>>();
        let identity = Identity::new(UserId::new(5), Role::Agent);

        let served = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.serve(identity, sink, stream).await })
        };
        wait_for_len(hub.registry(), 1).await;

        assert_eq!(hub.registry().close_all().await, 1);
        let finished = tokio::time::timeout(Duration::from_secs(2), served).await;
        assert!(matches!(finished, Ok(Ok(ref c)) if c.state() == ConnectionState::Closed));
    }
}
