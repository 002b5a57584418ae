//! Read and write pumps for one connection.
//!
//! The pumps are generic over the two socket halves so the same loops run
//! against an axum [`WebSocket`](axum::extract::ws::WebSocket) split and
//! against in-process channels in tests.
//!
//! Either pump reaching a terminal condition calls [`teardown`], which
//! removes the connection from the registry and cancels its token; the
//! other pump wakes on the cancellation and exits. Removal is idempotent,
//! so running teardown from both sides is harmless.

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::connection::Connection;
use super::registry::Registry;
use super::router::EventRouter;
use super::settings::ConnectionSettings;
use crate::domain::Envelope;

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PumpExit {
    /// The other pump or the registry started teardown.
    Cancelled,
    /// The peer closed the socket or the stream ended.
    PeerClosed,
    /// No pong arrived before the read deadline.
    DeadlineExceeded,
    /// The peer sent a frame above the read limit.
    FrameTooLarge(usize),
    /// Reading from or writing to the socket failed.
    Transport(String),
    /// The outbound queue was closed.
    QueueClosed,
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::PeerClosed => f.write_str("peer closed"),
            Self::DeadlineExceeded => f.write_str("pong deadline exceeded"),
            Self::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds read limit"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::QueueClosed => f.write_str("outbound queue closed"),
        }
    }
}

/// Removes the connection from the registry and cancels its pumps.
pub(crate) async fn teardown(registry: &Registry, connection: &Connection, exit: &PumpExit) {
    if registry.remove(connection.id()).await {
        tracing::info!(
            conn_id = %connection.id(),
            user_id = %connection.user_id(),
            reason = %exit,
            "tearing down connection"
        );
    }
    // removal may have happened elsewhere; cancel regardless
    connection.begin_close();
}

/// Receives frames until a terminal condition, routing each decoded
/// envelope inline.
pub(crate) async fn read_loop<Rx, E>(
    mut stream: Rx,
    connection: &Connection,
    registry: &Registry,
    router: &EventRouter,
    settings: &ConnectionSettings,
) -> PumpExit
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut deadline = Instant::now() + settings.pong_wait;

    let exit = loop {
        let next = tokio::select! {
            () = connection.cancelled() => break PumpExit::Cancelled,
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let frame = match next {
            Err(_elapsed) => break PumpExit::DeadlineExceeded,
            Ok(None) => break PumpExit::PeerClosed,
            Ok(Some(Err(e))) => break PumpExit::Transport(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        let data: Bytes = match frame {
            Message::Text(text) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Message::Binary(data) => data,
            Message::Pong(_) => {
                deadline = Instant::now() + settings.pong_wait;
                tracing::trace!(conn_id = %connection.id(), "pong received");
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => break PumpExit::PeerClosed,
        };

        if data.len() > settings.max_frame_bytes {
            break PumpExit::FrameTooLarge(data.len());
        }

        let envelope = match Envelope::from_slice(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(conn_id = %connection.id(), error = %e, "dropping undecodable frame");
                continue;
            }
        };

        if let Err(e) = router.route(&envelope, connection).await {
            tracing::warn!(
                conn_id = %connection.id(),
                user_id = %connection.user_id(),
                event_type = %envelope.event_type,
                error = %e,
                "event not processed"
            );
        }
    };

    teardown(registry, connection, &exit).await;
    exit
}

/// Drains the outbound queue into the socket and sends keepalive pings.
pub(crate) async fn write_loop<Tx>(
    mut sink: Tx,
    mut outbound: mpsc::Receiver<Envelope>,
    connection: Arc<Connection>,
    registry: Arc<Registry>,
    settings: ConnectionSettings,
) -> PumpExit
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: fmt::Display,
{
    let ping_interval = settings.ping_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;

            () = connection.cancelled() => break PumpExit::Cancelled,

            message = outbound.recv() => {
                let Some(envelope) = message else {
                    break PumpExit::QueueClosed;
                };
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(conn_id = %connection.id(), error = %e, "skipping unserializable message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(json)).await {
                    break PumpExit::Transport(e.to_string());
                }
            }

            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    break PumpExit::Transport(e.to_string());
                }
                tracing::trace!(conn_id = %connection.id(), "ping sent");
            }
        }
    };

    // only this connection's own teardown closes its queue
    outbound.close();
    if !matches!(exit, PumpExit::Transport(_)) {
        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::debug!(conn_id = %connection.id(), error = %e, "close frame not sent");
        }
    }
    teardown(&registry, &connection, &exit).await;
    exit
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use futures::channel::mpsc as fmpsc;

    use super::*;
    use crate::domain::{Identity, NotificationKind, Role, UserId};
    use crate::hub::ConnectionState;

    type Inbound = fmpsc::UnboundedSender<Result<Message, String>>;

    fn settings(pong_wait: Duration) -> ConnectionSettings {
        ConnectionSettings {
            pong_wait,
            ..ConnectionSettings::default()
        }
    }

    async fn registered(
        registry: &Registry,
    ) -> (Arc<Connection>, mpsc::Receiver<Envelope>) {
        let (conn, rx) = Connection::new(Identity::new(UserId::new(1), Role::User), 8);
        registry.add(Arc::clone(&conn)).await;
        (conn, rx)
    }

    fn inbound() -> (Inbound, fmpsc::UnboundedReceiver<Result<Message, String>>) {
        fmpsc::unbounded()
    }

    #[tokio::test]
    async fn malformed_frames_and_unknown_types_keep_reading() {
        let registry = Registry::default();
        let router = EventRouter::new();
        let (conn, _rx) = registered(&registry).await;
        let (tx, rx) = inbound();

        let _ = tx.unbounded_send(Ok(Message::text("not json")));
        let _ = tx.unbounded_send(Ok(Message::text(r#"{"type":"nobody_home","payload":{}}"#)));
        let _ = tx.unbounded_send(Ok(Message::Close(None)));

        let exit = read_loop(rx, &conn, &registry, &router, &settings(Duration::from_secs(5))).await;
        assert_eq!(exit, PumpExit::PeerClosed);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_frame_tears_down() {
        let registry = Registry::default();
        let router = EventRouter::new();
        let (conn, _rx) = registered(&registry).await;
        let (tx, rx) = inbound();

        let big = format!(r#"{{"type":"x","payload":"{}"}}"#, "a".repeat(2048));
        let _ = tx.unbounded_send(Ok(Message::text(big)));

        let exit = read_loop(rx, &conn, &registry, &router, &settings(Duration::from_secs(5))).await;
        assert!(matches!(exit, PumpExit::FrameTooLarge(_)));
        assert!(!registry.contains(conn.id()).await);
    }

    #[tokio::test]
    async fn transport_error_tears_down() {
        let registry = Registry::default();
        let router = EventRouter::new();
        let (conn, _rx) = registered(&registry).await;
        let (tx, rx) = inbound();
        let _ = tx.unbounded_send(Err("connection reset".to_string()));

        let exit = read_loop(rx, &conn, &registry, &router, &settings(Duration::from_secs(5))).await;
        assert_eq!(exit, PumpExit::Transport("connection reset".to_string()));
        assert!(conn.is_cancelled());
    }

    #[tokio::test]
    async fn missing_pong_exceeds_deadline() {
        let registry = Registry::default();
        let router = EventRouter::new();
        let (conn, _rx) = registered(&registry).await;
        let (_tx, rx) = inbound();

        let exit =
            read_loop(rx, &conn, &registry, &router, &settings(Duration::from_millis(50))).await;
        assert_eq!(exit, PumpExit::DeadlineExceeded);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn pongs_extend_the_deadline() {
        let registry = Registry::default();
        let router = EventRouter::new();
        let (conn, _rx) = registered(&registry).await;
        let (tx, rx) = inbound();

        let feeder = tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(40)).await;
                let _ = tx.unbounded_send(Ok(Message::Pong(Bytes::new())));
            }
            let _ = tx.unbounded_send(Ok(Message::Close(None)));
        });

        let exit =
            read_loop(rx, &conn, &registry, &router, &settings(Duration::from_millis(100))).await;
        assert_eq!(exit, PumpExit::PeerClosed);
        let _ = feeder.await;
    }

    #[tokio::test]
    async fn write_loop_sends_queued_messages_then_close_on_cancel() {
        let registry = Arc::new(Registry::default());
        let (conn, outbound) = registered(&registry).await;
        let (sink, mut sent) = fmpsc::unbounded::<Message>();

        let Ok(push) =
            Envelope::notification(NotificationKind::PriceDrop, "Price Drop: a was reduced to b")
        else {
            panic!("push should build");
        };
        assert_eq!(conn.deliver(push), crate::hub::Delivery::Queued);

        let writer = tokio::spawn(write_loop(
            sink,
            outbound,
            Arc::clone(&conn),
            Arc::clone(&registry),
            settings(Duration::from_secs(10)),
        ));

        let Some(Message::Text(text)) = sent.next().await else {
            panic!("expected a text frame");
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(text.as_str()) else {
            panic!("frame should be JSON");
        };
        assert_eq!(json["type"], "price_drop_notification");
        assert_eq!(json["payload"]["message"], "Price Drop: a was reduced to b");

        registry.remove(conn.id()).await;
        let Ok(exit) = writer.await else {
            panic!("writer panicked");
        };
        assert_eq!(exit, PumpExit::Cancelled);
        assert!(matches!(sent.next().await, Some(Message::Close(None))));
        assert_eq!(conn.state(), ConnectionState::Closing);
    }

    #[tokio::test]
    async fn write_loop_pings_on_interval() {
        let registry = Arc::new(Registry::default());
        let (conn, outbound) = registered(&registry).await;
        let (sink, mut sent) = fmpsc::unbounded::<Message>();

        let writer = tokio::spawn(write_loop(
            sink,
            outbound,
            Arc::clone(&conn),
            Arc::clone(&registry),
            settings(Duration::from_millis(50)),
        ));

        let first = tokio::time::timeout(Duration::from_secs(2), sent.next()).await;
        assert!(matches!(first, Ok(Some(Message::Ping(_)))));

        conn.begin_close();
        let _ = writer.await;
    }

    #[tokio::test]
    async fn failed_send_tears_down() {
        let registry = Arc::new(Registry::default());
        let (conn, outbound) = registered(&registry).await;
        let (sink, sent) = fmpsc::unbounded::<Message>();
        drop(sent);

        let Ok(push) = Envelope::notification(NotificationKind::StatusChanged, "x") else {
            panic!("push should build");
        };
        conn.deliver(push);
        let exit = write_loop(
            sink,
            outbound,
            Arc::clone(&conn),
            Arc::clone(&registry),
            settings(Duration::from_secs(10)),
        )
        .await;
        assert!(matches!(exit, PumpExit::Transport(_)));
        assert!(registry.is_empty().await);
    }
}
