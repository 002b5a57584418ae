//! A single live WebSocket connection.
//!
//! A [`Connection`] carries the caller's identity, the sending half of its
//! private outbound queue and a cancellation token shared by its two pumps.
//! The socket itself is never stored here: its halves are owned by the read
//! and write pumps, and cancelling the token is how the socket gets closed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnectionId, Envelope, Identity, UserId};

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Upgraded but not yet registered.
    Connecting = 0,
    /// Registered and reachable by fan-out.
    Open = 1,
    /// Removed from the registry; pumps are unwinding.
    Closing = 2,
    /// Both pumps exited and the socket is dropped.
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Outcome of pushing one envelope into a connection's queue.
///
/// Teardown drops the queue's sender under the same lock `deliver` holds,
/// so once [`Delivery::Closed`] is possible no later envelope is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope is queued for the write pump.
    Queued,
    /// The queue is at capacity; the envelope was not queued.
    Full,
    /// The connection is no longer open; the envelope was not queued.
    Closed,
}

/// One live client connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    outbound: Mutex<Option<mpsc::Sender<Envelope>>>,
    cancel: CancellationToken,
    state: AtomicU8,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Creates a connection in the `Connecting` state together with the
    /// receiving half of its outbound queue, which belongs to the write pump.
    #[must_use]
    pub fn new(identity: Identity, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            identity,
            outbound: Mutex::new(Some(tx)),
            cancel: CancellationToken::new(),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            connected_at: Utc::now(),
        });
        (connection, rx)
    }

    /// Unique connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Owner of this connection.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// When the socket upgrade completed.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the connection is registered and reachable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Resolves once teardown has started for this connection.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Returns `true` once teardown has started.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queues an envelope without waiting.
    ///
    /// Never blocks: a full queue is reported as [`Delivery::Full`] and left
    /// to the registry's overflow policy.
    pub fn deliver(&self, envelope: Envelope) -> Delivery {
        let outbound = self.outbound();
        let Some(tx) = outbound.as_ref() else {
            return Delivery::Closed;
        };
        if !self.is_open() {
            return Delivery::Closed;
        }
        match tx.try_send(envelope) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<Envelope>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Connecting → Open`. Returns `false` if the connection already left
    /// `Connecting`.
    pub(crate) fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves to `Closing` and cancels the pumps. Returns `true` only for the
    /// call that performed the transition.
    pub(crate) fn begin_close(&self) -> bool {
        let transitioned = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw < ConnectionState::Closing as u8).then_some(ConnectionState::Closing as u8)
            })
            .is_ok();
        self.cancel.cancel();
        self.outbound().take();
        transitioned
    }

    /// Terminal transition once both pumps have exited.
    pub(crate) fn mark_closed(&self) {
        self.cancel.cancel();
        self.outbound().take();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}
