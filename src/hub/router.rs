//! Event-type dispatch table.
//!
//! The router is filled once at startup and then shared read-only. Routing
//! runs the handler inline on the calling connection's read pump.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::connection::Connection;
use crate::domain::Envelope;
use crate::error::HubError;

/// Business logic reacting to one inbound event type.
#[async_trait]
pub trait EventHandler: fmt::Debug + Send + Sync + 'static {
    /// Handles one decoded envelope sent by `source`.
    ///
    /// # Errors
    ///
    /// Any error is logged by the read pump and never closes the
    /// connection.
    async fn handle(&self, envelope: &Envelope, source: &Connection) -> Result<(), HubError>;
}

/// Maps event-type strings to handlers.
#[derive(Debug, Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `event_type`, returning the handler it
    /// replaced. The last registration for a type wins.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        self.handlers.insert(event_type.into(), handler)
    }

    /// Dispatches `envelope` to the handler registered for its type.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownEventType`] when nothing is registered for
    /// the type, otherwise whatever the handler returns.
    pub async fn route(&self, envelope: &Envelope, source: &Connection) -> Result<(), HubError> {
        let Some(handler) = self.handlers.get(&envelope.event_type) else {
            return Err(HubError::UnknownEventType(envelope.event_type.clone()));
        };
        handler.handle(envelope, source).await
    }

    /// Returns `true` if a handler is registered for `event_type`.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Registered event types, in no particular order.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
