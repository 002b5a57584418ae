//! Event handler that turns listing events into stored and pushed
//! notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::NotificationService;
use crate::domain::{Envelope, ListingEvent, NotificationKind};
use crate::error::HubError;
use crate::hub::{Connection, EventHandler, EventRouter, Registry};

/// Handles the three listing notification types.
///
/// Recipient lookup and persistence run under `timeout`; fan-out through
/// the [`Registry`] happens after and never blocks.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    service: NotificationService,
    registry: Arc<Registry>,
    timeout: Duration,
}

impl NotificationDispatcher {
    /// Creates a dispatcher that pushes through `registry`.
    #[must_use]
    pub fn new(service: NotificationService, registry: Arc<Registry>, timeout: Duration) -> Self {
        Self {
            service,
            registry,
            timeout,
        }
    }

    /// Registers this dispatcher for every [`NotificationKind`].
    pub fn register(self: &Arc<Self>, router: &mut EventRouter) {
        for kind in NotificationKind::ALL {
            router.register(kind.as_str(), Arc::clone(self) as Arc<dyn EventHandler>);
        }
    }
}

#[async_trait]
impl EventHandler for NotificationDispatcher {
    async fn handle(&self, envelope: &Envelope, source: &Connection) -> Result<(), HubError> {
        let event = ListingEvent::from_envelope(envelope)?;

        let recipients = tokio::time::timeout(self.timeout, self.service.record(&event))
            .await
            .map_err(|_elapsed| HubError::HandlerTimeout(self.timeout))??;

        if recipients.is_empty() {
            tracing::debug!(
                conn_id = %source.id(),
                event_type = %envelope.event_type,
                listing_id = %event.listing_id(),
                "no recipients"
            );
            return Ok(());
        }

        let push = Envelope::notification(event.kind(), &event.message())?;
        let delivered = self
            .registry
            .broadcast(|c| recipients.contains(&c.user_id()), &push)
            .await;

        tracing::info!(
            conn_id = %source.id(),
            user_id = %source.user_id(),
            event_type = %envelope.event_type,
            listing_id = %event.listing_id(),
            recipients = recipients.len(),
            delivered,
            "notification dispatched"
        );
        Ok(())
    }
}
