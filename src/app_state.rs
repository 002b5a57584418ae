//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::hub::{ConnectionSettings, EventRouter, Hub, Registry};
use crate::persistence::{NotificationStore, RecipientDirectory, SessionResolver};
use crate::service::{NotificationDispatcher, NotificationService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Realtime hub serving upgraded sockets.
    pub hub: Hub,
    /// Notification reads and read-flag toggles for the REST endpoints.
    pub notifications: NotificationService,
    /// Session token lookup used by the auth extractor.
    pub sessions: Arc<dyn SessionResolver>,
}

impl AppState {
    /// Wires the registry, notification dispatcher, router and hub over
    /// the given stores.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn RecipientDirectory>,
        sessions: Arc<dyn SessionResolver>,
        settings: ConnectionSettings,
        handler_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(Registry::new(settings.overflow_policy));
        let notifications = NotificationService::new(store, directory);

        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifications.clone(),
            Arc::clone(&registry),
            handler_timeout,
        ));
        let mut router = EventRouter::new();
        dispatcher.register(&mut router);

        Self {
            hub: Hub::new(registry, Arc::new(router), settings),
            notifications,
            sessions,
        }
    }
}
