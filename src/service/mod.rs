//! Service layer: business logic orchestration.
//!
//! [`NotificationService`] resolves recipients and stores notification
//! rows; [`NotificationDispatcher`] plugs it into the hub's event router
//! and fans the result out through the registry.

pub mod dispatcher;
pub mod notification_service;

pub use dispatcher::NotificationDispatcher;
pub use notification_service::NotificationService;
