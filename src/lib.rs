//! # listing-notify
//!
//! Realtime notification hub for property listings.
//!
//! Clients hold a WebSocket open at `/ws`. When a client reports that a
//! listing was favorited, had its price reduced, or changed status, the hub
//! resolves who should hear about it, stores one notification per
//! recipient, and pushes the message to every live socket those recipients
//! own. Stored notifications are readable over REST.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Upgrade + Hub (hub/)
//!     │       read pump ─► EventRouter ─► NotificationDispatcher
//!     │       write pump ◄─ outbound queue ◄─ Registry::broadcast
//!     │
//!     ├── NotificationService (service/)
//!     │
//!     └── NotificationStore / RecipientDirectory / SessionResolver
//!             ├── PostgreSQL (persistence/postgres)
//!             └── in-memory (persistence/memory)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod persistence;
pub mod service;
