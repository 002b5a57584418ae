//! Wire envelope and the typed listing events decoded from it.
//!
//! Every WebSocket frame in either direction is a JSON [`Envelope`]. The
//! envelope is the only structurally-typed part of the protocol; the payload
//! is decoded into a [`ListingEvent`] variant only after the `type` string
//! has selected a handler.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ListingId, NotificationKind};
use crate::error::HubError;

/// `{"type": ..., "payload": ...}` wrapper used for inbound and outbound
/// frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Builds the outgoing push for a notification:
    /// `{"type": <kind>, "payload": {"message": <text>}}`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Internal`] if the payload cannot be serialized.
    pub fn notification(kind: NotificationKind, message: &str) -> Result<Self, HubError> {
        let push = NotificationPush {
            message: message.to_string(),
        };
        let payload = serde_json::to_value(push)
            .map_err(|e| HubError::Internal(format!("notification payload: {e}")))?;
        Ok(Self {
            event_type: kind.as_str().to_string(),
            payload,
        })
    }

    /// Decodes a raw frame into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MalformedEnvelope`] if the frame is not a JSON
    /// object with a string `type`.
    pub fn from_slice(frame: &[u8]) -> Result<Self, HubError> {
        serde_json::from_slice(frame).map_err(|e| HubError::MalformedEnvelope(e.to_string()))
    }

    /// Decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MalformedPayload`] if the payload does not match
    /// the shape of `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, HubError> {
        T::deserialize(&self.payload).map_err(|e| HubError::MalformedPayload {
            event_type: self.event_type.clone(),
            reason: e.to_string(),
        })
    }
}

/// Outgoing payload pushed to recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPush {
    /// Human-readable notification text.
    pub message: String,
}

/// Payload of `favorited_listing_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FavoritedListing {
    /// Listing that was favorited.
    pub listing_id: ListingId,
    /// Street address shown in the message.
    pub address: String,
}

/// Payload of `price_drop_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceDrop {
    /// Listing whose price dropped.
    pub listing_id: ListingId,
    /// Street address shown in the message.
    pub address: String,
    /// New price, preformatted by the sender.
    pub price: String,
}

/// Payload of `status_changed_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusChange {
    /// Listing whose status changed.
    pub listing_id: ListingId,
    /// Street address shown in the message.
    pub address: String,
    /// New status label.
    pub status: String,
}

/// Closed set of inbound events the notification handlers understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent {
    /// A listing was favorited.
    FavoritedListing(FavoritedListing),
    /// A listing's price was reduced.
    PriceDrop(PriceDrop),
    /// A listing's status changed.
    StatusChange(StatusChange),
}

impl ListingEvent {
    /// Decodes an envelope into the variant selected by its `type`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownEventType`] if `type` is not a
    /// notification kind, or [`HubError::MalformedPayload`] if the payload
    /// does not fit the variant.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, HubError> {
        let kind: NotificationKind = envelope
            .event_type
            .parse()
            .map_err(HubError::UnknownEventType)?;
        match kind {
            NotificationKind::FavoritedListing => {
                envelope.decode_payload().map(Self::FavoritedListing)
            }
            NotificationKind::PriceDrop => envelope.decode_payload().map(Self::PriceDrop),
            NotificationKind::StatusChanged => envelope.decode_payload().map(Self::StatusChange),
        }
    }

    /// Returns the notification kind this event produces.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::FavoritedListing(_) => NotificationKind::FavoritedListing,
            Self::PriceDrop(_) => NotificationKind::PriceDrop,
            Self::StatusChange(_) => NotificationKind::StatusChanged,
        }
    }

    /// Returns the listing the event is about.
    #[must_use]
    pub const fn listing_id(&self) -> ListingId {
        match self {
            Self::FavoritedListing(e) => e.listing_id,
            Self::PriceDrop(e) => e.listing_id,
            Self::StatusChange(e) => e.listing_id,
        }
    }

    /// Renders the human-readable notification text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::FavoritedListing(e) => format!("New favorite on {}", e.address),
            Self::PriceDrop(e) => format!("Price Drop: {} was reduced to {}", e.address, e.price),
            Self::StatusChange(e) => format!(
                "Status Change: Status of {} was changed to {}",
                e.address, e.status
            ),
        }
    }
}
