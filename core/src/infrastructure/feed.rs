//! Change-feed payloads and their boundary validation.
//!
//! The platform delivers pin changes as a tagged union over raw JSON,
//! at-least-once and unordered relative to a concurrently issued full load.
//! Payload shape is externally defined, so it is coerced into the typed
//! [`PinChange`] here instead of being trusted implicitly; malformed events
//! are dropped by the session pump with a warning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::backend::BackendError;
use crate::domain::{Notification, Pin};

/// One event from the pin change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "lowercase")]
pub enum PinChange {
	Insert(Pin),
	Update(Pin),
	Delete { id: Uuid },
}

#[derive(Error, Debug)]
pub enum FeedError {
	#[error("malformed feed payload: {0}")]
	Malformed(#[from] serde_json::Error),
	#[error("invalid feed record: {0}")]
	InvalidRecord(&'static str),
}

impl PinChange {
	/// Coerce a raw feed payload into a typed change.
	pub fn from_value(value: Value) -> Result<Self, FeedError> {
		let change: PinChange = serde_json::from_value(value)?;
		if let PinChange::Insert(pin) | PinChange::Update(pin) = &change {
			if !pin.position.is_valid() {
				return Err(FeedError::InvalidRecord("coordinates out of range"));
			}
		}
		Ok(change)
	}
}

/// The platform's realtime subscriptions.
///
/// Receivers stay open for the life of the session; dropping one tears the
/// underlying subscription down.
#[async_trait]
pub trait PinFeedSource: Send + Sync {
	/// Subscribe to the pin change feed, delivered as raw payloads.
	async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Value>, BackendError>;

	/// Subscribe to notification inserts addressed to one user.
	async fn subscribe_notifications(
		&self,
		recipient: Uuid,
	) -> Result<mpsc::UnboundedReceiver<Notification>, BackendError>;
}
