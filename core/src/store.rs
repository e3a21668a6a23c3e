//! Local mirror of the active pin set.
//!
//! The hosted store owns the truth; this is the one piece of mutable shared
//! state on the client, and it is only touched through the operations below
//! so optimistic bookkeeping stays consistent. Reconciliation operations are
//! idempotent and order-independent: the feed is at-least-once and races the
//! initial full load.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::Pin;
use crate::infrastructure::backend::{BackendError, PinBackend};

pub struct PinStore {
	backend: Arc<dyn PinBackend>,
	pins: RwLock<HashMap<Uuid, Pin>>,
}

impl PinStore {
	pub fn new(backend: Arc<dyn PinBackend>) -> Self {
		Self {
			backend,
			pins: RwLock::new(HashMap::new()),
		}
	}

	/// Fetch the active baseline and merge it in. Called once at session
	/// start and again on every reconnect; the feed layers on top.
	pub async fn load_active(&self, now: DateTime<Utc>) -> Result<usize, BackendError> {
		let fresh = self.backend.load_active(now).await?;

		let mut pins = self.pins.write().await;
		pins.retain(|_, pin| pin.is_active(now));
		for pin in fresh {
			pins.insert(pin.id, pin);
		}
		debug!(count = pins.len(), "mirror baseline loaded");
		Ok(pins.len())
	}

	/// Reconcile an insert event. Upsert: the pin may already be present
	/// from the baseline load or an optimistic add.
	pub async fn apply_insert(&self, pin: Pin) -> Option<Pin> {
		self.pins.write().await.insert(pin.id, pin)
	}

	/// Reconcile an update event. Upsert: the event may arrive before the
	/// baseline load delivered the row. Returns the superseded local value.
	pub async fn apply_update(&self, pin: Pin) -> Option<Pin> {
		self.pins.write().await.insert(pin.id, pin)
	}

	/// Reconcile a delete event. Removing an unknown id is a no-op.
	pub async fn apply_delete(&self, id: Uuid) -> Option<Pin> {
		self.pins.write().await.remove(&id)
	}

	/// Local-only add, applied before the external write confirms. The
	/// authoritative event supersedes it by id.
	pub async fn optimistic_add(&self, pin: Pin) {
		self.pins.write().await.insert(pin.id, pin);
	}

	/// Local-only remove. Returns the removed snapshot so a failed external
	/// write can put it back.
	pub async fn optimistic_remove(&self, id: Uuid) -> Option<Pin> {
		self.pins.write().await.remove(&id)
	}

	pub async fn get(&self, id: Uuid) -> Option<Pin> {
		self.pins.read().await.get(&id).cloned()
	}

	/// Non-expired pins, most recent first.
	pub async fn active(&self, now: DateTime<Utc>) -> Vec<Pin> {
		let pins = self.pins.read().await;
		let mut active: Vec<Pin> = pins
			.values()
			.filter(|pin| pin.is_active(now))
			.cloned()
			.collect();
		active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		active
	}

	pub async fn len(&self) -> usize {
		self.pins.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.pins.read().await.is_empty()
	}
}
