//! The pin state machine: create, lock, cancel, complete, move, delete.
//!
//! Transitions run as optimistic local mutations backed by conditional
//! writes against the hosted store. The store arbitrates every race: a
//! `lock` is a compare-and-swap on `status == open`, never a read-then-
//! write, and the loser converges its mirror to the winner's row. Local
//! guards exist for fast feedback only; the store re-checks each predicate.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::domain::{GeoPoint, Pin, PinDraft, PinStatus, UserLocation};
use crate::error::CoreError;
use crate::infrastructure::backend::BackendError;
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::Platform;
use crate::proximity::ProximityGate;
use crate::store::PinStore;

pub struct PinLifecycle {
	config: CoreConfig,
	platform: Platform,
	store: Arc<PinStore>,
	gate: ProximityGate,
	events: Arc<EventBus>,
}

impl PinLifecycle {
	pub fn new(
		config: CoreConfig,
		platform: Platform,
		store: Arc<PinStore>,
		events: Arc<EventBus>,
	) -> Self {
		let gate = ProximityGate::new(&config);
		Self {
			config,
			platform,
			store,
			gate,
			events,
		}
	}

	pub fn gate(&self) -> &ProximityGate {
		&self.gate
	}

	fn current_user(&self) -> Result<Uuid, CoreError> {
		self.platform
			.session
			.current_user()
			.ok_or(CoreError::NotAuthenticated)
	}

	/// Place a new report. Validates locally, gates on the creation radius,
	/// then persists with an optimistic local add that is rolled back if the
	/// insert fails.
	pub async fn create(
		&self,
		draft: PinDraft,
		user: Option<&UserLocation>,
	) -> Result<Pin, CoreError> {
		let actor = self.current_user()?;
		draft.validate(self.config.min_description_len)?;
		let pass = self.gate.check_create(user, draft.position)?;

		let now = Utc::now();
		let pin = Pin::from_draft(&draft, actor, now, self.config.ttl_duration(draft.ttl));

		self.store.optimistic_add(pin.clone()).await;
		if let Err(err) = self.platform.pins.insert(&pin).await {
			// Compensate: never leave a phantom pin in the mirror.
			self.store.optimistic_remove(pin.id).await;
			warn!(pin_id = %pin.id, "pin insert failed, optimistic add rolled back");
			return Err(err.into());
		}

		info!(pin_id = %pin.id, distance_m = pass.distance_m, "pin created");
		self.events.emit(Event::PinCreated {
			pin_id: pin.id,
			created_by: actor,
			position: pin.position,
		});
		Ok(pin)
	}

	/// Remove an own, unclaimed report.
	pub async fn delete(&self, id: Uuid) -> Result<(), CoreError> {
		let actor = self.current_user()?;
		let pin = self.local(id).await?;
		if pin.created_by != actor {
			return Err(CoreError::NotCreator);
		}
		if pin.status != PinStatus::Open {
			return Err(CoreError::PinClaimed);
		}

		let snapshot = self.store.optimistic_remove(id).await;
		if let Err(err) = self.platform.pins.delete(id, actor).await {
			if let Some(pin) = snapshot {
				self.store.optimistic_add(pin).await;
			}
			return Err(self.reconcile_failure(id, err).await);
		}

		info!(pin_id = %id, "pin deleted");
		self.events.emit(Event::PinDeleted { pin_id: id });
		Ok(())
	}

	/// Claim an open pin. Exactly one donor wins a race; the loser sees
	/// [`CoreError::AlreadyLocked`] and a mirror converged to the winner.
	pub async fn lock(&self, id: Uuid) -> Result<Pin, CoreError> {
		let actor = self.current_user()?;
		let pin = self.local(id).await?;
		if pin.created_by == actor {
			return Err(CoreError::OwnPin);
		}
		match pin.status {
			PinStatus::Open => {}
			PinStatus::Locked => return Err(CoreError::AlreadyLocked),
			PinStatus::Completed => return Err(CoreError::NoLongerAvailable),
		}

		match self.platform.pins.try_lock(id, actor, Utc::now()).await {
			Ok(updated) => {
				self.store.apply_update(updated.clone()).await;
				info!(pin_id = %id, "lock won");
				self.events.emit(Event::PinLocked {
					pin_id: id,
					locked_by: actor,
					created_by: updated.created_by,
				});
				Ok(updated)
			}
			Err(BackendError::Conflict { current }) => {
				debug!(pin_id = %id, "lock lost");
				self.converge(id, current).await;
				Err(CoreError::AlreadyLocked)
			}
			Err(err) => Err(self.reconcile_failure(id, err).await),
		}
	}

	/// Release a held claim, reverting the pin to open. A claim held past
	/// the grace period draws a trust penalty.
	pub async fn cancel(&self, id: Uuid) -> Result<Pin, CoreError> {
		let actor = self.current_user()?;
		let pin = self.local(id).await?;
		if pin.locked_by != Some(actor) {
			return Err(CoreError::NotLockHolder);
		}

		match self.platform.pins.release_lock(id, actor).await {
			Ok(updated) => {
				self.store.apply_update(updated.clone()).await;

				let held_too_long = pin
					.lock_held_for(Utc::now())
					.is_some_and(|held| held > self.config.lock_grace());
				if held_too_long {
					self.adjust_trust(actor, -self.config.cancel_penalty, "lock held past grace");
				}

				info!(pin_id = %id, penalized = held_too_long, "lock released");
				self.events.emit(Event::LockReleased {
					pin_id: id,
					released_by: actor,
					penalized: held_too_long,
				});
				Ok(updated)
			}
			Err(BackendError::Conflict { current }) => {
				self.converge(id, current).await;
				Err(CoreError::NoLongerAvailable)
			}
			Err(err) => Err(self.reconcile_failure(id, err).await),
		}
	}

	/// Finish a delivery: prove presence inside the completion radius,
	/// upload the photo, then conditionally complete with the proof
	/// reference attached. Both parties earn a trust reward.
	pub async fn complete(
		&self,
		id: Uuid,
		user: Option<&UserLocation>,
		photo: Vec<u8>,
	) -> Result<Pin, CoreError> {
		let actor = self.current_user()?;
		let pin = self.local(id).await?;
		if pin.locked_by != Some(actor) {
			return Err(CoreError::NotLockHolder);
		}
		self.gate.check_complete(user, &pin)?;

		let now = Utc::now();
		let proof_ref = self
			.platform
			.blobs
			.upload_proof(actor, id, now, photo)
			.await?;

		match self.platform.pins.complete(id, actor, &proof_ref).await {
			Ok(updated) => {
				self.store.apply_update(updated.clone()).await;
				self.adjust_trust(actor, self.config.donor_reward, "delivery completed");
				self.adjust_trust(
					updated.created_by,
					self.config.spotter_reward,
					"report fulfilled",
				);

				info!(pin_id = %id, proof = %proof_ref, "delivery completed");
				self.events.emit(Event::PinCompleted {
					pin_id: id,
					completed_by: actor,
					created_by: updated.created_by,
				});
				Ok(updated)
			}
			Err(BackendError::Conflict { current }) => {
				self.converge(id, current).await;
				Err(CoreError::NoLongerAvailable)
			}
			Err(err) => Err(self.reconcile_failure(id, err).await),
		}
	}

	/// Move an own, still-open report. The creation radius applies to the
	/// new position too, otherwise a drag would defeat the creation gate.
	pub async fn move_pin(
		&self,
		id: Uuid,
		to: GeoPoint,
		user: Option<&UserLocation>,
	) -> Result<Pin, CoreError> {
		let actor = self.current_user()?;
		let pin = self.local(id).await?;
		if pin.created_by != actor {
			return Err(CoreError::NotCreator);
		}
		if pin.status != PinStatus::Open {
			return Err(CoreError::PinClaimed);
		}
		self.gate.check_create(user, to)?;

		match self.platform.pins.update_position(id, actor, to).await {
			Ok(updated) => {
				self.store.apply_update(updated.clone()).await;
				debug!(pin_id = %id, "pin moved");
				self.events.emit(Event::PinMoved { pin_id: id });
				Ok(updated)
			}
			Err(BackendError::Conflict { current }) => {
				self.converge(id, current).await;
				Err(CoreError::NoLongerAvailable)
			}
			Err(err) => Err(self.reconcile_failure(id, err).await),
		}
	}

	async fn local(&self, id: Uuid) -> Result<Pin, CoreError> {
		self.store.get(id).await.ok_or(CoreError::PinNotFound(id))
	}

	/// Converge the mirror to the authoritative row after a lost
	/// conditional update.
	async fn converge(&self, id: Uuid, current: Option<Pin>) {
		match current {
			Some(pin) => {
				self.store.apply_update(pin).await;
			}
			None => {
				self.store.apply_delete(id).await;
			}
		}
	}

	async fn reconcile_failure(&self, id: Uuid, err: BackendError) -> CoreError {
		if matches!(err, BackendError::NotFound) {
			self.store.apply_delete(id).await;
			return CoreError::NoLongerAvailable;
		}
		err.into()
	}

	/// Fire-and-forget trust-score delta; the ledger collaborator handles
	/// concurrent adjustments atomically.
	fn adjust_trust(&self, user: Uuid, delta: i32, reason: &'static str) {
		let ledger = self.platform.reputation.clone();
		tokio::spawn(async move {
			if let Err(err) = ledger.adjust(user, delta, reason).await {
				warn!(%user, delta, reason, "trust-score adjustment failed: {err}");
			}
		});
	}
}
