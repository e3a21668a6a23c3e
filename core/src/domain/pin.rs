//! Pin, a hunger report placed on the map.
//!
//! A pin is created by a spotter, optionally claimed ("locked") by a donor,
//! and either completed with a delivery proof, released back to open, or
//! deleted by its creator. The hosted store owns the authoritative row; the
//! structs here are the client-side mirror of it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use super::geo::GeoPoint;

/// Fulfillment state of a pin. Deletion removes the row entirely and is not
/// a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PinStatus {
	/// Reported, waiting for a donor.
	Open,
	/// Claimed by exactly one donor.
	Locked,
	/// Delivery proven and finished.
	Completed,
}

/// How long a report stays on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TtlClass {
	Short,
	Medium,
	Long,
}

/// A hunger report and its fulfillment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
	pub id: Uuid,
	#[serde(flatten)]
	pub position: GeoPoint,
	pub description: String,
	/// Estimated people in need, bucketed 1 to 5.
	pub people_count: u8,
	pub ttl: TtlClass,
	pub created_by: Uuid,
	pub status: PinStatus,
	pub locked_by: Option<Uuid>,
	pub locked_at: Option<DateTime<Utc>>,
	/// Reference into blob storage, present once completed.
	pub proof_ref: Option<String>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl Pin {
	/// Build a fresh open pin from a draft. The id is tentative until the
	/// store confirms the insert.
	pub fn from_draft(draft: &PinDraft, created_by: Uuid, now: DateTime<Utc>, ttl: Duration) -> Self {
		Self {
			id: Uuid::new_v4(),
			position: draft.position,
			description: draft.description.trim().to_string(),
			people_count: draft.people_count,
			ttl: draft.ttl,
			created_by,
			status: PinStatus::Open,
			locked_by: None,
			locked_at: None,
			proof_ref: None,
			created_at: now,
			expires_at: now + ttl,
		}
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}

	/// Expired pins stay in the store but leave the active view.
	pub fn is_active(&self, now: DateTime<Utc>) -> bool {
		!self.is_expired(now)
	}

	pub fn is_locked(&self) -> bool {
		self.status == PinStatus::Locked
	}

	/// How long the current claim has been held, if any.
	pub fn lock_held_for(&self, now: DateTime<Utc>) -> Option<Duration> {
		self.locked_at.map(|at| now - at)
	}

	/// A claim held past the grace period. Advisory only: the store does not
	/// revert stale locks, the UI badges them.
	pub fn lock_is_stale(&self, now: DateTime<Utc>, grace: Duration) -> bool {
		self.is_locked() && self.lock_held_for(now).is_some_and(|held| held > grace)
	}

	/// Structural invariants of the record:
	/// locked iff lock-holder and lock timestamp are set, completed implies
	/// a proof reference, and the lock-holder is never the creator.
	pub fn invariants_hold(&self) -> bool {
		let lock_fields = self.locked_by.is_some() && self.locked_at.is_some();
		match self.status {
			PinStatus::Open => self.locked_by.is_none() && self.locked_at.is_none(),
			PinStatus::Locked => lock_fields && self.locked_by != Some(self.created_by),
			PinStatus::Completed => self.proof_ref.is_some(),
		}
	}
}

/// User input for a new pin, before validation.
#[derive(Debug, Clone)]
pub struct PinDraft {
	pub position: GeoPoint,
	pub description: String,
	pub people_count: u8,
	pub ttl: TtlClass,
}

impl PinDraft {
	/// Local validation, run before any store call.
	pub fn validate(&self, min_description_len: usize) -> Result<(), crate::error::CoreError> {
		use crate::error::CoreError;

		if !self.position.is_valid() {
			return Err(CoreError::InvalidCoordinates);
		}
		if self.description.trim().chars().count() < min_description_len {
			return Err(CoreError::DescriptionTooShort {
				min: min_description_len,
			});
		}
		if !(1..=5).contains(&self.people_count) {
			return Err(CoreError::PeopleCountOutOfRange(self.people_count));
		}
		Ok(())
	}
}
