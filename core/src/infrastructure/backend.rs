//! Contracts for the hosted platform's persistent store.
//!
//! The store is the single arbiter for races: the conditional operations
//! below must be linearizable, succeeding for exactly one caller when raced.
//! Every predicate is re-checked server-side; the lifecycle's local guards
//! are a usability layer, not a security boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{GeoPoint, Notification, Pin};

#[derive(Error, Debug)]
pub enum BackendError {
	/// A conditional update lost: the row changed under us. Carries the
	/// authoritative row when the store returned it, so the caller can
	/// converge its mirror.
	#[error("conditional update lost: pin changed concurrently")]
	Conflict { current: Option<Pin> },

	/// The store's own authorization predicate rejected the write.
	#[error("rejected by the store: {0}")]
	Forbidden(String),

	#[error("pin not found")]
	NotFound,

	#[error("store unreachable: {0}")]
	Unavailable(String),
}

/// The pins table and its conditional-update primitives.
#[async_trait]
pub trait PinBackend: Send + Sync {
	/// All pins whose expiry is in the future, most recent first.
	async fn load_active(&self, now: DateTime<Utc>) -> Result<Vec<Pin>, BackendError>;

	async fn insert(&self, pin: &Pin) -> Result<(), BackendError>;

	/// Move an open pin. Conditional on `created_by == actor` and
	/// `status == open`.
	async fn update_position(
		&self,
		id: Uuid,
		actor: Uuid,
		to: GeoPoint,
	) -> Result<Pin, BackendError>;

	/// Claim an open pin. Conditional on `status == open`; rejects
	/// `created_by == actor` outright.
	async fn try_lock(&self, id: Uuid, actor: Uuid, at: DateTime<Utc>)
		-> Result<Pin, BackendError>;

	/// Release a claim. Conditional on `status == locked` and
	/// `locked_by == actor`.
	async fn release_lock(&self, id: Uuid, actor: Uuid) -> Result<Pin, BackendError>;

	/// Finish a delivery, attaching the proof reference. Conditional on
	/// `status == locked` and `locked_by == actor`.
	async fn complete(&self, id: Uuid, actor: Uuid, proof_ref: &str) -> Result<Pin, BackendError>;

	/// Remove a report. Conditional on `created_by == actor` and
	/// `status == open`.
	async fn delete(&self, id: Uuid, actor: Uuid) -> Result<(), BackendError>;
}

/// The persisted notifications table.
#[async_trait]
pub trait NotificationStore: Send + Sync {
	async fn insert(&self, notification: &Notification) -> Result<(), BackendError>;

	/// Most recent notifications for one user, newest first.
	async fn recent(&self, recipient: Uuid, limit: usize)
		-> Result<Vec<Notification>, BackendError>;

	async fn mark_all_read(&self, recipient: Uuid) -> Result<(), BackendError>;
}
