//! Error types for the KindBite core.
//!
//! Every failure a handler can surface maps onto one of five user-facing
//! categories via [`CoreError::kind`]: validation and policy failures are
//! rejected before any platform call, authorization failures come back from
//! the store's conditional updates, permission failures block until the
//! device grants access, and transient failures are retryable.

use thiserror::Error;
use uuid::Uuid;

use crate::infrastructure::backend::BackendError;
use crate::infrastructure::collaborators::{BlobError, CameraError};

/// Broad category of a [`CoreError`], used by the shell to pick a
/// presentation: inline message, transient banner, blocking screen, or
/// retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	Policy,
	Authorization,
	Permission,
	Transient,
}

#[derive(Error, Debug)]
pub enum CoreError {
	// Validation errors, rejected before any external call
	#[error("description too short (minimum {min} characters)")]
	DescriptionTooShort { min: usize },
	#[error("people count must be between 1 and 5 (got {0})")]
	PeopleCountOutOfRange(u8),
	#[error("the new pin has no location")]
	MissingDraftLocation,
	#[error("coordinates out of range")]
	InvalidCoordinates,

	// Policy errors, rejected locally with a specific reason
	#[error("{distance_m:.0}m away, get within {radius_m:.0}m")]
	OutsideRadius { distance_m: f64, radius_m: f64 },
	#[error("you cannot respond to your own report")]
	OwnPin,

	// Authorization errors, the store is the arbiter
	#[error("pin was already claimed by another donor")]
	AlreadyLocked,
	#[error("pin is no longer available")]
	NoLongerAvailable,
	#[error("only the responding donor can do that")]
	NotLockHolder,
	#[error("only the reporter can do that")]
	NotCreator,
	#[error("a claimed pin cannot be removed")]
	PinClaimed,
	#[error("pin not found: {0}")]
	PinNotFound(Uuid),
	#[error("not signed in")]
	NotAuthenticated,

	// Permission errors, blocking until the device grants access
	#[error("your location is unavailable")]
	LocationUnavailable,
	#[error(transparent)]
	Camera(#[from] CameraError),

	// Transient errors, retryable
	#[error(transparent)]
	Backend(#[from] BackendError),
	#[error("proof upload failed: {0}")]
	Upload(#[from] BlobError),
}

impl CoreError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::DescriptionTooShort { .. }
			| Self::PeopleCountOutOfRange(_)
			| Self::MissingDraftLocation
			| Self::InvalidCoordinates => ErrorKind::Validation,

			Self::OutsideRadius { .. } | Self::OwnPin => ErrorKind::Policy,

			Self::AlreadyLocked
			| Self::NoLongerAvailable
			| Self::NotLockHolder
			| Self::NotCreator
			| Self::PinClaimed
			| Self::PinNotFound(_)
			| Self::NotAuthenticated => ErrorKind::Authorization,

			Self::LocationUnavailable | Self::Camera(_) => ErrorKind::Permission,

			// A conditional update the store refused is an authorization
			// failure even when it reaches us unmapped.
			Self::Backend(BackendError::Forbidden(_))
			| Self::Backend(BackendError::Conflict { .. }) => ErrorKind::Authorization,
			Self::Backend(_) | Self::Upload(_) => ErrorKind::Transient,
		}
	}
}
