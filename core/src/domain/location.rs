//! Live device location state.

use chrono::{DateTime, Utc};

use super::geo::GeoPoint;

/// Whether the device granted us its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
	/// Not yet asked, or no answer yet.
	Unknown,
	Granted,
	Denied,
}

/// The most recent position sample. Overwritten on every update, never
/// persisted.
#[derive(Debug, Clone, Copy)]
pub struct UserLocation {
	pub point: GeoPoint,
	pub acquired_at: DateTime<Utc>,
}

/// One message from the device location subsystem.
#[derive(Debug, Clone)]
pub enum LocationUpdate {
	Sample {
		point: GeoPoint,
		at: DateTime<Utc>,
	},
	/// The watch errored or permission was refused.
	Denied,
}
