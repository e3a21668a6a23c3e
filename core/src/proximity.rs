//! Distance gating for pin creation and delivery completion.
//!
//! Two thresholds, two stakes: creation merely reports a sighting and gets
//! the wide radius; completion claims a trust reward and must prove
//! near-physical presence, so it gets the tight one. Both checks require a
//! known user position and reject with the remaining distance so the shell
//! can tell the user how much closer to get.

use crate::config::CoreConfig;
use crate::domain::{distance_meters, GeoPoint, Pin, UserLocation};
use crate::error::CoreError;

/// A passed gate check, carrying the measured distance.
#[derive(Debug, Clone, Copy)]
pub struct GatePass {
	pub distance_m: f64,
}

pub struct ProximityGate {
	create_radius_m: f64,
	complete_radius_m: f64,
}

impl ProximityGate {
	pub fn new(config: &CoreConfig) -> Self {
		Self {
			create_radius_m: config.create_radius_m,
			complete_radius_m: config.complete_radius_m,
		}
	}

	/// May the spotter place (or move) a pin at `target`?
	pub fn check_create(
		&self,
		user: Option<&UserLocation>,
		target: GeoPoint,
	) -> Result<GatePass, CoreError> {
		self.check(user, target, self.create_radius_m)
	}

	/// May the donor mark this pin delivered from where they stand?
	pub fn check_complete(
		&self,
		user: Option<&UserLocation>,
		pin: &Pin,
	) -> Result<GatePass, CoreError> {
		self.check(user, pin.position, self.complete_radius_m)
	}

	pub fn create_radius_m(&self) -> f64 {
		self.create_radius_m
	}

	pub fn complete_radius_m(&self) -> f64 {
		self.complete_radius_m
	}

	fn check(
		&self,
		user: Option<&UserLocation>,
		target: GeoPoint,
		radius_m: f64,
	) -> Result<GatePass, CoreError> {
		let user = user.ok_or(CoreError::LocationUnavailable)?;
		if !user.point.is_valid() {
			return Err(CoreError::LocationUnavailable);
		}
		if !target.is_valid() {
			return Err(CoreError::InvalidCoordinates);
		}

		let distance_m = distance_meters(user.point, target);
		// Inclusive boundary: standing exactly on the radius passes.
		if distance_m <= radius_m {
			Ok(GatePass { distance_m })
		} else {
			Err(CoreError::OutsideRadius {
				distance_m,
				radius_m,
			})
		}
	}
}
