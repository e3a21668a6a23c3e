//! Geographic primitives and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (WGS-84).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the map in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

impl GeoPoint {
	pub fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}

	/// Both coordinates are finite and within range.
	pub fn is_valid(&self) -> bool {
		self.lat.is_finite()
			&& self.lng.is_finite()
			&& self.lat.abs() <= 90.0
			&& self.lng.abs() <= 180.0
	}
}

/// Great-circle distance between two points, in meters (haversine).
///
/// Symmetric, zero for coincident points. NaN input propagates as NaN;
/// callers accepting untrusted coordinates must check [`GeoPoint::is_valid`]
/// before relying on the result.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
	let lat1 = a.lat.to_radians();
	let lat2 = b.lat.to_radians();
	let dlat = (b.lat - a.lat).to_radians();
	let dlng = (b.lng - a.lng).to_radians();

	let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
	2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
