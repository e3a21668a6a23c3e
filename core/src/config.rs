//! Core configuration: the numeric policy knobs and their persistence.
//!
//! Radii, grace periods and rewards are deployment policy, not law; they
//! live here instead of being hard-coded at the call sites.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{GeoPoint, TtlClass};

const CONFIG_FILE: &str = "kindbite.json";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("config io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("config parse error: {0}")]
	Parse(#[from] serde_json::Error),
}

/// Tunable policy for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
	/// Config schema version.
	pub version: u32,

	/// Spotters may only place (or move) pins within this radius of their
	/// own position.
	pub create_radius_m: f64,

	/// Donors must be within this radius of the pin to complete a delivery.
	/// Tighter than the creation radius: completion claims a reward.
	pub complete_radius_m: f64,

	/// A lock released after longer than this draws a trust penalty.
	pub lock_grace_secs: u64,

	/// Trust-score delta for a cancel past the grace period.
	pub cancel_penalty: i32,

	/// Trust-score rewards on a completed delivery.
	pub donor_reward: i32,
	pub spotter_reward: i32,

	/// Minimum description length for a new pin.
	pub min_description_len: usize,

	/// TTL class durations in seconds.
	pub ttl_short_secs: u64,
	pub ttl_medium_secs: u64,
	pub ttl_long_secs: u64,

	/// How long a transient banner stays visible.
	pub banner_secs: u64,

	/// Map center used before the first location fix.
	pub fallback_center: GeoPoint,
}

impl Default for CoreConfig {
	fn default() -> Self {
		Self {
			version: 1,
			create_radius_m: 200.0,
			complete_radius_m: 50.0,
			lock_grace_secs: 30 * 60,
			cancel_penalty: 10,
			donor_reward: 25,
			spotter_reward: 10,
			min_description_len: 3,
			ttl_short_secs: 60 * 60,
			ttl_medium_secs: 2 * 60 * 60,
			ttl_long_secs: 4 * 60 * 60,
			banner_secs: 3,
			// Dhaka
			fallback_center: GeoPoint::new(23.8103, 90.4125),
		}
	}
}

impl CoreConfig {
	/// Load the config from `dir`, writing defaults there if absent.
	pub fn load_or_create(dir: &Path) -> Result<Self, ConfigError> {
		let path = Self::path(dir);
		if path.exists() {
			info!("loading config from {:?}", path);
			let json = fs::read_to_string(&path)?;
			Ok(serde_json::from_str(&json)?)
		} else {
			warn!("no config found, creating default at {:?}", path);
			let config = Self::default();
			config.save(dir)?;
			Ok(config)
		}
	}

	pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
		fs::create_dir_all(dir)?;
		let path = Self::path(dir);
		fs::write(&path, serde_json::to_string_pretty(self)?)?;
		info!("saved config to {:?}", path);
		Ok(())
	}

	fn path(dir: &Path) -> PathBuf {
		dir.join(CONFIG_FILE)
	}

	pub fn lock_grace(&self) -> Duration {
		Duration::seconds(self.lock_grace_secs as i64)
	}

	pub fn banner_ttl(&self) -> Duration {
		Duration::seconds(self.banner_secs as i64)
	}

	pub fn ttl_duration(&self, class: TtlClass) -> Duration {
		let secs = match class {
			TtlClass::Short => self.ttl_short_secs,
			TtlClass::Medium => self.ttl_medium_secs,
			TtlClass::Long => self.ttl_long_secs,
		};
		Duration::seconds(secs as i64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_current_policy() {
		let config = CoreConfig::default();
		assert_eq!(config.create_radius_m, 200.0);
		assert_eq!(config.complete_radius_m, 50.0);
		assert_eq!(config.lock_grace(), Duration::minutes(30));
		assert_eq!(config.ttl_duration(TtlClass::Short), Duration::hours(1));
		assert_eq!(config.ttl_duration(TtlClass::Medium), Duration::hours(2));
		assert_eq!(config.ttl_duration(TtlClass::Long), Duration::hours(4));
	}

	#[test]
	fn round_trips_through_disk() {
		let dir = tempfile::tempdir().unwrap();

		let mut config = CoreConfig::load_or_create(dir.path()).unwrap();
		config.create_radius_m = 100.0;
		config.save(dir.path()).unwrap();

		let reloaded = CoreConfig::load_or_create(dir.path()).unwrap();
		assert_eq!(reloaded.create_radius_m, 100.0);
		assert_eq!(reloaded.complete_radius_m, 50.0);
	}

	#[test]
	fn missing_fields_fall_back_to_defaults() {
		// An older config file missing newer knobs still loads.
		let parsed: CoreConfig = serde_json::from_str(r#"{"create_radius_m": 100.0}"#).unwrap();
		assert_eq!(parsed.create_radius_m, 100.0);
		assert_eq!(parsed.min_description_len, 3);
	}
}
