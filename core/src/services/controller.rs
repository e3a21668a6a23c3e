//! Binds map gestures to the proximity gate and the pin lifecycle, and owns
//! the transient per-session UI state: the draft composer, the camera
//! overlay, the error banner, drag tracking and the center-once flag.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::domain::{
	GeoPoint, LocationUpdate, PermissionState, Pin, PinDraft, TtlClass, UserLocation,
};
use crate::error::CoreError;
use crate::infrastructure::collaborators::{CameraError, CameraGuard};
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::Platform;
use crate::lifecycle::PinLifecycle;
use crate::store::PinStore;

/// Which side of the exchange the user is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Spotter,
	Donor,
}

/// What a map tap resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
	/// Wrong mode, a drag in progress, or the tap trailing a drag.
	Ignored,
	/// Gate rejection; a banner was raised.
	Rejected,
	/// The draft composer opened at the tapped point.
	DraftOpened { at: GeoPoint },
}

/// A transient error message with an absolute dismissal time.
#[derive(Debug, Clone)]
struct Banner {
	message: String,
	until: DateTime<Utc>,
}

struct ControllerState {
	mode: Mode,
	location: Option<UserLocation>,
	permission: PermissionState,
	has_centered: bool,
	draft_at: Option<GeoPoint>,
	banner: Option<Banner>,
	dragging: Option<Uuid>,
	suppress_next_tap: bool,
	capture: Option<(Uuid, CameraGuard)>,
}

pub struct MapInteractionController {
	config: CoreConfig,
	platform: Platform,
	lifecycle: Arc<PinLifecycle>,
	store: Arc<PinStore>,
	events: Arc<EventBus>,
	state: Mutex<ControllerState>,
}

impl MapInteractionController {
	pub fn new(
		config: CoreConfig,
		platform: Platform,
		lifecycle: Arc<PinLifecycle>,
		store: Arc<PinStore>,
		events: Arc<EventBus>,
	) -> Self {
		Self {
			config,
			platform,
			lifecycle,
			store,
			events,
			state: Mutex::new(ControllerState {
				mode: Mode::Spotter,
				location: None,
				permission: PermissionState::Unknown,
				has_centered: false,
				draft_at: None,
				banner: None,
				dragging: None,
				suppress_next_tap: false,
				capture: None,
			}),
		}
	}

	pub fn mode(&self) -> Mode {
		self.state.lock().unwrap().mode
	}

	pub fn set_mode(&self, mode: Mode) {
		self.state.lock().unwrap().mode = mode;
	}

	pub fn location(&self) -> Option<UserLocation> {
		self.state.lock().unwrap().location
	}

	/// Where the shell should center the map: the user once there is a fix,
	/// the configured fallback before that.
	pub fn map_center(&self) -> GeoPoint {
		self.state
			.lock()
			.unwrap()
			.location
			.map(|user| user.point)
			.unwrap_or(self.config.fallback_center)
	}

	pub fn permission(&self) -> PermissionState {
		self.state.lock().unwrap().permission
	}

	/// Feed one message from the device location watch into the session.
	pub fn on_location_update(&self, update: LocationUpdate) {
		let mut state = self.state.lock().unwrap();
		match update {
			LocationUpdate::Sample { point, at } => {
				state.location = Some(UserLocation {
					point,
					acquired_at: at,
				});
				state.permission = PermissionState::Granted;
				if !state.has_centered {
					state.has_centered = true;
					self.events.emit(Event::RecenterOnUser { at: point });
				}
			}
			LocationUpdate::Denied => {
				// A denial only blocks the session while we have never had a
				// fix; a watch hiccup after one does not tear the map down.
				if state.location.is_none() {
					state.permission = PermissionState::Denied;
				}
			}
		}
	}

	/// A tap on the map itself (not a marker or control).
	pub fn handle_map_tap(&self, at: GeoPoint) -> TapOutcome {
		let mut state = self.state.lock().unwrap();

		if state.suppress_next_tap {
			// The synthetic click that trails a drag gesture.
			state.suppress_next_tap = false;
			return TapOutcome::Ignored;
		}
		if state.mode != Mode::Spotter || state.dragging.is_some() {
			return TapOutcome::Ignored;
		}

		let user = state.location;
		match self.lifecycle.gate().check_create(user.as_ref(), at) {
			Ok(_) => {
				state.draft_at = Some(at);
				TapOutcome::DraftOpened { at }
			}
			Err(err) => {
				debug!("tap rejected: {err}");
				Self::raise_banner(&self.config, &mut state, err.to_string());
				TapOutcome::Rejected
			}
		}
	}

	pub fn draft_position(&self) -> Option<GeoPoint> {
		self.state.lock().unwrap().draft_at
	}

	pub fn cancel_draft(&self) {
		self.state.lock().unwrap().draft_at = None;
	}

	/// Submit the open draft. Validation failures surface inline and leave
	/// the composer open.
	pub async fn submit_draft(
		&self,
		description: &str,
		people_count: u8,
		ttl: TtlClass,
	) -> Result<Pin, CoreError> {
		let (position, user) = {
			let state = self.state.lock().unwrap();
			(state.draft_at, state.location)
		};
		let position = position.ok_or(CoreError::MissingDraftLocation)?;

		let draft = PinDraft {
			position,
			description: description.to_string(),
			people_count,
			ttl,
		};
		let pin = self.lifecycle.create(draft, user.as_ref()).await?;
		self.state.lock().unwrap().draft_at = None;
		Ok(pin)
	}

	pub fn drag_started(&self, pin_id: Uuid) {
		self.state.lock().unwrap().dragging = Some(pin_id);
	}

	/// The drag finished; the new coordinates are a move, never a create.
	pub async fn drag_ended(&self, pin_id: Uuid, to: GeoPoint) -> Result<Pin, CoreError> {
		let user = {
			let mut state = self.state.lock().unwrap();
			state.dragging = None;
			state.suppress_next_tap = true;
			state.location
		};
		let result = self.lifecycle.move_pin(pin_id, to, user.as_ref()).await;
		if let Err(err) = &result {
			self.banner_for(err);
		}
		result
	}

	/// Donor pressed the claim button in a pin popup.
	pub async fn request_lock(&self, pin_id: Uuid) -> Result<Pin, CoreError> {
		let result = self.lifecycle.lock(pin_id).await;
		if let Err(err) = &result {
			// "Already taken" must be visible, not a silent failure.
			self.banner_for(err);
		}
		result
	}

	pub async fn request_cancel(&self, pin_id: Uuid) -> Result<Pin, CoreError> {
		self.lifecycle.cancel(pin_id).await
	}

	pub async fn request_delete(&self, pin_id: Uuid) -> Result<(), CoreError> {
		self.lifecycle.delete(pin_id).await
	}

	/// Open the camera overlay for a delivery proof. The stream is held in a
	/// guard that releases the device on every exit path.
	pub async fn begin_completion(&self, pin_id: Uuid) -> Result<(), CoreError> {
		let stream = self.platform.camera.start().await?;
		let mut state = self.state.lock().unwrap();
		state.capture = Some((pin_id, CameraGuard::new(stream)));
		Ok(())
	}

	pub fn camera_active(&self) -> bool {
		self.state.lock().unwrap().capture.is_some()
	}

	/// Close the overlay without completing; the stream stops with the guard.
	pub fn close_completion(&self) {
		self.state.lock().unwrap().capture = None;
	}

	/// Grab the proof frame, release the camera, and run the completion
	/// transition from the current position.
	pub async fn confirm_completion(&self) -> Result<Pin, CoreError> {
		let (pin_id, mut guard) = self
			.state
			.lock()
			.unwrap()
			.capture
			.take()
			.ok_or_else(|| CameraError::Capture("no capture in progress".into()))?;

		// On a grab failure the guard drops here and stops the stream.
		let frame = guard.grab_frame().await?;
		guard.stop();

		let user = self.state.lock().unwrap().location;
		let result = self.lifecycle.complete(pin_id, user.as_ref(), frame).await;
		if let Err(err) = &result {
			self.banner_for(err);
		}
		result
	}

	/// Non-expired pins for rendering, newest first.
	pub async fn visible_pins(&self, now: DateTime<Utc>) -> Vec<Pin> {
		self.store.active(now).await
	}

	/// The current transient error message, if it has not aged out.
	pub fn visible_banner(&self, now: DateTime<Utc>) -> Option<String> {
		let mut state = self.state.lock().unwrap();
		match &state.banner {
			Some(banner) if banner.until > now => Some(banner.message.clone()),
			Some(_) => {
				state.banner = None;
				None
			}
			None => None,
		}
	}

	fn banner_for(&self, err: &CoreError) {
		let mut state = self.state.lock().unwrap();
		Self::raise_banner(&self.config, &mut state, err.to_string());
	}

	fn raise_banner(config: &CoreConfig, state: &mut ControllerState, message: String) {
		state.banner = Some(Banner {
			message,
			until: Utc::now() + config.banner_ttl(),
		});
	}
}
