//! Capability contracts for the device and the hosted platform.
//!
//! Everything here is consumed, never implemented for real in this crate;
//! `crate::testing` carries in-memory versions for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{GeoPoint, LocationUpdate};

/// Current authenticated identity.
pub trait SessionProvider: Send + Sync {
	fn current_user(&self) -> Option<Uuid>;
}

#[derive(Error, Debug)]
pub enum BlobError {
	#[error("upload failed: {0}")]
	Upload(String),
}

/// Image storage for delivery proofs.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// Store a proof image keyed by user, pin and timestamp; returns a
	/// retrievable reference.
	async fn upload_proof(
		&self,
		user: Uuid,
		pin: Uuid,
		at: DateTime<Utc>,
		jpeg: Vec<u8>,
	) -> Result<String, BlobError>;
}

#[derive(Error, Debug)]
pub enum PushError {
	#[error("push delivery failed: {0}")]
	Delivery(String),
}

/// Best-effort push delivery to a user's device.
#[async_trait]
pub trait PushSender: Send + Sync {
	async fn send(&self, recipient: Uuid, message: &str) -> Result<(), PushError>;

	/// Fan out to donors near a point; the platform picks the audience.
	async fn broadcast_nearby(&self, origin: GeoPoint, message: &str) -> Result<(), PushError>;
}

#[derive(Error, Debug)]
pub enum LedgerError {
	#[error("trust-score adjustment failed: {0}")]
	Adjustment(String),
}

/// Trust-score ledger. Deltas are applied atomically by the collaborator;
/// callers fire and forget.
#[async_trait]
pub trait ReputationLedger: Send + Sync {
	async fn adjust(&self, user: Uuid, delta: i32, reason: &str) -> Result<(), LedgerError>;
}

/// Device geolocation. Dropping the receiver stops the watch.
#[async_trait]
pub trait LocationSource: Send + Sync {
	async fn watch(&self) -> mpsc::UnboundedReceiver<LocationUpdate>;
}

#[derive(Error, Debug)]
pub enum CameraError {
	#[error("could not access camera: {0}")]
	Access(String),
	#[error("frame capture failed: {0}")]
	Capture(String),
}

/// An open capture stream. `stop` releases the device; wrap the stream in a
/// [`CameraGuard`] so release happens on every exit path.
#[async_trait]
pub trait CaptureStream: Send {
	/// Grab the current frame as an encoded image.
	async fn grab_frame(&mut self) -> Result<Vec<u8>, CameraError>;

	/// Release the underlying device. Idempotent.
	fn stop(&mut self);
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
	async fn start(&self) -> Result<Box<dyn CaptureStream>, CameraError>;
}

/// Scoped ownership of a capture stream: stops it when dropped.
pub struct CameraGuard {
	stream: Option<Box<dyn CaptureStream>>,
}

impl CameraGuard {
	pub fn new(stream: Box<dyn CaptureStream>) -> Self {
		Self {
			stream: Some(stream),
		}
	}

	pub async fn grab_frame(&mut self) -> Result<Vec<u8>, CameraError> {
		match self.stream.as_mut() {
			Some(stream) => stream.grab_frame().await,
			None => Err(CameraError::Capture("stream already stopped".into())),
		}
	}

	pub fn stop(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			stream.stop();
		}
	}
}

impl Drop for CameraGuard {
	fn drop(&mut self) {
		self.stop();
	}
}

#[derive(Error, Debug)]
pub enum AlertError {
	#[error("alert playback failed: {0}")]
	Playback(String),
}

/// Local sound/vibration alerts. Strictly best-effort: a failure here must
/// never block the action that triggered it.
pub trait AlertSink: Send + Sync {
	fn alert(&self, message: &str) -> Result<(), AlertError>;
}
