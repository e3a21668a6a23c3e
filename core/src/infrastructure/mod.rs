//! External collaborator contracts and the in-process event bus.

pub mod backend;
pub mod collaborators;
pub mod events;
pub mod feed;

use std::sync::Arc;

use backend::{NotificationStore, PinBackend};
use collaborators::{
	AlertSink, BlobStore, CameraDevice, LocationSource, PushSender, ReputationLedger,
	SessionProvider,
};
use feed::PinFeedSource;

/// The hosted platform and device capabilities, bundled for wiring.
#[derive(Clone)]
pub struct Platform {
	pub session: Arc<dyn SessionProvider>,
	pub pins: Arc<dyn PinBackend>,
	pub notifications: Arc<dyn NotificationStore>,
	pub feed: Arc<dyn PinFeedSource>,
	pub blobs: Arc<dyn BlobStore>,
	pub push: Arc<dyn PushSender>,
	pub reputation: Arc<dyn ReputationLedger>,
	pub location: Arc<dyn LocationSource>,
	pub camera: Arc<dyn CameraDevice>,
	pub alerts: Arc<dyn AlertSink>,
}
