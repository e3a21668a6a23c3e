//! In-memory collaborators for tests and local development.
//!
//! [`MemoryHub`] stands in for the hosted platform: one hub is shared by
//! any number of simulated clients, its conditional updates are atomic
//! under a single lock (so exactly one caller wins a raced claim), and
//! every accepted write fans out on the change feed exactly like the real
//! store's subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{GeoPoint, LocationUpdate, Notification, Pin, PinStatus};
use crate::infrastructure::backend::{BackendError, NotificationStore, PinBackend};
use crate::infrastructure::collaborators::{
	AlertError, AlertSink, BlobError, BlobStore, CameraDevice, CameraError, CaptureStream,
	LedgerError, LocationSource, PushError, PushSender, ReputationLedger, SessionProvider,
};
use crate::infrastructure::feed::{PinChange, PinFeedSource};
use crate::infrastructure::Platform;

/// The shared in-memory platform.
pub struct MemoryHub {
	pins: Mutex<HashMap<Uuid, Pin>>,
	notifications: Mutex<Vec<Notification>>,
	feed_subs: Mutex<Vec<mpsc::UnboundedSender<Value>>>,
	note_subs: Mutex<Vec<(Uuid, mpsc::UnboundedSender<Notification>)>>,
	pushes: Mutex<Vec<(Uuid, String)>>,
	broadcasts: Mutex<Vec<(GeoPoint, String)>>,
	ledger: Mutex<Vec<(Uuid, i32, String)>>,
	uploads: Mutex<Vec<(Uuid, Uuid)>>,
	fail_next_insert: AtomicBool,
}

impl MemoryHub {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			pins: Mutex::new(HashMap::new()),
			notifications: Mutex::new(Vec::new()),
			feed_subs: Mutex::new(Vec::new()),
			note_subs: Mutex::new(Vec::new()),
			pushes: Mutex::new(Vec::new()),
			broadcasts: Mutex::new(Vec::new()),
			ledger: Mutex::new(Vec::new()),
			uploads: Mutex::new(Vec::new()),
			fail_next_insert: AtomicBool::new(false),
		})
	}

	/// A platform for one signed-in client with default device fakes.
	pub fn client(self: &Arc<Self>, user: Uuid) -> Platform {
		self.client_with(
			user,
			ScriptedLocation::new(Vec::new()),
			FakeCamera::new(),
			RecordingAlerts::new(),
		)
	}

	/// A platform for one signed-in client with explicit device fakes.
	pub fn client_with(
		self: &Arc<Self>,
		user: Uuid,
		location: Arc<ScriptedLocation>,
		camera: Arc<FakeCamera>,
		alerts: Arc<RecordingAlerts>,
	) -> Platform {
		Platform {
			session: Arc::new(FixedSession(Some(user))),
			pins: self.clone(),
			notifications: self.clone(),
			feed: self.clone(),
			blobs: self.clone(),
			push: self.clone(),
			reputation: self.clone(),
			location,
			camera,
			alerts,
		}
	}

	pub fn pin_backend(self: &Arc<Self>) -> Arc<dyn PinBackend> {
		self.clone()
	}

	/// Insert a row directly, bypassing the feed. For seeding fixtures.
	pub fn seed_pin(&self, pin: Pin) {
		self.pins.lock().unwrap().insert(pin.id, pin);
	}

	/// Shift a lock timestamp into the past, as if the claim were old.
	pub fn backdate_lock(&self, id: Uuid, by: Duration) {
		let mut pins = self.pins.lock().unwrap();
		if let Some(pin) = pins.get_mut(&id) {
			pin.locked_at = pin.locked_at.map(|at| at - by);
		}
	}

	pub fn pin(&self, id: Uuid) -> Option<Pin> {
		self.pins.lock().unwrap().get(&id).cloned()
	}

	pub fn pin_count(&self) -> usize {
		self.pins.lock().unwrap().len()
	}

	/// Make the next `insert` fail with a transient error.
	pub fn fail_next_insert(&self) {
		self.fail_next_insert.store(true, Ordering::SeqCst);
	}

	pub fn pushes(&self) -> Vec<(Uuid, String)> {
		self.pushes.lock().unwrap().clone()
	}

	pub fn broadcasts(&self) -> Vec<(GeoPoint, String)> {
		self.broadcasts.lock().unwrap().clone()
	}

	pub fn ledger_entries(&self) -> Vec<(Uuid, i32, String)> {
		self.ledger.lock().unwrap().clone()
	}

	pub fn notification_rows(&self) -> Vec<Notification> {
		self.notifications.lock().unwrap().clone()
	}

	pub fn upload_count(&self) -> usize {
		self.uploads.lock().unwrap().len()
	}

	fn emit_feed(&self, change: PinChange) {
		let raw = serde_json::to_value(&change).expect("feed payload serializes");
		self.emit_raw(raw);
	}

	/// Deliver an arbitrary payload on the change feed, exactly as the
	/// platform would. Lets tests exercise boundary validation and delivery
	/// reordering.
	pub fn emit_raw(&self, raw: Value) {
		self.feed_subs
			.lock()
			.unwrap()
			.retain(|tx| tx.send(raw.clone()).is_ok());
	}

	fn emit_notification(&self, notification: &Notification) {
		self.note_subs.lock().unwrap().retain(|(recipient, tx)| {
			if *recipient == notification.recipient {
				tx.send(notification.clone()).is_ok()
			} else {
				true
			}
		});
	}
}

#[async_trait]
impl PinBackend for MemoryHub {
	async fn load_active(&self, now: DateTime<Utc>) -> Result<Vec<Pin>, BackendError> {
		let pins = self.pins.lock().unwrap();
		let mut active: Vec<Pin> = pins
			.values()
			.filter(|pin| pin.expires_at > now)
			.cloned()
			.collect();
		active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(active)
	}

	async fn insert(&self, pin: &Pin) -> Result<(), BackendError> {
		if self.fail_next_insert.swap(false, Ordering::SeqCst) {
			return Err(BackendError::Unavailable("injected fault".into()));
		}
		self.pins.lock().unwrap().insert(pin.id, pin.clone());
		self.emit_feed(PinChange::Insert(pin.clone()));
		Ok(())
	}

	async fn update_position(
		&self,
		id: Uuid,
		actor: Uuid,
		to: GeoPoint,
	) -> Result<Pin, BackendError> {
		let updated = {
			let mut pins = self.pins.lock().unwrap();
			let pin = pins.get_mut(&id).ok_or(BackendError::NotFound)?;
			if pin.created_by != actor {
				return Err(BackendError::Forbidden(
					"only the reporter may move a pin".into(),
				));
			}
			if pin.status != PinStatus::Open {
				return Err(BackendError::Conflict {
					current: Some(pin.clone()),
				});
			}
			pin.position = to;
			pin.clone()
		};
		self.emit_feed(PinChange::Update(updated.clone()));
		Ok(updated)
	}

	async fn try_lock(
		&self,
		id: Uuid,
		actor: Uuid,
		at: DateTime<Utc>,
	) -> Result<Pin, BackendError> {
		let updated = {
			let mut pins = self.pins.lock().unwrap();
			let pin = pins.get_mut(&id).ok_or(BackendError::NotFound)?;
			if pin.created_by == actor {
				return Err(BackendError::Forbidden(
					"a reporter cannot claim their own pin".into(),
				));
			}
			if pin.status != PinStatus::Open {
				return Err(BackendError::Conflict {
					current: Some(pin.clone()),
				});
			}
			pin.status = PinStatus::Locked;
			pin.locked_by = Some(actor);
			pin.locked_at = Some(at);
			pin.clone()
		};
		self.emit_feed(PinChange::Update(updated.clone()));
		Ok(updated)
	}

	async fn release_lock(&self, id: Uuid, actor: Uuid) -> Result<Pin, BackendError> {
		let updated = {
			let mut pins = self.pins.lock().unwrap();
			let pin = pins.get_mut(&id).ok_or(BackendError::NotFound)?;
			if pin.status != PinStatus::Locked {
				return Err(BackendError::Conflict {
					current: Some(pin.clone()),
				});
			}
			if pin.locked_by != Some(actor) {
				return Err(BackendError::Forbidden(
					"only the lock holder may release".into(),
				));
			}
			pin.status = PinStatus::Open;
			pin.locked_by = None;
			pin.locked_at = None;
			pin.clone()
		};
		self.emit_feed(PinChange::Update(updated.clone()));
		Ok(updated)
	}

	async fn complete(&self, id: Uuid, actor: Uuid, proof_ref: &str) -> Result<Pin, BackendError> {
		let updated = {
			let mut pins = self.pins.lock().unwrap();
			let pin = pins.get_mut(&id).ok_or(BackendError::NotFound)?;
			if pin.status != PinStatus::Locked {
				return Err(BackendError::Conflict {
					current: Some(pin.clone()),
				});
			}
			if pin.locked_by != Some(actor) {
				return Err(BackendError::Forbidden(
					"only the lock holder may complete".into(),
				));
			}
			pin.status = PinStatus::Completed;
			pin.proof_ref = Some(proof_ref.to_string());
			pin.clone()
		};
		self.emit_feed(PinChange::Update(updated.clone()));
		Ok(updated)
	}

	async fn delete(&self, id: Uuid, actor: Uuid) -> Result<(), BackendError> {
		{
			let mut pins = self.pins.lock().unwrap();
			let pin = pins.get(&id).ok_or(BackendError::NotFound)?;
			if pin.created_by != actor {
				return Err(BackendError::Forbidden(
					"only the reporter may delete a pin".into(),
				));
			}
			if pin.status != PinStatus::Open {
				return Err(BackendError::Conflict {
					current: Some(pin.clone()),
				});
			}
			pins.remove(&id);
		}
		self.emit_feed(PinChange::Delete { id });
		Ok(())
	}
}

#[async_trait]
impl NotificationStore for MemoryHub {
	async fn insert(&self, notification: &Notification) -> Result<(), BackendError> {
		self.notifications.lock().unwrap().push(notification.clone());
		self.emit_notification(notification);
		Ok(())
	}

	async fn recent(
		&self,
		recipient: Uuid,
		limit: usize,
	) -> Result<Vec<Notification>, BackendError> {
		let rows = self.notifications.lock().unwrap();
		let mut mine: Vec<Notification> = rows
			.iter()
			.filter(|n| n.recipient == recipient)
			.cloned()
			.collect();
		mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		mine.truncate(limit);
		Ok(mine)
	}

	async fn mark_all_read(&self, recipient: Uuid) -> Result<(), BackendError> {
		for row in self.notifications.lock().unwrap().iter_mut() {
			if row.recipient == recipient {
				row.read = true;
			}
		}
		Ok(())
	}
}

#[async_trait]
impl PinFeedSource for MemoryHub {
	async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Value>, BackendError> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.feed_subs.lock().unwrap().push(tx);
		Ok(rx)
	}

	async fn subscribe_notifications(
		&self,
		recipient: Uuid,
	) -> Result<mpsc::UnboundedReceiver<Notification>, BackendError> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.note_subs.lock().unwrap().push((recipient, tx));
		Ok(rx)
	}
}

#[async_trait]
impl BlobStore for MemoryHub {
	async fn upload_proof(
		&self,
		user: Uuid,
		pin: Uuid,
		at: DateTime<Utc>,
		_jpeg: Vec<u8>,
	) -> Result<String, BlobError> {
		self.uploads.lock().unwrap().push((user, pin));
		Ok(format!("proofs/{user}/{pin}/{}.jpg", at.timestamp()))
	}
}

#[async_trait]
impl PushSender for MemoryHub {
	async fn send(&self, recipient: Uuid, message: &str) -> Result<(), PushError> {
		self.pushes
			.lock()
			.unwrap()
			.push((recipient, message.to_string()));
		Ok(())
	}

	async fn broadcast_nearby(&self, origin: GeoPoint, message: &str) -> Result<(), PushError> {
		self.broadcasts
			.lock()
			.unwrap()
			.push((origin, message.to_string()));
		Ok(())
	}
}

#[async_trait]
impl ReputationLedger for MemoryHub {
	async fn adjust(&self, user: Uuid, delta: i32, reason: &str) -> Result<(), LedgerError> {
		self.ledger
			.lock()
			.unwrap()
			.push((user, delta, reason.to_string()));
		Ok(())
	}
}

/// A fixed identity, or signed out when `None`.
pub struct FixedSession(pub Option<Uuid>);

impl SessionProvider for FixedSession {
	fn current_user(&self) -> Option<Uuid> {
		self.0
	}
}

/// Replays a queue of location updates, then idles until the session drops
/// the receiver.
pub struct ScriptedLocation {
	updates: Mutex<Vec<LocationUpdate>>,
}

impl ScriptedLocation {
	pub fn new(updates: Vec<LocationUpdate>) -> Arc<Self> {
		Arc::new(Self {
			updates: Mutex::new(updates),
		})
	}

	/// A watch that immediately reports one fixed position.
	pub fn fixed(point: GeoPoint) -> Arc<Self> {
		Self::new(vec![LocationUpdate::Sample {
			point,
			at: Utc::now(),
		}])
	}
}

#[async_trait]
impl LocationSource for ScriptedLocation {
	async fn watch(&self) -> mpsc::UnboundedReceiver<LocationUpdate> {
		let (tx, rx) = mpsc::unbounded_channel();
		for update in self.updates.lock().unwrap().drain(..) {
			let _ = tx.send(update);
		}
		// Keep the watch open until the receiver is dropped.
		tokio::spawn(async move { tx.closed().await });
		rx
	}
}

/// A camera that serves a canned frame and records whether its stream was
/// released.
pub struct FakeCamera {
	frame: Vec<u8>,
	stopped: Arc<AtomicBool>,
	fail_start: bool,
	fail_grab: bool,
}

impl FakeCamera {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			frame: b"jpeg-bytes".to_vec(),
			stopped: Arc::new(AtomicBool::new(false)),
			fail_start: false,
			fail_grab: false,
		})
	}

	pub fn denied() -> Arc<Self> {
		Arc::new(Self {
			frame: Vec::new(),
			stopped: Arc::new(AtomicBool::new(false)),
			fail_start: true,
			fail_grab: false,
		})
	}

	pub fn failing_capture() -> Arc<Self> {
		Arc::new(Self {
			frame: Vec::new(),
			stopped: Arc::new(AtomicBool::new(false)),
			fail_start: false,
			fail_grab: true,
		})
	}

	/// Whether the last started stream has been stopped.
	pub fn stream_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}
}

struct FakeStream {
	frame: Vec<u8>,
	stopped: Arc<AtomicBool>,
	fail_grab: bool,
}

#[async_trait]
impl CaptureStream for FakeStream {
	async fn grab_frame(&mut self) -> Result<Vec<u8>, CameraError> {
		if self.fail_grab {
			return Err(CameraError::Capture("sensor fault".into()));
		}
		Ok(self.frame.clone())
	}

	fn stop(&mut self) {
		self.stopped.store(true, Ordering::SeqCst);
	}
}

#[async_trait]
impl CameraDevice for FakeCamera {
	async fn start(&self) -> Result<Box<dyn CaptureStream>, CameraError> {
		if self.fail_start {
			return Err(CameraError::Access("permission denied".into()));
		}
		self.stopped.store(false, Ordering::SeqCst);
		Ok(Box::new(FakeStream {
			frame: self.frame.clone(),
			stopped: self.stopped.clone(),
			fail_grab: self.fail_grab,
		}))
	}
}

/// Records alert messages instead of playing them.
pub struct RecordingAlerts {
	messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			messages: Mutex::new(Vec::new()),
		})
	}

	pub fn messages(&self) -> Vec<String> {
		self.messages.lock().unwrap().clone()
	}
}

impl AlertSink for RecordingAlerts {
	fn alert(&self, message: &str) -> Result<(), AlertError> {
		self.messages.lock().unwrap().push(message.to_string());
		Ok(())
	}
}
