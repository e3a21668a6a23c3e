//! A live map session: baseline load, change-feed pump, location watch and
//! notification plumbing, torn down as one scope.
//!
//! The feed subscription and the location watch are process-wide external
//! resources with manual start/stop. Owning them here, and aborting the
//! pumps on `shutdown` (or drop), guarantees release on every exit path
//! instead of leaking timers and sockets across navigation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::domain::LocationUpdate;
use crate::error::CoreError;
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::feed::PinChange;
use crate::infrastructure::Platform;
use crate::lifecycle::PinLifecycle;
use crate::services::controller::MapInteractionController;
use crate::services::notifier::{NotificationBridge, NotificationCenter};
use crate::store::PinStore;

pub struct MapSession {
	user: Uuid,
	store: Arc<PinStore>,
	lifecycle: Arc<PinLifecycle>,
	controller: Arc<MapInteractionController>,
	notifications: Arc<NotificationCenter>,
	events: Arc<EventBus>,
	tasks: Vec<JoinHandle<()>>,
}

impl MapSession {
	/// Bring the session up: load the baseline, open the feed and the
	/// location watch, start the pumps. Requires a signed-in user.
	pub async fn start(config: CoreConfig, platform: Platform) -> Result<Self, CoreError> {
		let user = platform
			.session
			.current_user()
			.ok_or(CoreError::NotAuthenticated)?;

		let events = Arc::new(EventBus::default());
		let store = Arc::new(PinStore::new(platform.pins.clone()));
		let lifecycle = Arc::new(PinLifecycle::new(
			config.clone(),
			platform.clone(),
			store.clone(),
			events.clone(),
		));
		let controller = Arc::new(MapInteractionController::new(
			config.clone(),
			platform.clone(),
			lifecycle.clone(),
			store.clone(),
			events.clone(),
		));
		let notifications = Arc::new(NotificationCenter::new(
			user,
			platform.notifications.clone(),
			platform.alerts.clone(),
		));

		// Baseline first; the feed layers on top and reconciliation is
		// order-independent, so events racing this load are safe.
		let count = store.load_active(Utc::now()).await?;
		events.emit(Event::MirrorLoaded { count });

		let mut tasks = Vec::new();

		let bridge = NotificationBridge::new(user, platform.clone());
		tasks.push(tokio::spawn(bridge.run(events.subscribe())));

		let feed_rx = platform.feed.subscribe().await?;
		tasks.push(tokio::spawn(Self::pump_feed(
			feed_rx,
			store.clone(),
			events.clone(),
		)));

		if let Err(err) = notifications.load().await {
			warn!("notification history unavailable: {err}");
		}
		let note_rx = platform.feed.subscribe_notifications(user).await?;
		tasks.push(tokio::spawn(NotificationCenter::pump(
			notifications.clone(),
			note_rx,
		)));

		let location_rx = platform.location.watch().await;
		tasks.push(tokio::spawn(Self::pump_location(
			location_rx,
			controller.clone(),
		)));

		events.emit(Event::SessionStarted);
		info!(%user, pins = count, "map session started");

		Ok(Self {
			user,
			store,
			lifecycle,
			controller,
			notifications,
			events,
			tasks,
		})
	}

	async fn pump_feed(
		mut raw_events: mpsc::UnboundedReceiver<Value>,
		store: Arc<PinStore>,
		events: Arc<EventBus>,
	) {
		while let Some(raw) = raw_events.recv().await {
			match PinChange::from_value(raw) {
				Ok(PinChange::Insert(pin)) => {
					store.apply_insert(pin.clone()).await;
					events.emit(Event::RemoteInsert { pin });
				}
				Ok(PinChange::Update(pin)) => {
					let previous = store.apply_update(pin.clone()).await;
					events.emit(Event::RemoteUpdate { pin, previous });
				}
				Ok(PinChange::Delete { id }) => {
					store.apply_delete(id).await;
					events.emit(Event::RemoteDelete { pin_id: id });
				}
				Err(err) => warn!("dropping malformed feed event: {err}"),
			}
		}
		debug!("pin change feed closed");
	}

	async fn pump_location(
		mut updates: mpsc::UnboundedReceiver<LocationUpdate>,
		controller: Arc<MapInteractionController>,
	) {
		while let Some(update) = updates.recv().await {
			controller.on_location_update(update);
		}
		debug!("location watch closed");
	}

	pub fn user(&self) -> Uuid {
		self.user
	}

	pub fn store(&self) -> &Arc<PinStore> {
		&self.store
	}

	pub fn lifecycle(&self) -> &Arc<PinLifecycle> {
		&self.lifecycle
	}

	pub fn controller(&self) -> &Arc<MapInteractionController> {
		&self.controller
	}

	pub fn notifications(&self) -> &Arc<NotificationCenter> {
		&self.notifications
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// Tear the session down: stop the pumps, which drops the feed and
	/// watch receivers and thereby closes the underlying subscriptions.
	pub fn shutdown(&mut self) {
		if self.tasks.is_empty() {
			return;
		}
		self.events.emit(Event::SessionEnded);
		for task in self.tasks.drain(..) {
			task.abort();
		}
		info!(user = %self.user, "map session shut down");
	}
}

impl Drop for MapSession {
	fn drop(&mut self) {
		self.shutdown();
	}
}
