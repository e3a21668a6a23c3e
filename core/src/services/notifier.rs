//! Notification fan-out and the in-app notification center.
//!
//! The bridge reacts to lifecycle transitions performed by this client and
//! relays them outward: a persisted notification plus a best-effort push to
//! the counterpart. The center mirrors the current user's notification list
//! for the bell, kept live by the platform's per-user subscription.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Notification, NotificationKind};
use crate::infrastructure::backend::{BackendError, NotificationStore};
use crate::infrastructure::collaborators::AlertSink;
use crate::infrastructure::events::Event;
use crate::infrastructure::Platform;

pub struct NotificationBridge {
	me: Uuid,
	platform: Platform,
}

impl NotificationBridge {
	pub fn new(me: Uuid, platform: Platform) -> Self {
		Self { me, platform }
	}

	pub async fn run(self, mut events: broadcast::Receiver<Event>) {
		loop {
			match events.recv().await {
				Ok(event) => self.handle_event(event).await,
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(skipped, "notification bridge lagged behind the event bus");
				}
				Err(broadcast::error::RecvError::Closed) => break,
			}
		}
		debug!("notification bridge stopped");
	}

	pub async fn handle_event(&self, event: Event) {
		match event {
			Event::PinCreated {
				created_by,
				position,
				..
			} if created_by == self.me => {
				// The platform picks which donors count as nearby.
				if let Err(err) = self
					.platform
					.push
					.broadcast_nearby(position, "Someone nearby needs food")
					.await
				{
					warn!("nearby-donor broadcast failed: {err}");
				}
			}
			Event::PinLocked {
				locked_by,
				created_by,
				..
			} if locked_by == self.me => {
				self.notify(
					created_by,
					NotificationKind::Info,
					"A donor is responding to your report",
				)
				.await;
			}
			Event::PinCompleted {
				completed_by,
				created_by,
				..
			} if completed_by == self.me => {
				self.notify(
					created_by,
					NotificationKind::Success,
					"Food delivered, your report was fulfilled",
				)
				.await;
			}
			_ => {}
		}
	}

	/// Persist for the bell, then push. Both are best-effort relative to the
	/// transition that triggered them.
	async fn notify(&self, recipient: Uuid, kind: NotificationKind, message: &str) {
		let notification = Notification::new(recipient, kind, message);
		if let Err(err) = self.platform.notifications.insert(&notification).await {
			warn!(%recipient, "notification insert failed: {err}");
		}
		if let Err(err) = self.platform.push.send(recipient, message).await {
			warn!(%recipient, "push delivery failed: {err}");
		}
	}
}

/// The current user's notification list, as the bell renders it.
pub struct NotificationCenter {
	me: Uuid,
	store: Arc<dyn NotificationStore>,
	alerts: Arc<dyn AlertSink>,
	items: RwLock<Vec<Notification>>,
}

const BELL_LIMIT: usize = 20;

impl NotificationCenter {
	pub fn new(me: Uuid, store: Arc<dyn NotificationStore>, alerts: Arc<dyn AlertSink>) -> Self {
		Self {
			me,
			store,
			alerts,
			items: RwLock::new(Vec::new()),
		}
	}

	/// Fetch the recent history, newest first.
	pub async fn load(&self) -> Result<(), BackendError> {
		let recent = self.store.recent(self.me, BELL_LIMIT).await?;
		*self.items.write().await = recent;
		Ok(())
	}

	pub async fn recent(&self) -> Vec<Notification> {
		self.items.read().await.clone()
	}

	pub async fn unread_count(&self) -> usize {
		self.items.read().await.iter().filter(|n| !n.read).count()
	}

	/// Opening the bell marks everything read, locally and in the store.
	pub async fn mark_all_read(&self) -> Result<(), BackendError> {
		if self.unread_count().await == 0 {
			return Ok(());
		}
		self.store.mark_all_read(self.me).await?;
		for item in self.items.write().await.iter_mut() {
			item.read = true;
		}
		Ok(())
	}

	/// Consume live inserts from the platform. An incoming notification
	/// lands at the top of the list and triggers a local alert; alert
	/// failure never blocks the list update.
	pub async fn pump(self: Arc<Self>, mut incoming: mpsc::UnboundedReceiver<Notification>) {
		while let Some(notification) = incoming.recv().await {
			info!(id = %notification.id, "notification received");
			if let Err(err) = self.alerts.alert(&notification.message) {
				debug!("alert playback failed: {err}");
			}
			let mut items = self.items.write().await;
			items.insert(0, notification);
			items.truncate(BELL_LIMIT);
		}
		debug!("notification subscription closed");
	}
}
