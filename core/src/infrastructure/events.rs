//! Event bus for decoupled communication between the core services.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{GeoPoint, Pin};

/// Pin lifecycle and session events.
///
/// `Pin*` variants describe transitions performed by this client;
/// `Remote*` variants describe changes reconciled from the change feed.
/// The shell re-renders on any of them.
#[derive(Debug, Clone)]
pub enum Event {
	/// The session came up: baseline loaded, feed and watch running.
	SessionStarted,

	/// The session is tearing down.
	SessionEnded,

	/// The initial load (or a reconnect baseline) finished.
	MirrorLoaded { count: usize },

	/// The first location fix arrived; the shell should center the map once.
	RecenterOnUser { at: GeoPoint },

	PinCreated {
		pin_id: Uuid,
		created_by: Uuid,
		position: GeoPoint,
	},

	PinMoved { pin_id: Uuid },

	PinDeleted { pin_id: Uuid },

	PinLocked {
		pin_id: Uuid,
		locked_by: Uuid,
		created_by: Uuid,
	},

	LockReleased {
		pin_id: Uuid,
		released_by: Uuid,
		penalized: bool,
	},

	PinCompleted {
		pin_id: Uuid,
		completed_by: Uuid,
		created_by: Uuid,
	},

	RemoteInsert {
		pin: Pin,
	},

	RemoteUpdate {
		pin: Pin,
		previous: Option<Pin>,
	},

	RemoteDelete {
		pin_id: Uuid,
	},
}

/// Event bus for broadcasting events.
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// Create a new event bus with specified capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event. Send errors (no receivers) are ignored.
	pub fn emit(&self, event: Event) {
		let _ = self.sender.send(event);
	}

	/// Subscribe to events.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
