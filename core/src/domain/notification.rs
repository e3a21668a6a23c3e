//! Notifications addressed to a single user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the shell should style a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
	Info,
	Success,
	Warning,
}

/// A persisted message about a lifecycle event of interest to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
	pub id: Uuid,
	pub recipient: Uuid,
	pub kind: NotificationKind,
	pub message: String,
	pub created_at: DateTime<Utc>,
	pub read: bool,
}

impl Notification {
	pub fn new(recipient: Uuid, kind: NotificationKind, message: impl Into<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			recipient,
			kind,
			message: message.into(),
			created_at: Utc::now(),
			read: false,
		}
	}
}
