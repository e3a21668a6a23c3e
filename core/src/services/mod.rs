//! Session-scoped services: interaction handling, notifications, lifecycle
//! of the live subscriptions.

pub mod controller;
pub mod notifier;
pub mod session;

pub use controller::{MapInteractionController, Mode, TapOutcome};
pub use notifier::{NotificationBridge, NotificationCenter};
pub use session::MapSession;
