//! KindBite coordination core.
//!
//! KindBite connects people who spot hunger ("spotters") with nearby people
//! who can donate food ("donors") over a live map. The hosted platform owns
//! persistence, auth, realtime delivery, blob storage and push; this crate
//! owns everything with design content in between:
//!
//! - the pin lifecycle state machine (open, locked, completed) and its
//!   authorization rules,
//! - the proximity gates on creation and delivery completion,
//! - the optimistic local mirror reconciled against the platform's change
//!   feed,
//! - the interaction/session plumbing that binds gestures and device
//!   resources to the above.
//!
//! A presentation shell creates a [`services::MapSession`] on view mount,
//! drives the [`services::MapInteractionController`] from its input events,
//! re-renders on [`infrastructure::events::Event`]s, and drops the session
//! on unmount.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod lifecycle;
pub mod proximity;
pub mod services;
pub mod store;
pub mod testing;

pub use config::CoreConfig;
pub use error::{CoreError, ErrorKind};
pub use infrastructure::Platform;
pub use services::{MapInteractionController, MapSession, Mode, TapOutcome};
