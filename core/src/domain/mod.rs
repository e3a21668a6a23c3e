//! Domain types: pins, geography, device location, notifications.

pub mod geo;
pub mod location;
pub mod notification;
pub mod pin;

pub use geo::{distance_meters, GeoPoint};
pub use location::{LocationUpdate, PermissionState, UserLocation};
pub use notification::{Notification, NotificationKind};
pub use pin::{Pin, PinDraft, PinStatus, TtlClass};
