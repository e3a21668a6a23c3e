//! Full-session flows: gesture handling, live reconciliation between
//! clients, notification delivery, camera scoping and teardown.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde_json::json;
use tracing_test::traced_test;
use uuid::Uuid;

use kb_core::config::CoreConfig;
use kb_core::domain::{GeoPoint, LocationUpdate, PermissionState, PinStatus, TtlClass};
use kb_core::error::ErrorKind;
use kb_core::services::{MapSession, TapOutcome};
use kb_core::testing::{FakeCamera, MemoryHub, RecordingAlerts, ScriptedLocation};

const HERE: GeoPoint = GeoPoint {
	lat: 23.8103,
	lng: 90.4125,
};

fn north_of(from: GeoPoint, meters: f64) -> GeoPoint {
	GeoPoint::new(from.lat + meters / 111_195.0, from.lng)
}

/// Poll until `check` passes or a second elapses.
async fn wait_until<F, Fut>(mut check: F)
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	for _ in 0..100 {
		if check().await {
			return;
		}
		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}
	panic!("condition not reached within 1s");
}

async fn spotter_session(
	hub: &Arc<MemoryHub>,
) -> (Uuid, MapSession, Arc<RecordingAlerts>) {
	let user = Uuid::new_v4();
	let alerts = RecordingAlerts::new();
	let platform = hub.client_with(
		user,
		ScriptedLocation::fixed(HERE),
		FakeCamera::new(),
		alerts.clone(),
	);
	let session = MapSession::start(CoreConfig::default(), platform)
		.await
		.unwrap();
	let controller = session.controller().clone();
	wait_until(|| {
		let controller = controller.clone();
		async move { controller.location().is_some() }
	})
	.await;
	(user, session, alerts)
}

async fn donor_session_at(hub: &Arc<MemoryHub>, point: GeoPoint) -> (Uuid, MapSession, Arc<FakeCamera>) {
	let user = Uuid::new_v4();
	let camera = FakeCamera::new();
	let platform = hub.client_with(
		user,
		ScriptedLocation::fixed(point),
		camera.clone(),
		RecordingAlerts::new(),
	);
	let session = MapSession::start(CoreConfig::default(), platform)
		.await
		.unwrap();
	let controller = session.controller().clone();
	wait_until(|| {
		let controller = controller.clone();
		async move { controller.location().is_some() }
	})
	.await;
	(user, session, camera)
}

#[tokio::test]
async fn tap_outside_radius_raises_a_banner_with_the_radius() {
	let hub = MemoryHub::new();
	let (_, session, _) = spotter_session(&hub).await;
	let controller = session.controller();

	let outcome = controller.handle_map_tap(north_of(HERE, 500.0));
	assert_eq!(outcome, TapOutcome::Rejected);

	let banner = controller.visible_banner(Utc::now()).unwrap();
	assert!(banner.contains("200m"), "banner should name the radius: {banner}");
	assert!(controller.draft_position().is_none());
}

#[tokio::test]
async fn tap_inside_radius_opens_a_draft_and_submit_publishes() {
	let hub = MemoryHub::new();
	let (spotter, session, _) = spotter_session(&hub).await;
	let controller = session.controller();

	let at = north_of(HERE, 150.0);
	assert_eq!(
		controller.handle_map_tap(at),
		TapOutcome::DraftOpened { at }
	);

	let pin = controller
		.submit_draft("3 people near the overpass", 3, TtlClass::Medium)
		.await
		.unwrap();
	assert_eq!(pin.status, PinStatus::Open);
	assert_eq!(pin.created_by, spotter);
	assert!(controller.draft_position().is_none());

	// The new pin is in the render view and nearby donors were pinged.
	let visible = controller.visible_pins(Utc::now()).await;
	assert_eq!(visible.len(), 1);
	wait_until(|| {
		let hub = hub.clone();
		async move { !hub.broadcasts().is_empty() }
	})
	.await;

	// Another connected client sees it arrive over the feed.
	let (_, donor_session, _) = donor_session_at(&hub, HERE).await;
	let donor_store = donor_session.store().clone();
	let pin_id = pin.id;
	wait_until(|| {
		let store = donor_store.clone();
		async move { store.get(pin_id).await.is_some() }
	})
	.await;
}

#[tokio::test]
async fn short_description_keeps_the_composer_open() {
	let hub = MemoryHub::new();
	let (_, session, _) = spotter_session(&hub).await;
	let controller = session.controller();

	controller.handle_map_tap(HERE);
	let err = controller
		.submit_draft("hi", 2, TtlClass::Short)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);
	assert!(controller.draft_position().is_some());
	assert_eq!(hub.pin_count(), 0);
}

#[tokio::test]
async fn lock_notifies_the_spotter_through_the_bell() {
	let hub = MemoryHub::new();
	let (_, spotter_sess, alerts) = spotter_session(&hub).await;
	let controller = spotter_sess.controller();

	controller.handle_map_tap(HERE);
	let pin = controller
		.submit_draft("family of four by the station", 4, TtlClass::Long)
		.await
		.unwrap();

	let (_, donor_sess, _) = donor_session_at(&hub, HERE).await;
	let donor_ctl = donor_sess.controller().clone();
	let donor_store = donor_sess.store().clone();
	let pin_id = pin.id;
	wait_until(|| {
		let store = donor_store.clone();
		async move { store.get(pin_id).await.is_some() }
	})
	.await;

	donor_ctl.request_lock(pin.id).await.unwrap();

	// The spotter's bell fills and the local alert fires.
	let center = spotter_sess.notifications().clone();
	wait_until(|| {
		let center = center.clone();
		async move { center.unread_count().await == 1 }
	})
	.await;
	assert!(!alerts.messages().is_empty());

	// Opening the bell clears the count, here and in the store.
	center.mark_all_read().await.unwrap();
	assert_eq!(center.unread_count().await, 0);
	assert!(hub.notification_rows().iter().all(|n| n.read));

	// The spotter's own mirror converged to the locked row via the feed.
	let spotter_store = spotter_sess.store().clone();
	wait_until(|| {
		let store = spotter_store.clone();
		async move {
			store
				.get(pin_id)
				.await
				.is_some_and(|p| p.is_locked())
		}
	})
	.await;
}

#[tokio::test]
async fn completion_flows_through_the_camera_and_releases_it() {
	let hub = MemoryHub::new();
	let (_, spotter_sess, _) = spotter_session(&hub).await;
	let controller = spotter_sess.controller();
	controller.handle_map_tap(HERE);
	let pin = controller
		.submit_draft("one person at the footbridge", 1, TtlClass::Short)
		.await
		.unwrap();

	// Donor standing 40m out, inside the 50m completion radius.
	let (_, donor_sess, camera) = donor_session_at(&hub, north_of(HERE, 40.0)).await;
	let donor_ctl = donor_sess.controller().clone();
	let donor_store = donor_sess.store().clone();
	let pin_id = pin.id;
	wait_until(|| {
		let store = donor_store.clone();
		async move { store.get(pin_id).await.is_some() }
	})
	.await;

	donor_ctl.request_lock(pin.id).await.unwrap();

	donor_ctl.begin_completion(pin.id).await.unwrap();
	assert!(donor_ctl.camera_active());

	let done = donor_ctl.confirm_completion().await.unwrap();
	assert_eq!(done.status, PinStatus::Completed);
	assert!(done.proof_ref.is_some());
	assert!(!donor_ctl.camera_active());
	assert!(camera.stream_stopped(), "capture stream must be released");
	assert_eq!(hub.upload_count(), 1);
}

#[tokio::test]
async fn closing_the_overlay_releases_the_camera_without_completing() {
	let hub = MemoryHub::new();
	let (_, spotter_sess, _) = spotter_session(&hub).await;
	let controller = spotter_sess.controller();
	controller.handle_map_tap(HERE);
	let pin = controller
		.submit_draft("two people at the corner", 2, TtlClass::Short)
		.await
		.unwrap();

	let (_, donor_sess, camera) = donor_session_at(&hub, HERE).await;
	let donor_ctl = donor_sess.controller().clone();
	let donor_store = donor_sess.store().clone();
	let pin_id = pin.id;
	wait_until(|| {
		let store = donor_store.clone();
		async move { store.get(pin_id).await.is_some() }
	})
	.await;
	donor_ctl.request_lock(pin.id).await.unwrap();

	donor_ctl.begin_completion(pin.id).await.unwrap();
	donor_ctl.close_completion();
	assert!(!donor_ctl.camera_active());
	assert!(camera.stream_stopped());
	assert_eq!(hub.pin(pin.id).unwrap().status, PinStatus::Locked);
}

#[tokio::test]
async fn camera_denial_surfaces_as_a_permission_error() {
	let hub = MemoryHub::new();
	let user = Uuid::new_v4();
	let platform = hub.client_with(
		user,
		ScriptedLocation::fixed(HERE),
		FakeCamera::denied(),
		RecordingAlerts::new(),
	);
	let session = MapSession::start(CoreConfig::default(), platform)
		.await
		.unwrap();

	let err = session
		.controller()
		.begin_completion(Uuid::new_v4())
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Permission);
	assert!(!session.controller().camera_active());
}

#[tokio::test]
async fn taps_during_and_just_after_a_drag_are_suppressed() {
	let hub = MemoryHub::new();
	let (_, session, _) = spotter_session(&hub).await;
	let controller = session.controller();

	controller.handle_map_tap(HERE);
	let pin = controller
		.submit_draft("one person under the awning", 1, TtlClass::Short)
		.await
		.unwrap();

	controller.drag_started(pin.id);
	assert_eq!(controller.handle_map_tap(HERE), TapOutcome::Ignored);

	let moved_to = north_of(HERE, 60.0);
	controller.drag_ended(pin.id, moved_to).await.unwrap();
	assert_eq!(hub.pin(pin.id).unwrap().position, moved_to);

	// The synthetic click trailing the drag is swallowed; the next real tap
	// works again.
	assert_eq!(controller.handle_map_tap(HERE), TapOutcome::Ignored);
	assert!(matches!(
		controller.handle_map_tap(HERE),
		TapOutcome::DraftOpened { .. }
	));
}

#[traced_test]
#[tokio::test]
async fn malformed_feed_payloads_are_dropped_not_fatal() {
	let hub = MemoryHub::new();
	let (_, session, _) = spotter_session(&hub).await;

	hub.emit_raw(json!({ "type": "upsert", "record": 17 }));

	// An update for a pin the mirror never saw still lands (the feed races
	// the baseline load).
	let draft_pin = {
		use kb_core::domain::{Pin, PinDraft};
		let draft = PinDraft {
			position: HERE,
			description: "late arrival".into(),
			people_count: 1,
			ttl: TtlClass::Short,
		};
		Pin::from_draft(&draft, Uuid::new_v4(), Utc::now(), chrono::Duration::hours(1))
	};
	hub.emit_raw(json!({ "type": "update", "record": serde_json::to_value(&draft_pin).unwrap() }));

	let store = session.store().clone();
	let pin_id = draft_pin.id;
	wait_until(|| {
		let store = store.clone();
		async move { store.get(pin_id).await.is_some() }
	})
	.await;

	assert!(logs_contain("dropping malformed feed event"));
}

#[tokio::test]
async fn denial_before_any_fix_blocks_denial_after_a_fix_does_not() {
	let hub = MemoryHub::new();

	// Denied straight away: the session is blocked and the map centers on
	// the configured fallback.
	let blocked = hub.client_with(
		Uuid::new_v4(),
		ScriptedLocation::new(vec![LocationUpdate::Denied]),
		FakeCamera::new(),
		RecordingAlerts::new(),
	);
	let blocked_sess = MapSession::start(CoreConfig::default(), blocked).await.unwrap();
	let blocked_ctl = blocked_sess.controller().clone();
	wait_until(|| {
		let ctl = blocked_ctl.clone();
		async move { ctl.permission() == PermissionState::Denied }
	})
	.await;
	assert_eq!(blocked_ctl.handle_map_tap(HERE), TapOutcome::Rejected);
	assert_eq!(
		blocked_ctl.map_center(),
		CoreConfig::default().fallback_center
	);

	// A fix followed by a watch error: the map keeps working.
	let flaky = hub.client_with(
		Uuid::new_v4(),
		ScriptedLocation::new(vec![
			LocationUpdate::Sample {
				point: HERE,
				at: Utc::now(),
			},
			LocationUpdate::Denied,
		]),
		FakeCamera::new(),
		RecordingAlerts::new(),
	);
	let flaky_sess = MapSession::start(CoreConfig::default(), flaky).await.unwrap();
	let flaky_ctl = flaky_sess.controller().clone();
	wait_until(|| {
		let ctl = flaky_ctl.clone();
		async move { ctl.location().is_some() }
	})
	.await;
	tokio::time::sleep(StdDuration::from_millis(50)).await;
	assert_eq!(flaky_ctl.permission(), PermissionState::Granted);
	assert_eq!(flaky_ctl.map_center(), HERE);
}

#[tokio::test]
async fn shutdown_stops_reconciliation() {
	let hub = MemoryHub::new();
	let (_, mut session, _) = spotter_session(&hub).await;
	let store = session.store().clone();
	let baseline = store.len().await;

	session.shutdown();

	// A pin created after teardown never reaches the dead session's mirror.
	let (_, other_sess, _) = donor_session_at(&hub, HERE).await;
	let other_ctl = other_sess.controller().clone();
	other_ctl.handle_map_tap(HERE);
	other_ctl
		.submit_draft("after the first viewer left", 1, TtlClass::Short)
		.await
		.unwrap();

	tokio::time::sleep(StdDuration::from_millis(100)).await;
	assert_eq!(store.len().await, baseline);
}
