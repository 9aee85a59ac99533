use std::sync::Arc;
use std::time::Duration;
use waymark_engine::remote::mock::MockGeofenceService;
use waymark_engine::sources::mock::{MockHeadingSource, MockLocationSource};
use waymark_engine::{EngineError, Fix, GeofenceMonitor, MonitorConfig};
use waymark_store::{EventQueue, GeofenceStore, PositionStore};
use waymark_types::{
    Geofence, GeofenceEvent, GeofenceEventType, GeofenceId, LatLng, Position, PositionSource,
    Timestamp,
};

struct Harness {
    queue: Arc<EventQueue>,
    geofences: Arc<GeofenceStore>,
    positions: Arc<PositionStore>,
    service: Arc<MockGeofenceService>,
    location: Arc<MockLocationSource>,
    heading: Arc<MockHeadingSource>,
}

impl Harness {
    fn new() -> Self {
        Self {
            queue: Arc::new(EventQueue::open_in_memory().unwrap()),
            geofences: Arc::new(GeofenceStore::open_in_memory().unwrap()),
            positions: Arc::new(PositionStore::open_in_memory().unwrap()),
            service: Arc::new(MockGeofenceService::new()),
            location: Arc::new(MockLocationSource::new()),
            heading: Arc::new(MockHeadingSource::new()),
        }
    }

    fn monitor(&self, config: MonitorConfig) -> GeofenceMonitor {
        GeofenceMonitor::new(
            config,
            self.queue.clone(),
            self.geofences.clone(),
            self.positions.clone(),
            self.service.clone(),
            self.location.clone(),
            self.heading.clone(),
        )
    }
}

fn fix_at(latitude: f64, longitude: f64) -> Fix {
    Fix {
        latitude,
        longitude,
        accuracy_m: 5.0,
        speed_mps: Some(10.0),
        heading_deg: Some(90.0),
        altitude_m: None,
        timestamp: Timestamp::now(),
    }
}

fn fence_at(latitude: f64, longitude: f64, radius_m: f64) -> Geofence {
    Geofence::circle("Terminal 4", LatLng::new(latitude, longitude), radius_m)
}

// ── Lifecycle ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_and_stop_manage_subscriptions() {
    let harness = Harness::new();
    let monitor = harness.monitor(MonitorConfig::default());

    assert!(!monitor.is_running());
    monitor.start().await.unwrap();
    assert!(monitor.is_running());
    assert_eq!(harness.location.subscriber_count(), 1);

    monitor.stop().await;
    assert!(!monitor.is_running());
    assert_eq!(
        harness.location.subscriber_count(),
        0,
        "stop must drop the device subscriptions"
    );
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let harness = Harness::new();
    let monitor = harness.monitor(MonitorConfig::default());

    monitor.start().await.unwrap();
    monitor.start().await.unwrap();
    assert_eq!(harness.location.subscriber_count(), 1);
    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn denied_location_permission_degrades_instead_of_failing() {
    let harness = Harness::new();
    harness.location.deny_permission();
    let monitor = harness.monitor(MonitorConfig::default());

    monitor.start().await.unwrap();
    let status = monitor.status().await;
    assert!(status.degraded);
    monitor.stop().await;
}

// ── Evaluation ticks ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn evaluation_tick_enqueues_an_enter_event() {
    let harness = Harness::new();
    harness
        .geofences
        .replace_all(&[fence_at(52.0, 4.0, 500.0)], Timestamp::now())
        .unwrap();
    let monitor = harness.monitor(MonitorConfig::default());
    monitor.start().await.unwrap();

    harness.location.push(fix_at(52.0, 4.0));
    tokio::time::sleep(Duration::from_secs(7)).await;

    let pending = harness.queue.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, GeofenceEventType::Enter);
    assert_eq!(monitor.pending_event_count().unwrap(), 1);

    let position = monitor.current_position().await;
    assert_eq!(position.source, PositionSource::Live);
    assert_eq!(position.latitude, 52.0);

    let states = monitor.geofence_states().await;
    assert_eq!(states.len(), 1);
    assert!(states.values().next().unwrap().inside);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn nearest_geofence_formats_distance() {
    let harness = Harness::new();
    // Center ≈1 km north of the fix position.
    harness
        .geofences
        .replace_all(&[fence_at(52.009, 4.0, 200.0)], Timestamp::now())
        .unwrap();
    let monitor = harness.monitor(MonitorConfig::default());
    monitor.start().await.unwrap();

    harness.location.push(fix_at(52.0, 4.0));
    tokio::time::sleep(Duration::from_secs(7)).await;

    let nearest = monitor.nearest_geofence().await.unwrap();
    assert_eq!(nearest.name, "Terminal 4");
    assert!((nearest.distance_m - 1_000.0).abs() < 10.0, "{}", nearest.distance_m);
    assert_eq!(nearest.formatted, "1.0 km");

    monitor.stop().await;
}

// ── Sync surface ────────────────────────────────────────────────

#[tokio::test]
async fn force_sync_drains_the_queue_when_online() {
    let harness = Harness::new();
    for i in 0..2 {
        harness
            .queue
            .enqueue(&GeofenceEvent::enter(
                GeofenceId::new(),
                52.0,
                4.0,
                None,
                Timestamp::from_millis(1_000 + i),
            ))
            .unwrap();
    }
    let monitor = harness.monitor(MonitorConfig::default());
    monitor.connectivity().set_online(true);

    let report = monitor.force_sync().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(harness.service.delivered_count(), 2);
    assert_eq!(monitor.pending_event_count().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn regaining_connectivity_triggers_an_immediate_drain() {
    let harness = Harness::new();
    harness
        .queue
        .enqueue(&GeofenceEvent::exit(
            GeofenceId::new(),
            52.0,
            4.0,
            None,
            Timestamp::from_millis(1_000),
        ))
        .unwrap();
    let monitor = harness.monitor(MonitorConfig::default());
    monitor.start().await.unwrap();

    // Give the loops a moment offline: nothing is delivered.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.service.delivered_count(), 0);

    monitor.connectivity().set_online(true);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(harness.service.delivered_count(), 1);
    assert_eq!(harness.queue.pending_count().unwrap(), 0);

    monitor.stop().await;
}

// ── Cache refresh ───────────────────────────────────────────────

#[tokio::test]
async fn refresh_geofences_replaces_the_cached_set() {
    let harness = Harness::new();
    harness
        .positions
        .save(&Position {
            latitude: 52.0,
            longitude: 4.0,
            accuracy_m: 10.0,
            speed_mps: None,
            heading_deg: None,
            altitude_m: None,
            timestamp: Timestamp::now(),
            source: PositionSource::Live,
        })
        .unwrap();
    harness
        .geofences
        .replace_all(&[fence_at(0.0, 0.0, 100.0)], Timestamp::from_millis(1_000))
        .unwrap();
    harness
        .service
        .set_nearby(vec![fence_at(52.0, 4.0, 500.0), fence_at(52.1, 4.1, 300.0)]);

    let monitor = harness.monitor(MonitorConfig::default());
    let count = monitor.refresh_geofences().await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(monitor.cached_geofence_count().unwrap(), 2);
}

#[tokio::test]
async fn failed_refresh_retains_the_previous_set() {
    let harness = Harness::new();
    harness
        .positions
        .save(&Position {
            latitude: 52.0,
            longitude: 4.0,
            accuracy_m: 10.0,
            speed_mps: None,
            heading_deg: None,
            altitude_m: None,
            timestamp: Timestamp::now(),
            source: PositionSource::Cached,
        })
        .unwrap();
    let kept = fence_at(0.0, 0.0, 100.0);
    harness
        .geofences
        .replace_all(std::slice::from_ref(&kept), Timestamp::from_millis(1_000))
        .unwrap();
    harness
        .service
        .fail_next_fetch(EngineError::RemoteSync("500".to_string()));

    let monitor = harness.monitor(MonitorConfig::default());
    let err = monitor.refresh_geofences().await.unwrap_err();
    assert!(matches!(err, EngineError::RemoteSync(_)));

    let cached = harness.geofences.all().unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, kept.id, "stale cache retained, never cleared");
}

#[tokio::test]
async fn refresh_without_any_known_position_fails() {
    let harness = Harness::new();
    let monitor = harness.monitor(MonitorConfig::default());

    let err = monitor.refresh_geofences().await.unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
    assert_eq!(harness.service.fetch_count(), 0);
}

// ── Status ──────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_counts_and_staleness() {
    let harness = Harness::new();
    harness
        .geofences
        .replace_all(&[fence_at(52.0, 4.0, 500.0)], Timestamp::now())
        .unwrap();
    harness
        .queue
        .enqueue(&GeofenceEvent::enter(
            GeofenceId::new(),
            52.0,
            4.0,
            None,
            Timestamp::from_millis(1_000),
        ))
        .unwrap();

    let monitor = harness.monitor(MonitorConfig::default());
    let status = monitor.status().await;

    assert!(!status.online);
    assert!(status.degraded, "no resolution yet");
    assert!(!status.cache_stale);
    assert_eq!(status.cached_geofences, 1);
    assert_eq!(status.pending_events, 1);
}
