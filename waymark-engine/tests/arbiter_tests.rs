use std::sync::Arc;
use std::time::Duration;
use waymark_engine::{Fix, MonitorConfig, PositionArbiter};
use waymark_store::PositionStore;
use waymark_types::{Position, PositionSource, Timestamp};

fn arbiter_with_store(config: &MonitorConfig) -> (PositionArbiter, Arc<PositionStore>) {
    let store = Arc::new(PositionStore::open_in_memory().unwrap());
    (PositionArbiter::new(config, store.clone()), store)
}

fn fix_at(latitude: f64, longitude: f64, timestamp: Timestamp) -> Fix {
    Fix {
        latitude,
        longitude,
        accuracy_m: 10.0,
        speed_mps: Some(15.0),
        heading_deg: Some(45.0),
        altitude_m: None,
        timestamp,
    }
}

fn cached_position(timestamp: Timestamp) -> Position {
    Position {
        latitude: 0.0,
        longitude: 0.0,
        accuracy_m: 10.0,
        speed_mps: None,
        heading_deg: None,
        altitude_m: None,
        timestamp,
        source: PositionSource::Live,
    }
}

// ── Tier 1: live ────────────────────────────────────────────────

#[test]
fn fresh_fix_resolves_live() {
    let config = MonitorConfig::default();
    let (arbiter, store) = arbiter_with_store(&config);
    let now = Timestamp::from_millis(1_000_000);
    let fix = fix_at(52.0, 4.0, now);

    let resolution = arbiter.resolve(Some(&fix), Some(90.0), now);

    assert_eq!(resolution.position.source, PositionSource::Live);
    assert_eq!(resolution.position.latitude, 52.0);
    assert!(!resolution.degraded);

    // Write-through: the cache now holds the live resolution.
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.source, PositionSource::Live);
    assert_eq!(saved.latitude, 52.0);
}

#[test]
fn stale_fix_is_not_live() {
    let config = MonitorConfig::default();
    let (arbiter, _store) = arbiter_with_store(&config);
    let now = Timestamp::from_millis(1_000_000);
    let stale = fix_at(52.0, 4.0, Timestamp::from_millis(1_000_000 - 31_000));

    // Empty cache, no heading: a stale fix degrades all the way to none.
    let resolution = arbiter.resolve(Some(&stale), None, now);
    assert_eq!(resolution.position.source, PositionSource::None);
    assert!(resolution.degraded);
}

// ── Tier 2: dead reckoning ──────────────────────────────────────

#[test]
fn cached_position_plus_heading_dead_reckons() {
    let config = MonitorConfig {
        assumed_speed_mps: 10.0,
        ..Default::default()
    };
    let (arbiter, store) = arbiter_with_store(&config);

    let cached_at = Timestamp::from_millis(1_000_000);
    store.save(&cached_position(cached_at)).unwrap();

    let now = cached_at + Duration::from_secs(100);
    let resolution = arbiter.resolve(None, Some(90.0), now);
    let position = resolution.position;

    assert_eq!(position.source, PositionSource::DeadReckoning);
    assert!(resolution.degraded);

    // 10 m/s east for 100 s ≈ 1000 m ≈ 1000/111320 degrees of longitude.
    let expected_delta = 1000.0 / 111_320.0;
    assert!(
        (position.longitude - expected_delta).abs() < 2e-5,
        "longitude {}",
        position.longitude
    );
    // Accuracy widened by 1 m per elapsed second.
    assert!((position.accuracy_m - 110.0).abs() < 1e-6);
    assert_eq!(position.timestamp, now);

    // The estimate overwrote the cache entry.
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.source, PositionSource::DeadReckoning);
}

// ── Tier 3: cached ──────────────────────────────────────────────

#[test]
fn cached_position_without_heading_is_returned_as_cached() {
    let config = MonitorConfig::default();
    let (arbiter, store) = arbiter_with_store(&config);

    let cached_at = Timestamp::from_millis(1_000_000);
    store.save(&cached_position(cached_at)).unwrap();

    let now = cached_at + Duration::from_secs(120);
    let resolution = arbiter.resolve(None, None, now);
    let position = resolution.position;

    assert_eq!(position.source, PositionSource::Cached);
    assert_eq!(position.latitude, 0.0);
    assert_eq!(position.timestamp, cached_at, "value returned unchanged");
    assert!(resolution.degraded);
}

// ── Tier 4: none ────────────────────────────────────────────────

#[test]
fn empty_cache_resolves_to_the_sentinel() {
    let config = MonitorConfig::default();
    let (arbiter, store) = arbiter_with_store(&config);

    let resolution = arbiter.resolve(None, Some(10.0), Timestamp::from_millis(1_000));

    assert_eq!(resolution.position.source, PositionSource::None);
    assert!(!resolution.position.is_known());
    assert!(resolution.degraded);
    // The sentinel is never persisted.
    assert_eq!(store.load().unwrap(), None);
}

// ── Tier precedence ─────────────────────────────────────────────

#[test]
fn live_fix_wins_over_a_populated_cache() {
    let config = MonitorConfig::default();
    let (arbiter, store) = arbiter_with_store(&config);

    let now = Timestamp::from_millis(2_000_000);
    store
        .save(&cached_position(Timestamp::from_millis(1_000_000)))
        .unwrap();

    let fix = fix_at(48.0, 11.0, now);
    let resolution = arbiter.resolve(Some(&fix), Some(0.0), now);

    assert_eq!(resolution.position.source, PositionSource::Live);
    assert_eq!(resolution.position.latitude, 48.0);
}

#[test]
fn stale_fix_falls_back_to_dead_reckoning() {
    let config = MonitorConfig::default();
    let (arbiter, store) = arbiter_with_store(&config);

    let now = Timestamp::from_millis(2_000_000);
    store.save(&cached_position(now)).unwrap();
    let stale = fix_at(52.0, 4.0, Timestamp::from_millis(2_000_000 - 60_000));

    let resolution = arbiter.resolve(Some(&stale), Some(180.0), now);
    assert_eq!(resolution.position.source, PositionSource::DeadReckoning);
    assert!(resolution.degraded);
}
