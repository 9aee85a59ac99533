//! The geofence monitor context object.
//!
//! Owns the stores, the device subscriptions, and both periodic
//! schedules. There is no ambient module-level state: everything the
//! engine touches hangs off this object and dies with `stop()`.
//!
//! Three background loops run while the monitor is started:
//! - ingest — feeds live fixes and headings into shared state
//! - evaluate — arbitrates a position, runs the state machine, enqueues
//!   events, and kicks off a cache refresh when the cache is stale
//! - sync — drains the outbox on a fixed interval and immediately on an
//!   offline→online transition
//!
//! Network calls never block the evaluation tick: the cache refresh runs
//! as its own task, and the sync loop is independent of evaluation.

use crate::arbiter::PositionArbiter;
use crate::config::MonitorConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{EngineError, EngineResult};
use crate::evaluator::{GeofenceEvaluator, GeofenceState};
use crate::remote::GeofenceService;
use crate::sources::{
    Fix, HeadingSample, HeadingSource, HeadingSubscription, LocationSource, LocationSubscription,
};
use crate::sync::{DrainReport, SyncManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use waymark_store::{EventQueue, GeofenceStore, PositionStore};
use waymark_types::{GeofenceId, LatLng, LoadId, Position, Timestamp};

/// Snapshot of engine health for the host layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    pub online: bool,
    /// True when the live position tier is not in use.
    pub degraded: bool,
    pub cache_stale: bool,
    pub cached_geofences: usize,
    pub pending_events: usize,
}

/// The closest cached geofence, with a display-ready distance.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestGeofence {
    pub geofence_id: GeofenceId,
    pub name: String,
    pub distance_m: f64,
    /// "850 m" below a kilometer, "2.3 km" above.
    pub formatted: String,
}

/// State shared between the background loops and the host surface.
#[derive(Debug)]
struct SharedState {
    position: Position,
    resolution_degraded: bool,
    /// No live fix arrived within the fix timeout; clears on the next fix.
    fix_gap: bool,
    latest_fix: Option<Fix>,
    latest_heading: Option<HeadingSample>,
    states: HashMap<GeofenceId, GeofenceState>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            position: Position::none(),
            resolution_degraded: true,
            fix_gap: false,
            latest_fix: None,
            latest_heading: None,
            states: HashMap::new(),
        }
    }
}

/// The engine context object.
pub struct GeofenceMonitor {
    config: MonitorConfig,
    queue: Arc<EventQueue>,
    geofences: Arc<GeofenceStore>,
    positions: Arc<PositionStore>,
    service: Arc<dyn GeofenceService>,
    location: Arc<dyn LocationSource>,
    heading: Arc<dyn HeadingSource>,
    connectivity: ConnectivityMonitor,
    arbiter: PositionArbiter,
    evaluator: GeofenceEvaluator,
    sync: SyncManager,
    shared: Arc<RwLock<SharedState>>,
    sources_degraded: Arc<AtomicBool>,
    refresh_in_flight: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GeofenceMonitor {
    /// Creates a monitor over the given stores, service, and sources.
    /// Nothing runs until [`GeofenceMonitor::start`].
    pub fn new(
        config: MonitorConfig,
        queue: Arc<EventQueue>,
        geofences: Arc<GeofenceStore>,
        positions: Arc<PositionStore>,
        service: Arc<dyn GeofenceService>,
        location: Arc<dyn LocationSource>,
        heading: Arc<dyn HeadingSource>,
    ) -> Self {
        let connectivity = ConnectivityMonitor::new(false);
        let arbiter = PositionArbiter::new(&config, positions.clone());
        let evaluator = GeofenceEvaluator::new(&config);
        let sync = SyncManager::new(queue.clone(), service.clone(), connectivity.clone());

        Self {
            config,
            queue,
            geofences,
            positions,
            service,
            location,
            heading,
            connectivity,
            arbiter,
            evaluator,
            sync,
            shared: Arc::new(RwLock::new(SharedState::default())),
            sources_degraded: Arc::new(AtomicBool::new(false)),
            refresh_in_flight: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes to the device sources and spawns the background loops.
    /// A source that refuses to subscribe marks the monitor degraded and
    /// the engine continues on its fallback tiers.
    pub async fn start(&self) -> EngineResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("starting geofence monitor");

        let location_sub = match self.location.subscribe().await {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("location source unavailable, continuing on fallback tiers: {e}");
                self.sources_degraded.store(true, Ordering::SeqCst);
                None
            }
        };
        let heading_sub = match self.heading.subscribe().await {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("heading source unavailable, dead reckoning disabled: {e}");
                None
            }
        };

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(ingest_loop(
            location_sub,
            heading_sub,
            self.shared.clone(),
            self.sources_degraded.clone(),
            self.config.fix_timeout,
            self.running.clone(),
        )));
        tasks.push(tokio::spawn(evaluation_loop(
            self.config.clone(),
            self.arbiter.clone(),
            self.evaluator.clone(),
            self.geofences.clone(),
            self.queue.clone(),
            self.service.clone(),
            self.connectivity.clone(),
            self.shared.clone(),
            self.refresh_in_flight.clone(),
            self.running.clone(),
        )));
        tasks.push(tokio::spawn(sync_loop(
            self.sync.clone(),
            self.connectivity.clone(),
            self.config.sync_interval,
            self.running.clone(),
        )));
        Ok(())
    }

    /// Stops both periodic schedules and drops the device subscriptions.
    /// No timers or subscriptions outlive this call.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        info!("geofence monitor stopped");
    }

    /// Whether the background loops are running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The connectivity handle the host reports online/offline through.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    // ── Host surface ─────────────────────────────────────────────

    /// The most recently resolved position, with its provenance tag.
    pub async fn current_position(&self) -> Position {
        self.shared.read().await.position
    }

    /// The current per-geofence state map.
    pub async fn geofence_states(&self) -> HashMap<GeofenceId, GeofenceState> {
        self.shared.read().await.states.clone()
    }

    /// The closest cached geofence by tracked distance.
    pub async fn nearest_geofence(&self) -> Option<NearestGeofence> {
        let states = self.shared.read().await.states.clone();
        let geofences = self.geofences.all().ok()?;
        geofences
            .into_iter()
            .filter_map(|g| states.get(&g.id).map(|s| (g, s.distance_m)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(geofence, distance_m)| NearestGeofence {
                geofence_id: geofence.id,
                name: geofence.name,
                distance_m,
                formatted: format_distance(distance_m),
            })
    }

    /// Number of locally cached geofence definitions.
    pub fn cached_geofence_count(&self) -> EngineResult<usize> {
        Ok(self.geofences.count()?)
    }

    /// Number of events awaiting delivery.
    pub fn pending_event_count(&self) -> EngineResult<usize> {
        Ok(self.queue.pending_count()?)
    }

    /// Runs a drain cycle immediately, regardless of the sync schedule.
    pub async fn force_sync(&self) -> EngineResult<DrainReport> {
        self.sync.drain().await
    }

    /// Fetches nearby geofences around the freshest known position and
    /// atomically replaces the cached set. On any failure the previous
    /// set is retained untouched.
    pub async fn refresh_geofences(&self) -> EngineResult<usize> {
        let anchor = self.freshest_position().await.ok_or_else(|| {
            EngineError::Unavailable("no known position to anchor a geofence fetch".to_string())
        })?;
        refresh_cache(
            &self.service,
            &self.geofences,
            anchor,
            self.config.cache_radius_m,
            self.config.load_id,
        )
        .await
    }

    /// Engine health snapshot.
    pub async fn status(&self) -> MonitorStatus {
        let shared = self.shared.read().await;
        MonitorStatus {
            online: self.connectivity.is_online(),
            degraded: shared.resolution_degraded
                || shared.fix_gap
                || self.sources_degraded.load(Ordering::SeqCst),
            cache_stale: self
                .geofences
                .is_stale(self.config.cache_ttl, Timestamp::now())
                .unwrap_or(true),
            cached_geofences: self.geofences.count().unwrap_or(0),
            pending_events: self.queue.pending_count().unwrap_or(0),
        }
    }

    async fn freshest_position(&self) -> Option<LatLng> {
        let current = self.shared.read().await.position;
        if current.is_known() {
            return Some(current.lat_lng());
        }
        match self.positions.load() {
            Ok(Some(position)) => Some(position.lat_lng()),
            Ok(None) => None,
            Err(e) => {
                warn!("failed to load last-known position: {e}");
                None
            }
        }
    }
}

/// Formats a distance for display: meters below a kilometer, otherwise
/// kilometers with one decimal.
fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

async fn next_fix(sub: &mut Option<LocationSubscription>) -> Option<Fix> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_heading(sub: &mut Option<HeadingSubscription>) -> Option<HeadingSample> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

/// Feeds device samples into shared state until stopped.
async fn ingest_loop(
    mut location_sub: Option<LocationSubscription>,
    mut heading_sub: Option<HeadingSubscription>,
    shared: Arc<RwLock<SharedState>>,
    sources_degraded: Arc<AtomicBool>,
    fix_timeout: Duration,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            fix = next_fix(&mut location_sub) => match fix {
                Some(fix) => {
                    let mut state = shared.write().await;
                    state.latest_fix = Some(fix);
                    state.fix_gap = false;
                }
                None => {
                    warn!("location stream ended, continuing on fallback tiers");
                    sources_degraded.store(true, Ordering::SeqCst);
                    location_sub = None;
                }
            },
            sample = next_heading(&mut heading_sub) => match sample {
                Some(sample) => {
                    shared.write().await.latest_heading = Some(sample);
                }
                None => {
                    warn!("heading stream ended, dead reckoning disabled");
                    heading_sub = None;
                }
            },
            _ = tokio::time::sleep(fix_timeout) => {
                debug!("no live fix within {fix_timeout:?}");
                shared.write().await.fix_gap = true;
            }
        }
    }
}

/// Runs the evaluation tick until stopped.
#[allow(clippy::too_many_arguments)]
async fn evaluation_loop(
    config: MonitorConfig,
    arbiter: PositionArbiter,
    evaluator: GeofenceEvaluator,
    geofences: Arc<GeofenceStore>,
    queue: Arc<EventQueue>,
    service: Arc<dyn GeofenceService>,
    connectivity: ConnectivityMonitor,
    shared: Arc<RwLock<SharedState>>,
    refresh_in_flight: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) {
    let mut ticks = tokio::time::interval(config.eval_interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        ticks.tick().await;

        let now = Timestamp::now();
        let (latest_fix, latest_heading) = {
            let state = shared.read().await;
            (state.latest_fix, state.latest_heading)
        };
        let heading = latest_heading.map(|h| h.heading_deg);
        let resolution = arbiter.resolve(latest_fix.as_ref(), heading, now);

        let cached_set = match geofences.all() {
            Ok(set) => set,
            Err(e) => {
                warn!("failed to load cached geofences: {e}");
                Vec::new()
            }
        };

        let events = {
            let mut state = shared.write().await;
            state.position = resolution.position;
            state.resolution_degraded = resolution.degraded;
            evaluator.evaluate(&resolution.position, &cached_set, &mut state.states, now)
        };

        for event in &events {
            debug!("geofence {} fired {}", event.geofence_id, event.event_type);
            if let Err(e) = queue.enqueue(event) {
                warn!("failed to enqueue geofence event: {e}");
            }
        }

        // Stale cache? Refresh off-tick, single-flight, online only.
        let stale = matches!(geofences.is_stale(config.cache_ttl, now), Ok(true));
        if stale
            && connectivity.is_online()
            && resolution.position.is_known()
            && !refresh_in_flight.swap(true, Ordering::SeqCst)
        {
            let service = service.clone();
            let geofences = geofences.clone();
            let refresh_in_flight = refresh_in_flight.clone();
            let anchor = resolution.position.lat_lng();
            let radius_m = config.cache_radius_m;
            let load_id = config.load_id;
            tokio::spawn(async move {
                match refresh_cache(&service, &geofences, anchor, radius_m, load_id).await {
                    Ok(count) => info!("refreshed geofence cache: {count} definitions"),
                    Err(e) => warn!("geofence refresh failed, keeping previous set: {e}"),
                }
                refresh_in_flight.store(false, Ordering::SeqCst);
            });
        }
    }
}

/// Drains the outbox on the sync interval and on offline→online edges.
async fn sync_loop(
    sync: SyncManager,
    connectivity: ConnectivityMonitor,
    sync_interval: Duration,
    running: Arc<AtomicBool>,
) {
    let mut ticks = tokio::time::interval(sync_interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut online = connectivity.watch();

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            _ = ticks.tick() => {}
            changed = online.changed() => {
                match changed {
                    Ok(()) => {
                        if !*online.borrow_and_update() {
                            continue;
                        }
                        info!("connectivity regained, draining event queue");
                    }
                    Err(_) => break,
                }
            }
        }
        if let Err(e) = sync.drain().await {
            warn!("sync cycle failed: {e}");
        }
    }
}

/// Fetches nearby geofences and atomically replaces the cached set.
/// Callers only reach the replacement on fetch success, so a failed
/// refresh can never clear the cache.
async fn refresh_cache(
    service: &Arc<dyn GeofenceService>,
    geofences: &Arc<GeofenceStore>,
    anchor: LatLng,
    radius_m: f64,
    load_id: Option<LoadId>,
) -> EngineResult<usize> {
    let fetched = service
        .fetch_nearby(anchor.latitude, anchor.longitude, radius_m, load_id)
        .await?;
    geofences.replace_all(&fetched, Timestamp::now())?;
    Ok(fetched.len())
}
