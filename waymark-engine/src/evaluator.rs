//! The per-geofence state machine.
//!
//! Pure: evaluation takes the resolved position, the cached geofence
//! set, the prior state map, and the tick time, and returns the events
//! fired this tick. No clock reads, no I/O — tests drive a virtual
//! clock through the `now` parameter.
//!
//! Alert flags gate event emission only; state bookkeeping (inside flag,
//! distance, latches) always proceeds, so flipping a flag on later does
//! not produce a burst of stale transitions.
//!
//! Accuracy is deliberately not filtered here: a single noisy fix can
//! flap enter/exit. The right filtering policy is a product decision and
//! belongs upstream of this machine, not silently inside it.

use crate::config::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use waymark_geo::{distance_to_polygon_m, haversine_distance_m, point_in_polygon};
use waymark_types::{
    Geofence, GeofenceEvent, GeofenceId, GeofenceShape, LatLng, LoadId, Position, Timestamp,
};

/// Tracked state for one geofence, carried tick to tick in memory.
/// Not persisted: after a restart every geofence starts outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceState {
    pub geofence_id: GeofenceId,
    pub inside: bool,
    /// Distance to the trigger boundary (circle center / polygon edge).
    pub distance_m: f64,
    /// Set on entry, cleared on exit. Non-null iff `inside`.
    pub entered_at: Option<Timestamp>,
    /// Dwell fired for the current visit.
    pub dwell_fired: bool,
    /// Approach fired for the current approach episode.
    pub approach_fired: bool,
}

impl GeofenceState {
    fn outside(geofence_id: GeofenceId, distance_m: f64) -> Self {
        Self {
            geofence_id,
            inside: false,
            distance_m,
            entered_at: None,
            dwell_fired: false,
            approach_fired: false,
        }
    }
}

/// Evaluates the cached geofence set against a resolved position.
#[derive(Debug, Clone)]
pub struct GeofenceEvaluator {
    approach_band_factor: f64,
    polygon_approach_margin_m: f64,
    load_id: Option<LoadId>,
}

impl GeofenceEvaluator {
    /// Creates an evaluator with the monitor's approach-band settings.
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            approach_band_factor: config.approach_band_factor,
            polygon_approach_margin_m: config.polygon_approach_margin_m,
            load_id: config.load_id,
        }
    }

    /// Runs one evaluation tick.
    ///
    /// States for geofences no longer cached are dropped; newly cached
    /// geofences start outside. An unknown position (`source = none`)
    /// emits nothing and leaves every state untouched — going blind must
    /// not fabricate exits.
    pub fn evaluate(
        &self,
        position: &Position,
        geofences: &[Geofence],
        states: &mut HashMap<GeofenceId, GeofenceState>,
        now: Timestamp,
    ) -> Vec<GeofenceEvent> {
        if !position.is_known() {
            return Vec::new();
        }

        let cached_ids: HashSet<GeofenceId> = geofences.iter().map(|g| g.id).collect();
        states.retain(|id, _| cached_ids.contains(id));

        let here = position.lat_lng();
        let mut events = Vec::new();

        for geofence in geofences {
            let (distance_m, inside_now, in_band) = self.measure(here, geofence);
            let state = states
                .entry(geofence.id)
                .or_insert_with(|| GeofenceState::outside(geofence.id, distance_m));
            state.distance_m = distance_m;

            if inside_now && !state.inside {
                state.inside = true;
                state.entered_at = Some(now);
                state.dwell_fired = false;
                state.approach_fired = false;
                if geofence.alert_on_enter {
                    events.push(GeofenceEvent::enter(
                        geofence.id,
                        position.latitude,
                        position.longitude,
                        self.event_load(geofence),
                        now,
                    ));
                }
            } else if !inside_now && state.inside {
                state.inside = false;
                state.entered_at = None;
                state.dwell_fired = false;
                state.approach_fired = false;
                if geofence.alert_on_exit {
                    events.push(GeofenceEvent::exit(
                        geofence.id,
                        position.latitude,
                        position.longitude,
                        self.event_load(geofence),
                        now,
                    ));
                }
            }

            if !state.inside {
                // One approach per continuous episode: the latch clears
                // only on leaving the band entirely or entering the fence.
                if in_band {
                    if !state.approach_fired {
                        state.approach_fired = true;
                        events.push(GeofenceEvent::approach(
                            geofence.id,
                            position.latitude,
                            position.longitude,
                            self.event_load(geofence),
                            now,
                        ));
                    }
                } else {
                    state.approach_fired = false;
                }
            } else if let Some(entered_at) = state.entered_at {
                if !state.dwell_fired {
                    let dwelled = now.saturating_elapsed_since(entered_at);
                    if dwelled.as_secs() >= u64::from(geofence.dwell_threshold_secs) {
                        state.dwell_fired = true;
                        if geofence.alert_on_dwell {
                            events.push(GeofenceEvent::dwell(
                                geofence.id,
                                position.latitude,
                                position.longitude,
                                self.event_load(geofence),
                                dwelled.as_secs() as u32,
                                now,
                            ));
                        }
                    }
                }
            }
        }

        events
    }

    /// Distance to the boundary, current membership, and approach-band
    /// membership for one geofence.
    fn measure(&self, here: LatLng, geofence: &Geofence) -> (f64, bool, bool) {
        match &geofence.shape {
            GeofenceShape::Circle { center, radius_m } => {
                let distance = haversine_distance_m(here, *center);
                (
                    distance,
                    distance <= *radius_m,
                    distance <= self.approach_band_factor * radius_m,
                )
            }
            GeofenceShape::Polygon { vertices } => {
                let inside = point_in_polygon(here, vertices);
                let distance = if inside {
                    0.0
                } else {
                    distance_to_polygon_m(here, vertices)
                };
                (distance, inside, distance <= self.polygon_approach_margin_m)
            }
        }
    }

    fn event_load(&self, geofence: &Geofence) -> Option<LoadId> {
        geofence.load_id.or(self.load_id)
    }
}
