//! Position source arbitration.
//!
//! Resolves a single best position per tick from four tiers: a fresh
//! live fix, a dead-reckoned projection of the cached position, the
//! cached position itself, or the `none` sentinel. Resolution is
//! infallible: a storage hiccup degrades and logs, it never stops the
//! evaluation tick.

use crate::config::MonitorConfig;
use crate::sources::Fix;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use waymark_geo::dead_reckoning;
use waymark_store::PositionStore;
use waymark_types::{Position, PositionSource, Timestamp};

/// Elapsed time beyond which a dead-reckoning base is suspicious.
/// The projection is still computed; accuracy widening does the discounting.
const DEAD_RECKONING_SANITY_BOUND: Duration = Duration::from_secs(600);

/// The outcome of one arbitration pass.
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub position: Position,
    /// True whenever the live tier was not used.
    pub degraded: bool,
}

/// Arbitrates among position tiers and writes resolved positions
/// through to the last-known-position store.
#[derive(Clone)]
pub struct PositionArbiter {
    live_staleness: Duration,
    assumed_speed_mps: f64,
    store: Arc<PositionStore>,
}

impl PositionArbiter {
    /// Creates an arbiter over the given position store.
    pub fn new(config: &MonitorConfig, store: Arc<PositionStore>) -> Self {
        Self {
            live_staleness: config.live_staleness,
            assumed_speed_mps: config.assumed_speed_mps,
            store,
        }
    }

    /// Resolves the current position from the freshest available tier.
    ///
    /// Every known resolution overwrites the position cache; the `none`
    /// sentinel never does, since it would erase the very data the
    /// fallback tiers exist to use.
    pub fn resolve(&self, live: Option<&Fix>, heading_deg: Option<f64>, now: Timestamp) -> Resolution {
        if let Some(fix) = live {
            if fix.age(now) <= self.live_staleness {
                let position = fix.to_position();
                self.write_through(&position);
                return Resolution {
                    position,
                    degraded: false,
                };
            }
        }

        let cached = match self.store.load() {
            Ok(cached) => cached,
            Err(e) => {
                warn!("failed to load last-known position: {e}");
                None
            }
        };
        let Some(cached) = cached else {
            return Resolution {
                position: Position::none(),
                degraded: true,
            };
        };

        if heading_deg.is_some() {
            let elapsed = now.saturating_elapsed_since(cached.timestamp);
            if elapsed > DEAD_RECKONING_SANITY_BOUND {
                warn!(
                    "dead reckoning from a {}s old position",
                    elapsed.as_secs()
                );
            }
            let position =
                dead_reckoning::estimate(&cached, elapsed, heading_deg, self.assumed_speed_mps);
            self.write_through(&position);
            return Resolution {
                position,
                degraded: true,
            };
        }

        let position = Position {
            source: PositionSource::Cached,
            ..cached
        };
        self.write_through(&position);
        Resolution {
            position,
            degraded: true,
        }
    }

    fn write_through(&self, position: &Position) {
        if let Err(e) = self.store.save(position) {
            warn!("failed to persist resolved position: {e}");
        }
    }
}
