//! Outbox drain cycles.
//!
//! Delivery is at-least-once: each pending event is sent one at a time
//! and acknowledged individually, so a mid-cycle failure never causes
//! already-acknowledged events to be redelivered. Failed events stay
//! pending and are retried on the next cycle — nothing is dropped
//! automatically.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{EngineError, EngineResult};
use crate::remote::GeofenceService;
use std::sync::Arc;
use tracing::{debug, info, warn};
use waymark_store::EventQueue;

/// Counts from one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Events delivered and acknowledged this cycle.
    pub delivered: usize,
    /// Delivery attempts that failed; the events remain pending.
    pub failed: usize,
    /// The cycle was skipped because the device is offline.
    pub skipped_offline: bool,
}

/// Drains the event queue to the remote service.
#[derive(Clone)]
pub struct SyncManager {
    queue: Arc<EventQueue>,
    service: Arc<dyn GeofenceService>,
    connectivity: ConnectivityMonitor,
}

impl SyncManager {
    /// Creates a sync manager over the given queue and service.
    pub fn new(
        queue: Arc<EventQueue>,
        service: Arc<dyn GeofenceService>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            queue,
            service,
            connectivity,
        }
    }

    /// Runs one drain cycle.
    ///
    /// Offline cycles are skipped silently. Each delivered event is
    /// marked synced immediately; a `NetworkUnavailable` failure aborts
    /// the rest of the cycle (connectivity is gone, everything left
    /// stays pending), any other failure skips just that event.
    /// Acknowledged rows are purged at the end of the cycle.
    pub async fn drain(&self) -> EngineResult<DrainReport> {
        let mut report = DrainReport::default();

        if !self.connectivity.is_online() {
            debug!("skipping sync cycle while offline");
            report.skipped_offline = true;
            return Ok(report);
        }

        let pending = self.queue.list_pending()?;
        if pending.is_empty() {
            return Ok(report);
        }
        info!("draining {} pending geofence events", pending.len());

        for event in &pending {
            match self.service.record_event(event).await {
                Ok(()) => {
                    self.queue.mark_synced(&[event.id])?;
                    report.delivered += 1;
                }
                Err(EngineError::NetworkUnavailable) => {
                    warn!(
                        "connectivity lost mid-drain, {} events remain pending",
                        pending.len() - report.delivered
                    );
                    report.failed += 1;
                    break;
                }
                Err(e) => {
                    warn!("failed to deliver event {}: {e}", event.id);
                    report.failed += 1;
                }
            }
        }

        let purged = self.queue.purge_synced()?;
        debug!(
            "sync cycle complete: {} delivered, {} failed, {} purged",
            report.delivered, report.failed, purged
        );
        Ok(report)
    }
}
