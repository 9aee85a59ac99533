//! Offline geofence monitoring and event synchronization engine.
//!
//! The engine does three things:
//! - arbitrates among noisy position sources (live fixes, dead reckoning,
//!   cached last-known position), tagging every resolution with its
//!   provenance
//! - evaluates the cached geofence set through a per-geofence state
//!   machine that emits enter/exit/approach/dwell events exactly once per
//!   transition
//! - guarantees at-least-once delivery of those events through a durable
//!   local outbox, drained whenever the device is online
//!
//! # Components
//!
//! - **[`PositionArbiter`]**: resolves one best position per tick
//! - **[`GeofenceEvaluator`]**: the pure per-geofence state machine
//! - **[`ConnectivityMonitor`]**: online/offline with edge-only notification
//! - **[`SyncManager`]**: per-event acknowledged outbox drains
//! - **[`GeofenceMonitor`]**: the context object owning stores,
//!   subscriptions, and both periodic schedules
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use waymark_engine::remote::mock::MockGeofenceService;
//! use waymark_engine::sources::mock::{MockHeadingSource, MockLocationSource};
//! use waymark_engine::{GeofenceMonitor, MonitorConfig};
//! use waymark_store::{EventQueue, GeofenceStore, PositionStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = GeofenceMonitor::new(
//!     MonitorConfig::default(),
//!     Arc::new(EventQueue::open_in_memory()?),
//!     Arc::new(GeofenceStore::open_in_memory()?),
//!     Arc::new(PositionStore::open_in_memory()?),
//!     Arc::new(MockGeofenceService::new()),
//!     Arc::new(MockLocationSource::new()),
//!     Arc::new(MockHeadingSource::new()),
//! );
//! assert!(!monitor.is_running());
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod config;
pub mod connectivity;
mod error;
pub mod evaluator;
pub mod monitor;
pub mod remote;
pub mod sources;
pub mod sync;

pub use arbiter::{PositionArbiter, Resolution};
pub use config::MonitorConfig;
pub use connectivity::ConnectivityMonitor;
pub use error::{EngineError, EngineResult};
pub use evaluator::{GeofenceEvaluator, GeofenceState};
pub use monitor::{GeofenceMonitor, MonitorStatus, NearestGeofence};
pub use remote::{GeofenceService, HttpGeofenceService, HttpServiceConfig};
pub use sources::{
    Fix, HeadingSample, HeadingSource, HeadingSubscription, LocationSource, LocationSubscription,
};
pub use sync::{DrainReport, SyncManager};
