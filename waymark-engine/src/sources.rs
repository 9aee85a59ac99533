//! Device location and heading sources.
//!
//! Both sources are modeled as explicit subscriptions yielding a sample
//! stream: `subscribe` either returns a subscription or fails with
//! `PermissionDenied`/`Unavailable`, and dropping the subscription
//! unsubscribes. The engine degrades silently to its fallback tiers when
//! a source fails; it never treats a missing source as fatal.

use crate::error::EngineResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use waymark_types::{Position, PositionSource, Timestamp};

/// A raw live sample from the device location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub speed_mps: Option<f64>,
    pub heading_deg: Option<f64>,
    pub altitude_m: Option<f64>,
    pub timestamp: Timestamp,
}

impl Fix {
    /// Age of this fix relative to `now`.
    #[must_use]
    pub fn age(&self, now: Timestamp) -> Duration {
        now.saturating_elapsed_since(self.timestamp)
    }

    /// Converts this fix into a position tagged as live.
    #[must_use]
    pub fn to_position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_m: self.accuracy_m,
            speed_mps: self.speed_mps,
            heading_deg: self.heading_deg,
            altitude_m: self.altitude_m,
            timestamp: self.timestamp,
            source: PositionSource::Live,
        }
    }
}

/// A compass heading sample from the device orientation provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    /// Degrees clockwise from true north.
    pub heading_deg: f64,
    pub timestamp: Timestamp,
}

/// An active location subscription. Dropping it unsubscribes.
pub struct LocationSubscription {
    rx: mpsc::Receiver<Fix>,
}

impl LocationSubscription {
    /// Wraps a receiver produced by a source implementation.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Fix>) -> Self {
        Self { rx }
    }

    /// Receives the next fix. Returns `None` when the source shuts down.
    pub async fn recv(&mut self) -> Option<Fix> {
        self.rx.recv().await
    }
}

/// An active heading subscription. Dropping it unsubscribes.
pub struct HeadingSubscription {
    rx: mpsc::Receiver<HeadingSample>,
}

impl HeadingSubscription {
    /// Wraps a receiver produced by a source implementation.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<HeadingSample>) -> Self {
        Self { rx }
    }

    /// Receives the next sample. Returns `None` when the source shuts down.
    pub async fn recv(&mut self) -> Option<HeadingSample> {
        self.rx.recv().await
    }
}

/// A continuous stream of live position fixes.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Starts a subscription, or fails with `PermissionDenied` /
    /// `Unavailable` when the device refuses.
    async fn subscribe(&self) -> EngineResult<LocationSubscription>;
}

/// A continuous stream of compass headings.
#[async_trait]
pub trait HeadingSource: Send + Sync {
    /// Starts a subscription, or fails with `PermissionDenied` /
    /// `Unavailable` when the device refuses.
    async fn subscribe(&self) -> EngineResult<HeadingSubscription>;
}

/// Push-driven mock sources for testing.
pub mod mock {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// A location source fed by the test.
    pub struct MockLocationSource {
        senders: Mutex<Vec<mpsc::Sender<Fix>>>,
        denied: AtomicBool,
        unavailable: AtomicBool,
    }

    impl MockLocationSource {
        pub fn new() -> Self {
            Self {
                senders: Mutex::new(Vec::new()),
                denied: AtomicBool::new(false),
                unavailable: AtomicBool::new(false),
            }
        }

        /// Makes future subscribe calls fail with `PermissionDenied`.
        pub fn deny_permission(&self) {
            self.denied.store(true, Ordering::SeqCst);
        }

        /// Makes future subscribe calls fail with `Unavailable`.
        pub fn set_unavailable(&self) {
            self.unavailable.store(true, Ordering::SeqCst);
        }

        /// Pushes a fix to every live subscriber.
        pub fn push(&self, fix: Fix) {
            self.senders
                .lock()
                .unwrap()
                .retain(|tx| tx.try_send(fix).is_ok());
        }

        /// Number of subscriptions still alive.
        pub fn subscriber_count(&self) -> usize {
            self.senders
                .lock()
                .unwrap()
                .iter()
                .filter(|tx| !tx.is_closed())
                .count()
        }
    }

    impl Default for MockLocationSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LocationSource for MockLocationSource {
        async fn subscribe(&self) -> EngineResult<LocationSubscription> {
            if self.denied.load(Ordering::SeqCst) {
                return Err(EngineError::PermissionDenied);
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(EngineError::Unavailable(
                    "location hardware unavailable".to_string(),
                ));
            }
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().unwrap().push(tx);
            Ok(LocationSubscription::new(rx))
        }
    }

    /// A heading source fed by the test.
    pub struct MockHeadingSource {
        senders: Mutex<Vec<mpsc::Sender<HeadingSample>>>,
        unavailable: AtomicBool,
    }

    impl MockHeadingSource {
        pub fn new() -> Self {
            Self {
                senders: Mutex::new(Vec::new()),
                unavailable: AtomicBool::new(false),
            }
        }

        /// Makes future subscribe calls fail with `Unavailable`.
        pub fn set_unavailable(&self) {
            self.unavailable.store(true, Ordering::SeqCst);
        }

        /// Pushes a heading sample to every live subscriber.
        pub fn push(&self, sample: HeadingSample) {
            self.senders
                .lock()
                .unwrap()
                .retain(|tx| tx.try_send(sample).is_ok());
        }
    }

    impl Default for MockHeadingSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl HeadingSource for MockHeadingSource {
        async fn subscribe(&self) -> EngineResult<HeadingSubscription> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(EngineError::Unavailable(
                    "orientation sensor unavailable".to_string(),
                ));
            }
            let (tx, rx) = mpsc::channel(64);
            self.senders.lock().unwrap().push(tx);
            Ok(HeadingSubscription::new(rx))
        }
    }
}
