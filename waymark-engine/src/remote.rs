//! Remote geofence service client.
//!
//! The engine consumes two endpoints: a nearby-geofence download and an
//! event-recording endpoint. Delivery is at-least-once; the service
//! deduplicates event submissions on (geofence id, event type, timestamp).

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use waymark_types::{Geofence, GeofenceEvent, GeofenceId, GeofenceShape, LoadId, Timestamp};

/// Abstract interface to the remote geofence service.
#[async_trait]
pub trait GeofenceService: Send + Sync {
    /// Fetches geofences within `radius_m` of the given coordinates,
    /// optionally filtered to a load.
    async fn fetch_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        load_id: Option<LoadId>,
    ) -> EngineResult<Vec<Geofence>>;

    /// Records one geofence event. Safe to retry: the service treats a
    /// resubmission with the same dedup key as already recorded.
    async fn record_event(&self, event: &GeofenceEvent) -> EngineResult<()>;
}

/// Configuration for the HTTP service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServiceConfig {
    /// Base URL of the geofence service API.
    pub base_url: String,
    /// Bearer token, if the deployment requires one.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.waymark.io/v1".to_string(),
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Wire representation of a downloaded geofence definition.
#[derive(Debug, Deserialize)]
struct NearbyGeofence {
    id: GeofenceId,
    name: String,
    #[serde(flatten)]
    shape: GeofenceShape,
    #[serde(default)]
    load_id: Option<LoadId>,
    #[serde(default)]
    alert_on_enter: bool,
    #[serde(default)]
    alert_on_exit: bool,
    #[serde(default)]
    alert_on_dwell: bool,
    #[serde(default)]
    dwell_threshold_secs: u32,
}

impl NearbyGeofence {
    fn into_geofence(self, cached_at: Timestamp) -> Geofence {
        Geofence {
            id: self.id,
            name: self.name,
            shape: self.shape,
            load_id: self.load_id,
            alert_on_enter: self.alert_on_enter,
            alert_on_exit: self.alert_on_exit,
            alert_on_dwell: self.alert_on_dwell,
            dwell_threshold_secs: self.dwell_threshold_secs,
            cached_at,
        }
    }
}

/// Wire body for the event-recording endpoint. The dedup key is
/// (geofence_id, event_type, timestamp_ms).
#[derive(Debug, Serialize)]
struct RecordEventBody {
    geofence_id: GeofenceId,
    event_type: &'static str,
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_id: Option<LoadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dwell_secs: Option<u32>,
    timestamp_ms: u64,
}

/// HTTP implementation of the geofence service.
pub struct HttpGeofenceService {
    config: HttpServiceConfig,
    client: Client,
}

impl HttpGeofenceService {
    /// Creates a new HTTP service client.
    pub fn new(config: HttpServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to create HTTP client");
        Self { config, client }
    }

    fn map_request_error(e: reqwest::Error) -> EngineError {
        if e.is_connect() || e.is_timeout() {
            EngineError::NetworkUnavailable
        } else {
            EngineError::RemoteSync(format!("request failed: {e}"))
        }
    }
}

#[async_trait]
impl GeofenceService for HttpGeofenceService {
    async fn fetch_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        load_id: Option<LoadId>,
    ) -> EngineResult<Vec<Geofence>> {
        let mut request = self
            .client
            .get(format!("{}/geofences/nearby", self.config.base_url))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("radius_m", radius_m.to_string()),
            ]);
        if let Some(load_id) = load_id {
            request = request.query(&[("load_id", load_id.to_string())]);
        }
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Self::map_request_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::RemoteSync(format!(
                "geofence fetch failed: {status}: {body}"
            )));
        }

        let definitions: Vec<NearbyGeofence> = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteSync(format!("failed to parse geofence list: {e}")))?;

        let now = Timestamp::now();
        let mut geofences = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let geofence = definition.into_geofence(now);
            if let Err(e) = geofence.validate() {
                warn!("skipping invalid geofence definition {}: {e}", geofence.id);
                continue;
            }
            geofences.push(geofence);
        }
        debug!("fetched {} nearby geofences", geofences.len());
        Ok(geofences)
    }

    async fn record_event(&self, event: &GeofenceEvent) -> EngineResult<()> {
        let body = RecordEventBody {
            geofence_id: event.geofence_id,
            event_type: event.event_type.as_str(),
            latitude: event.latitude,
            longitude: event.longitude,
            load_id: event.load_id,
            dwell_secs: event.dwell_secs,
            timestamp_ms: event.timestamp.as_millis(),
        };

        let mut request = self
            .client
            .post(format!("{}/geofence-events", self.config.base_url))
            .json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Self::map_request_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::RemoteSync(format!(
                "event record failed: {status}: {text}"
            )));
        }
        debug!(
            "recorded {} event for geofence {}",
            event.event_type, event.geofence_id
        );
        Ok(())
    }
}

/// A mock service for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// In-memory geofence service with scripted responses and a
    /// recorded delivery log.
    pub struct MockGeofenceService {
        nearby: Mutex<Vec<Geofence>>,
        fetch_failures: Mutex<VecDeque<EngineError>>,
        record_script: Mutex<VecDeque<EngineResult<()>>>,
        delivered: Mutex<Vec<GeofenceEvent>>,
        fetch_calls: Mutex<usize>,
    }

    impl MockGeofenceService {
        /// Creates a mock that returns no geofences and accepts every event.
        pub fn new() -> Self {
            Self {
                nearby: Mutex::new(Vec::new()),
                fetch_failures: Mutex::new(VecDeque::new()),
                record_script: Mutex::new(VecDeque::new()),
                delivered: Mutex::new(Vec::new()),
                fetch_calls: Mutex::new(0),
            }
        }

        /// Sets the geofence set returned by subsequent fetches.
        pub fn set_nearby(&self, geofences: Vec<Geofence>) {
            *self.nearby.lock().unwrap() = geofences;
        }

        /// Queues an error for the next fetch call.
        pub fn fail_next_fetch(&self, error: EngineError) {
            self.fetch_failures.lock().unwrap().push_back(error);
        }

        /// Scripts per-call outcomes for `record_event`, consumed in
        /// order. Once the script runs out, calls succeed.
        pub fn script_record_outcomes(&self, outcomes: Vec<EngineResult<()>>) {
            self.record_script.lock().unwrap().extend(outcomes);
        }

        /// Events the service has accepted, in delivery order.
        pub fn delivered(&self) -> Vec<GeofenceEvent> {
            self.delivered.lock().unwrap().clone()
        }

        /// Number of accepted deliveries.
        pub fn delivered_count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }

        /// Number of fetch calls observed.
        pub fn fetch_count(&self) -> usize {
            *self.fetch_calls.lock().unwrap()
        }
    }

    impl Default for MockGeofenceService {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl GeofenceService for MockGeofenceService {
        async fn fetch_nearby(
            &self,
            _latitude: f64,
            _longitude: f64,
            _radius_m: f64,
            _load_id: Option<LoadId>,
        ) -> EngineResult<Vec<Geofence>> {
            *self.fetch_calls.lock().unwrap() += 1;
            if let Some(error) = self.fetch_failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            Ok(self.nearby.lock().unwrap().clone())
        }

        async fn record_event(&self, event: &GeofenceEvent) -> EngineResult<()> {
            if let Some(outcome) = self.record_script.lock().unwrap().pop_front() {
                outcome?;
            }
            self.delivered.lock().unwrap().push(event.clone());
            Ok(())
        }
    }
}
