//! Device position tracking
//!
//! The tracker runs for the whole client lifetime, independent of the
//! session. It only remembers the latest sample; publication is decided by
//! the session manager, which knows whether the session is ready.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::LocationError;

/// A single position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Options for a continuous position watch
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Prefer accuracy over battery
    pub high_accuracy: bool,
    /// Cached fixes up to this age may be reused
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(10),
        }
    }
}

/// Source of device position
///
/// Platform implementations wrap the OS location service. Samples are
/// delivered on the returned channel until the provider is dropped.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn watch(&mut self, options: WatchOptions)
        -> Result<mpsc::Receiver<LocationSample>, LocationError>;

    fn name(&self) -> &str;
}

/// Provider that reports one configured position (desktop runs, demos)
pub struct FixedLocationProvider {
    sample: LocationSample,
}

impl FixedLocationProvider {
    pub fn new(sample: LocationSample) -> Self {
        Self { sample }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn watch(
        &mut self,
        options: WatchOptions,
    ) -> Result<mpsc::Receiver<LocationSample>, LocationError> {
        info!(
            "Watching fixed location ({:.5}, {:.5}), high_accuracy={}",
            self.sample.latitude, self.sample.longitude, options.high_accuracy
        );

        let (tx, rx) = mpsc::channel(1);
        tx.try_send(self.sample)
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        // Keep the sender alive so the watch stays open
        tokio::spawn(async move {
            tx.closed().await;
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Holds the latest known position
#[derive(Debug, Default, Clone)]
pub struct LocationTracker {
    current: Option<LocationSample>,
    updates: u64,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current sample wholesale.
    pub fn update(&mut self, sample: LocationSample) {
        self.current = Some(sample);
        self.updates += 1;
    }

    pub fn current(&self) -> Option<LocationSample> {
        self.current
    }

    /// Number of samples received so far
    pub fn updates(&self) -> u64 {
        self.updates
    }
}
