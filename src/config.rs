use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::capture::{FacingMode, SamplerConfig};
use crate::credentials::LocalTokenIssuer;
use crate::location::{LocationSample, WatchOptions};
use crate::session::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub location: LocationConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "lookout".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub frame_interval_ms: u64,
    pub jpeg_quality: u8,
    /// Initial camera
    pub facing: FacingMode,
    /// Image served as the camera feed when no camera backend is available
    pub still_image: Option<String>,
}

impl CaptureConfig {
    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 2_000,
            jpeg_quality: 80,
            facing: FacingMode::Environment,
            still_image: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub high_accuracy: bool,
    pub maximum_age_ms: u64,
    /// Fixed position reported when no location service is available
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            maximum_age: Duration::from_millis(self.maximum_age_ms),
        }
    }

    /// Configured fixed position, if both coordinates are set
    pub fn fixed_sample(&self) -> Option<LocationSample> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(LocationSample::new(lat, lng)),
            _ => None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: 10_000,
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub ttl_secs: u64,
}

impl CredentialsConfig {
    pub fn issuer(&self) -> LocalTokenIssuer {
        LocalTokenIssuer::new(
            self.api_key.clone(),
            self.api_secret.clone(),
            Duration::from_secs(self.ttl_secs),
        )
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Load from an optional file, then `LOOKOUT__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LOOKOUT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
