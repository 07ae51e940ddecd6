use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::source::VideoFrame;
use crate::error::CaptureError;

/// Encoded snapshot ready to publish on `camera-frame`
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub bytes: Vec<u8>,
}

/// Configuration for frame sampling
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between snapshots
    pub interval: Duration,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            jpeg_quality: 80,
        }
    }
}

/// Periodic snapshot scheduler and encoder
///
/// Owns at most one live ticker. The ticker only posts tick messages; frame
/// capture and encoding are driven by whoever receives them.
pub struct FrameSampler {
    config: SamplerConfig,
    ticker: Option<JoinHandle<()>>,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            ticker: None,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Start ticking, replacing any previous ticker.
    ///
    /// The first tick fires one full interval after activation.
    pub fn activate<M, F>(&mut self, tx: mpsc::Sender<M>, tick: F)
    where
        M: Send + 'static,
        F: Fn() -> M + Send + 'static,
    {
        self.deactivate();

        let period = self.config.interval;
        info!("Frame sampler active (every {}ms)", period.as_millis());

        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                if tx.send(tick()).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Cancel the ticker. Safe to call when inactive.
    pub fn deactivate(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            info!("Frame sampler stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// JPEG-encode an RGB frame
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<OutboundFrame, CaptureError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::Encode("frame has no pixels".into()));
    }

    if frame.pixels.len() != frame.expected_len() {
        return Err(CaptureError::Encode(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}",
            frame.pixels.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode(
            &frame.pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    debug!(
        "Encoded {}x{} frame as JPEG ({} bytes)",
        frame.width,
        frame.height,
        bytes.len()
    );

    Ok(OutboundFrame { bytes })
}
