use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use super::source::{FacingMode, VideoFrame, VideoSource};
use crate::error::CaptureError;

#[derive(Debug, Default)]
struct StillState {
    capturing: bool,
    facing: Option<FacingMode>,
}

/// Video source backed by a single image
///
/// Used for desktop runs and tests where no camera exists. An empty source
/// captures successfully but never has a frame ready.
pub struct StillImageSource {
    frame: Option<VideoFrame>,
    state: Mutex<StillState>,
}

impl StillImageSource {
    /// Load a PNG or JPEG file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening still image: {}", path.display());

        let image = image::open(path)
            .with_context(|| format!("Failed to open still image: {}", path.display()))?
            .to_rgb8();

        let (width, height) = image.dimensions();
        info!("Still image loaded: {}x{}", width, height);

        Ok(Self::from_frame(VideoFrame {
            width,
            height,
            pixels: image.into_raw(),
        }))
    }

    pub fn from_frame(frame: VideoFrame) -> Self {
        Self {
            frame: Some(frame),
            state: Mutex::new(StillState::default()),
        }
    }

    pub fn empty() -> Self {
        Self {
            frame: None,
            state: Mutex::new(StillState::default()),
        }
    }

    pub fn facing(&self) -> Option<FacingMode> {
        self.state.lock().ok().and_then(|s| s.facing)
    }
}

#[async_trait]
impl VideoSource for StillImageSource {
    async fn start(&self, facing: FacingMode) -> Result<(), CaptureError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CaptureError::CameraUnavailable("capture state poisoned".into()))?;
        state.capturing = true;
        state.facing = Some(facing);
        Ok(())
    }

    async fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.capturing = false;
        }
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        if !self.is_capturing() {
            return None;
        }
        self.frame.clone()
    }

    fn is_capturing(&self) -> bool {
        self.state.lock().map(|s| s.capturing).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "still-image"
    }
}
