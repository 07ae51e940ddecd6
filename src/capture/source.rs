use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Which camera feeds the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Back camera, facing the scene
    #[default]
    Environment,
    /// Front camera, facing the user
    User,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User => FacingMode::Environment,
        }
    }

    /// Short spoken label
    pub fn label(self) -> &'static str {
        match self {
            FacingMode::Environment => "back",
            FacingMode::User => "front",
        }
    }
}

/// One decoded video frame (8-bit RGB, row-major)
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    /// Uniformly filled frame
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Expected pixel buffer length for the frame's dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Live camera feed
///
/// Implementations own the platform capture handle. `start` must release any
/// previously held handle before acquiring a new one, and `stop` must be safe
/// to call when nothing is running.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Acquire the camera for `facing`
    async fn start(&self, facing: FacingMode) -> Result<(), CaptureError>;

    /// Release the camera (stop all tracks)
    async fn stop(&self);

    /// Current frame, or `None` if the feed has no data yet
    fn latest_frame(&self) -> Option<VideoFrame>;

    /// Check if source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}
