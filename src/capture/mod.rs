//! Camera capture and frame sampling
//!
//! - `source`: the `VideoSource` trait implemented by platform camera backends
//! - `still`: a source backed by a single image file
//! - `sampler`: the periodic snapshot ticker and JPEG encoder

pub mod sampler;
pub mod source;
pub mod still;

pub use sampler::{encode_jpeg, FrameSampler, OutboundFrame, SamplerConfig};
pub use source::{FacingMode, VideoFrame, VideoSource};
pub use still::StillImageSource;
