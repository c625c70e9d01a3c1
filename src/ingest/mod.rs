//! Frame ingestion sources.
//!
//! This module provides the sources that feed the counting pipeline:
//! - Synthetic scene (`stub://`), a person walking across the counting line
//! - Image sequence replay from a local directory
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source yields full-color `RgbImage` frames. Sources own the camera lifecycle;
//! geometry normalization and flips happen later in the pipeline.

pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use image::RgbImage;

pub use file::ImageSequenceSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Anything that can hand the pipeline one frame at a time.
///
/// `next_frame` is expected to block for at most one hardware frame interval.
/// A source that can never produce another frame fails with
/// `PipelineError::SourceExhausted`.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    fn next_frame(&mut self) -> Result<RgbImage>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Configuration shared by all sources.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>`, a local directory (optionally `dir://<path>`), or `/dev/video*`.
    pub url: String,
    /// Target frame rate (frames per second) requested from hardware.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Restart finite sources (image sequences) instead of reporting exhaustion.
    pub loop_playback: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://entrance".to_string(),
            target_fps: 20,
            width: 800,
            height: 608,
            loop_playback: true,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Frame source selected from the configured URL.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    Sequence(ImageSequenceSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2Source),
}

impl CameraSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let url = config.url.trim().to_string();
        if url.is_empty() {
            return Err(anyhow!("frame source must not be empty"));
        }
        let backend = if url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSource::new(config))
        } else if url.starts_with("/dev/video") {
            #[cfg(feature = "ingest-v4l2")]
            {
                CameraBackend::V4l2(V4l2Source::new(config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(anyhow!(
                    "{} requires the ingest-v4l2 feature",
                    config.url
                ));
            }
        } else if let Some(path) = url.strip_prefix("dir://") {
            CameraBackend::Sequence(ImageSequenceSource::new(path, config.loop_playback)?)
        } else if !url.contains("://") {
            CameraBackend::Sequence(ImageSequenceSource::new(&url, config.loop_playback)?)
        } else {
            return Err(anyhow!(
                "unsupported frame source '{}'; expected stub://, dir:// or a local path",
                url
            ));
        };
        Ok(Self { backend })
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            CameraBackend::Sequence(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            CameraBackend::Sequence(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            CameraBackend::Sequence(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            CameraBackend::Sequence(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.stats(),
        }
    }
}
