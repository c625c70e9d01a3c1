//! People Counter
//!
//! This crate counts people crossing a horizontal line in a fixed-camera view and
//! serves the annotated video as an MJPEG stream.
//!
//! # Architecture
//!
//! Every cycle pulls one frame and runs it through a fixed pipeline:
//!
//! 1. **Prepare**: optional flips, resize to the configured geometry, grayscale.
//! 2. **Background**: the first frame becomes the one-shot reference.
//! 3. **Detect**: absolute difference, threshold, dilation, largest contour.
//! 4. **Track**: the blob's vertical centroid extends the trajectory; a trajectory
//!    whose endpoints straddle the centerline by more than the margin is counted.
//! 5. **Annotate and encode**: centerline, blob box, centroid, counts, JPEG.
//!
//! Counts are committed only after the whole cycle succeeded.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (synthetic, image sequences, V4L2)
//! - `frame`, `background`, `detect`, `tracker`, `annotate`, `encode`: pipeline stages
//! - `pipeline`: `PeopleCounter`, the per-cycle orchestrator
//! - `stream`: HTTP server for the MJPEG feed, health and counts
//! - `config`: service configuration (file, env, validation)

pub mod annotate;
pub mod background;
pub mod config;
pub mod detect;
pub mod encode;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod stream;
pub mod tracker;

pub use annotate::FrameAnnotator;
pub use background::BackgroundModel;
pub use config::{CounterConfig, ServiceConfig};
pub use detect::{Blob, BoundingBox, MotionDetector};
pub use encode::{FrameEncoder, JpegFrameEncoder};
pub use error::PipelineError;
pub use ingest::{
    CameraSource, FrameSource, ImageSequenceSource, SourceConfig, SourceStats, SyntheticSource,
};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Source;
pub use pipeline::{CycleReport, PeopleCounter};
pub use stream::{StreamConfig, StreamHandle, StreamServer};
pub use tracker::{Counts, Crossing, CrossingTracker, TrajectoryBuffer};
