use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::SourceConfig;

const DEFAULT_STREAM_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_STREAM_FPS: u32 = 20;
const DEFAULT_SOURCE: &str = "stub://entrance";
const DEFAULT_CAMERA_FPS: u32 = 20;
const DEFAULT_WIDTH: u32 = 800;
const DEFAULT_HEIGHT: u32 = 608;
const DEFAULT_MIN_AREA: f64 = 800.0;
const DEFAULT_HARD_MIN_AREA: f64 = 700.0;
const DEFAULT_DIFF_THRESHOLD: u8 = 70;
const DEFAULT_DILATE_ITERATIONS: u8 = 2;
const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 500;
const DEFAULT_MAX_TRAJECTORY: usize = 256;
const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Geometry and thresholds of the counting pipeline.
///
/// Fixed at construction; the pipeline never reloads it.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterConfig {
    /// Frames are resized to this geometry before processing.
    pub width: u32,
    pub height: u32,
    pub hflip: bool,
    pub vflip: bool,
    /// A blob must strictly exceed this area to be selected.
    pub min_area: f64,
    /// Contours below this area are discarded regardless of `min_area`.
    pub hard_min_area: f64,
    /// Difference intensity cutoff (pixels strictly above become motion).
    pub diff_threshold: u8,
    pub dilate_iterations: u8,
    /// Trajectory is dropped when the previous blob is at least this old.
    pub inactivity_timeout: Duration,
    /// Overrides the derived `height / 10` margin around the centerline.
    pub crossing_margin: Option<i32>,
    /// Upper bound on buffered centroids; interior points are dropped first.
    pub max_trajectory: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            hflip: false,
            vflip: false,
            min_area: DEFAULT_MIN_AREA,
            hard_min_area: DEFAULT_HARD_MIN_AREA,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
            inactivity_timeout: Duration::from_millis(DEFAULT_INACTIVITY_TIMEOUT_MS),
            crossing_margin: None,
            max_trajectory: DEFAULT_MAX_TRAJECTORY,
        }
    }
}

impl CounterConfig {
    /// Vertical position of the counting line.
    pub fn center_y(&self) -> i32 {
        (self.height / 2) as i32
    }

    pub fn crossing_margin(&self) -> i32 {
        self.crossing_margin.unwrap_or((self.height / 10) as i32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("frame geometry must be non-zero"));
        }
        if self.diff_threshold == 0 || self.diff_threshold == u8::MAX {
            return Err(anyhow!("diff_threshold must be in 1..=254"));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(anyhow!("min_area must be a non-negative number"));
        }
        if !self.hard_min_area.is_finite() || self.hard_min_area < 0.0 {
            return Err(anyhow!("hard_min_area must be a non-negative number"));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(anyhow!("inactivity timeout must be greater than zero"));
        }
        let margin = self.crossing_margin();
        if margin < 0 || margin >= self.center_y() {
            return Err(anyhow!(
                "crossing margin {} must be in 0..{}",
                margin,
                self.center_y()
            ));
        }
        if self.max_trajectory < 2 {
            return Err(anyhow!("max_trajectory must hold at least two centroids"));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Service configuration (file + environment)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    stream: Option<StreamConfigFile>,
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    tracking: Option<TrackingConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    addr: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    hflip: Option<bool>,
    vflip: Option<bool>,
    loop_playback: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    min_area: Option<f64>,
    diff_threshold: Option<u8>,
    dilate_iterations: Option<u8>,
    hard_min_area: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    inactivity_timeout_ms: Option<u64>,
    crossing_margin: Option<i32>,
    max_trajectory: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub stream_addr: String,
    /// Per-viewer pacing of the MJPEG stream; 0 disables pacing.
    pub stream_fps: u32,
    pub camera: CameraSettings,
    pub counter: CounterConfig,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub source: String,
    pub target_fps: u32,
    pub loop_playback: bool,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub font_path: Option<PathBuf>,
    pub jpeg_quality: u8,
}

impl ServiceConfig {
    /// Load from the file named by `PEOPLE_COUNTER_CONFIG` (if set), then apply env
    /// overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os("PEOPLE_COUNTER_CONFIG").map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Source settings combined with the pipeline geometry.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            url: self.camera.source.clone(),
            target_fps: self.camera.target_fps,
            width: self.counter.width,
            height: self.counter.height,
            loop_playback: self.camera.loop_playback,
        }
    }

    fn from_file(file: ServiceConfigFile) -> Self {
        let stream = file.stream.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let tracking = file.tracking.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();

        let counter = CounterConfig {
            width: camera.width.unwrap_or(DEFAULT_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            hflip: camera.hflip.unwrap_or(false),
            vflip: camera.vflip.unwrap_or(false),
            min_area: detection.min_area.unwrap_or(DEFAULT_MIN_AREA),
            hard_min_area: detection.hard_min_area.unwrap_or(DEFAULT_HARD_MIN_AREA),
            diff_threshold: detection.diff_threshold.unwrap_or(DEFAULT_DIFF_THRESHOLD),
            dilate_iterations: detection
                .dilate_iterations
                .unwrap_or(DEFAULT_DILATE_ITERATIONS),
            inactivity_timeout: Duration::from_millis(
                tracking
                    .inactivity_timeout_ms
                    .unwrap_or(DEFAULT_INACTIVITY_TIMEOUT_MS),
            ),
            crossing_margin: tracking.crossing_margin,
            max_trajectory: tracking.max_trajectory.unwrap_or(DEFAULT_MAX_TRAJECTORY),
        };

        Self {
            stream_addr: stream
                .addr
                .unwrap_or_else(|| DEFAULT_STREAM_ADDR.to_string()),
            stream_fps: stream.target_fps.unwrap_or(DEFAULT_STREAM_FPS),
            camera: CameraSettings {
                source: camera.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
                loop_playback: camera.loop_playback.unwrap_or(true),
            },
            counter,
            overlay: OverlaySettings {
                font_path: overlay.font_path,
                jpeg_quality: overlay.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PEOPLE_COUNTER_ADDR") {
            if !addr.trim().is_empty() {
                self.stream_addr = addr;
            }
        }
        if let Ok(source) = std::env::var("PEOPLE_COUNTER_SOURCE") {
            if !source.trim().is_empty() {
                self.camera.source = source;
            }
        }
        if let Ok(font) = std::env::var("PEOPLE_COUNTER_FONT") {
            if !font.trim().is_empty() {
                self.overlay.font_path = Some(PathBuf::from(font));
            }
        }
        if let Ok(min_area) = std::env::var("PEOPLE_COUNTER_MIN_AREA") {
            self.counter.min_area = min_area
                .trim()
                .parse()
                .map_err(|_| anyhow!("PEOPLE_COUNTER_MIN_AREA must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.counter.validate()?;
        if self.camera.source.trim().is_empty() {
            return Err(anyhow!("camera source must not be empty"));
        }
        if self.overlay.jpeg_quality == 0 || self.overlay.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be in 1..=100"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_file(ServiceConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<ServiceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
