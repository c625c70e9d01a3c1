//! Per-frame counting pipeline.
//!
//! `PeopleCounter` owns all state that survives between cycles: the background
//! reference, the crossing tracker and the counts. It has no internal locking; callers
//! that share one instance must serialize whole cycles (see `stream`).
//!
//! A cycle is first staged against copies of the mutable state and committed only
//! after it fully succeeded, so a failing source, diff or encoder never leaves a
//! half-applied update behind.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use std::time::Instant;

use crate::annotate::FrameAnnotator;
use crate::background::BackgroundModel;
use crate::config::{CounterConfig, ServiceConfig};
use crate::detect::{Blob, MotionDetector};
use crate::encode::{FrameEncoder, JpegFrameEncoder};
use crate::frame::{prepare_frame, to_gray};
use crate::ingest::{CameraSource, FrameSource, SourceStats};
use crate::tracker::{Counts, Crossing, CrossingTracker};

/// Outcome of one committed cycle.
pub struct CycleReport {
    /// Prepared and annotated frame (undecorated on the baseline cycle).
    pub frame: RgbImage,
    /// This cycle captured the background reference and skipped analysis.
    pub baseline_captured: bool,
    pub blob: Option<Blob>,
    pub crossing: Option<Crossing>,
    /// Counts as of the end of this cycle; matches the overlay.
    pub counts: Counts,
}

struct StagedCycle {
    report: CycleReport,
    baseline: Option<GrayImage>,
    tracker: Option<CrossingTracker>,
}

pub struct PeopleCounter {
    config: CounterConfig,
    source: Box<dyn FrameSource>,
    background: BackgroundModel,
    detector: MotionDetector,
    tracker: CrossingTracker,
    annotator: FrameAnnotator,
    encoder: Box<dyn FrameEncoder>,
    counts: Counts,
    cycles: u64,
}

impl PeopleCounter {
    /// Build a pipeline around an already connected source.
    pub fn new(config: CounterConfig, source: Box<dyn FrameSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: MotionDetector::new(&config),
            tracker: CrossingTracker::new(&config),
            background: BackgroundModel::new(),
            annotator: FrameAnnotator::new(None),
            encoder: Box::new(JpegFrameEncoder::default()),
            counts: Counts::default(),
            cycles: 0,
            source,
            config,
        })
    }

    /// Open and connect the configured camera, load the overlay font and encoder.
    pub fn from_service_config(cfg: &ServiceConfig) -> Result<Self> {
        let mut source = CameraSource::new(cfg.source_config())?;
        source.connect()?;
        Ok(Self::new(cfg.counter.clone(), Box::new(source))?
            .with_annotator(FrameAnnotator::load(cfg.overlay.font_path.as_deref()))
            .with_encoder(Box::new(JpegFrameEncoder::new(cfg.overlay.jpeg_quality))))
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_encoder(mut self, encoder: Box<dyn FrameEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Pull one frame, run the full pipeline and return the encoded image.
    pub fn next_frame(&mut self) -> Result<Vec<u8>> {
        self.next_frame_at(Instant::now())
    }

    /// `next_frame` with an explicit cycle time, for replay on a simulated clock.
    pub fn next_frame_at(&mut self, now: Instant) -> Result<Vec<u8>> {
        let raw = self.source.next_frame()?;
        let staged = self.stage(raw, now)?;
        let bytes = self.encoder.encode(&staged.report.frame)?;
        self.commit(staged);
        Ok(bytes)
    }

    /// Run one cycle on a frame supplied by the caller, without encoding.
    pub fn process(&mut self, raw: RgbImage, now: Instant) -> Result<CycleReport> {
        let staged = self.stage(raw, now)?;
        Ok(self.commit(staged))
    }

    fn stage(&self, raw: RgbImage, now: Instant) -> Result<StagedCycle> {
        let mut frame = prepare_frame(raw, &self.config);
        let gray = to_gray(&frame);

        if !self.background.is_initialized() {
            return Ok(StagedCycle {
                report: CycleReport {
                    frame,
                    baseline_captured: true,
                    blob: None,
                    crossing: None,
                    counts: self.counts,
                },
                baseline: Some(gray),
                tracker: None,
            });
        }

        let delta = self.background.diff(&gray)?;
        let blob = self.detector.detect(&delta, self.config.min_area);

        let mut counts = self.counts;
        let mut crossing = None;
        let tracker = match &blob {
            Some(blob) => {
                log::trace!(
                    "blob at ({}, {}) area {:.0}",
                    blob.cx,
                    blob.cy,
                    blob.area
                );
                let mut tracker = self.tracker.clone();
                crossing = tracker.on_blob_found(blob.cy, now, &mut counts);
                Some(tracker)
            }
            None => {
                self.tracker.on_blob_absent();
                None
            }
        };

        self.annotator
            .annotate(&mut frame, self.config.center_y(), blob.as_ref(), counts);

        Ok(StagedCycle {
            report: CycleReport {
                frame,
                baseline_captured: false,
                blob,
                crossing,
                counts,
            },
            baseline: None,
            tracker,
        })
    }

    fn commit(&mut self, staged: StagedCycle) -> CycleReport {
        if let Some(baseline) = staged.baseline {
            self.background.initialize_or_skip(baseline);
        }
        if let Some(tracker) = staged.tracker {
            self.tracker = tracker;
        }
        if let Some(crossing) = staged.report.crossing {
            log::info!(
                "{:?} counted (enter={}, leave={})",
                crossing,
                staged.report.counts.enter,
                staged.report.counts.leave
            );
        }
        self.counts = staged.report.counts;
        self.cycles += 1;
        staged.report
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    /// Number of committed cycles, including the baseline cycle.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn tracker(&self) -> &CrossingTracker {
        &self.tracker
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn content_type(&self) -> &'static str {
        self.encoder.content_type()
    }

    pub fn source_healthy(&self) -> bool {
        self.source.is_healthy()
    }

    pub fn source_stats(&self) -> SourceStats {
        self.source.stats()
    }
}
