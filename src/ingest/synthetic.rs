//! Synthetic frame source (`stub://`).
//!
//! Renders a static backdrop with low-amplitude sensor noise and a bright "person"
//! walking down across the frame, pausing out of view, walking back up, and pausing
//! again. The very first frame is always the empty backdrop so the background
//! reference starts clean.

use anyhow::Result;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{SourceConfig, SourceStats};

/// Frames spent walking from one edge to the other.
pub const WALK_FRAMES: u64 = 30;
/// Frames with an empty scene between walks.
pub const PAUSE_FRAMES: u64 = 10;
/// Length of one down-and-up cycle.
pub const CYCLE_FRAMES: u64 = 2 * (WALK_FRAMES + PAUSE_FRAMES);

const NOISE_AMPLITUDE: i16 = 6;
const PERSON_COLOR: Rgb<u8> = Rgb([230, 200, 170]);

/// Where the walker is in a given frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkPhase {
    Backdrop,
    Down(u64),
    Up(u64),
}

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    rng: StdRng,
    backdrop: RgbImage,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        let seed = config
            .url
            .bytes()
            .fold(0x5eed_u64, |acc, b| acc.rotate_left(5) ^ b as u64);
        let backdrop = render_backdrop(config.width, config.height);
        Self {
            config,
            frame_count: 0,
            rng: StdRng::seed_from_u64(seed),
            backdrop,
        }
    }

    /// Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<RgbImage> {
        let phase = walk_phase(self.frame_count);
        self.frame_count += 1;

        let mut frame = self.backdrop.clone();
        for pixel in frame.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                let noise = self.rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
                *channel = (*channel as i16 + noise).clamp(0, 255) as u8;
            }
        }

        if let Some(cy) = self.person_center(phase) {
            self.draw_person(&mut frame, cy);
        }
        Ok(frame)
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }

    fn person_size(&self) -> (u32, u32) {
        ((self.config.width / 10).max(4), (self.config.height / 4).max(4))
    }

    /// Vertical center of the walker, or `None` when the scene is empty.
    pub fn person_center(&self, phase: WalkPhase) -> Option<i32> {
        let (_, h) = self.person_size();
        let top = (h / 2 + 10) as i64;
        let bottom = self.config.height as i64 - (h / 2 + 10) as i64;
        let span = bottom - top;
        let at = |step: u64| top + span * step as i64 / (WALK_FRAMES as i64 - 1);
        match phase {
            WalkPhase::Backdrop => None,
            WalkPhase::Down(step) => Some(at(step) as i32),
            WalkPhase::Up(step) => Some(at(WALK_FRAMES - 1 - step) as i32),
        }
    }

    fn draw_person(&self, frame: &mut RgbImage, cy: i32) {
        let (w, h) = self.person_size();
        let x0 = (self.config.width.saturating_sub(w)) / 2;
        let y0 = (cy - (h / 2) as i32).max(0) as u32;
        for y in y0..(y0 + h).min(frame.height()) {
            for x in x0..(x0 + w).min(frame.width()) {
                frame.put_pixel(x, y, PERSON_COLOR);
            }
        }
    }
}

/// Scene script for the frame with zero-based index `index`.
pub fn walk_phase(index: u64) -> WalkPhase {
    if index == 0 {
        return WalkPhase::Backdrop;
    }
    let t = (index - 1) % CYCLE_FRAMES;
    if t < WALK_FRAMES {
        WalkPhase::Down(t)
    } else if t < WALK_FRAMES + PAUSE_FRAMES {
        WalkPhase::Backdrop
    } else if t < 2 * WALK_FRAMES + PAUSE_FRAMES {
        WalkPhase::Up(t - WALK_FRAMES - PAUSE_FRAMES)
    } else {
        WalkPhase::Backdrop
    }
}

fn render_backdrop(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let shade = 60 + (y * 40 / height.max(1)) as u8;
        let tint = (x * 16 / width.max(1)) as u8;
        Rgb([shade, shade + tint / 2, shade + tint])
    })
}
