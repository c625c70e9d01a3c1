//! Frame preparation helpers.
//!
//! - `prepare_frame`: applies the configured flips and resizes to the pipeline geometry.
//! - `to_gray`: single-channel derivative used for background differencing.
//!
//! Frames are plain `image::RgbImage` buffers. They are produced by a `FrameSource`,
//! mutated in place by annotation, and dropped after encoding.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

use crate::config::CounterConfig;

/// Normalize a captured frame to the pipeline's orientation and geometry.
pub fn prepare_frame(mut frame: RgbImage, cfg: &CounterConfig) -> RgbImage {
    if cfg.hflip {
        imageops::flip_horizontal_in_place(&mut frame);
    }
    if cfg.vflip {
        imageops::flip_vertical_in_place(&mut frame);
    }
    if frame.dimensions() != (cfg.width, cfg.height) {
        log::trace!(
            "resizing frame {}x{} -> {}x{}",
            frame.width(),
            frame.height(),
            cfg.width,
            cfg.height
        );
        frame = imageops::resize(&frame, cfg.width, cfg.height, FilterType::Triangle);
    }
    frame
}

/// Luma with BT.601 weights in 14-bit fixed point, rounded.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let y = (r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13)) >> 14;
        Luma([y as u8])
    })
}
