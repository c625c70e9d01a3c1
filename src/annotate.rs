//! Overlay drawing for the outgoing stream.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::detect::Blob;
use crate::tracker::Counts;

pub const CENTERLINE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const BLOB_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CENTROID_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const CENTROID_RADIUS: i32 = 5;
const TEXT_ORIGIN: (i32, i32) = (45, 25);
const TEXT_SCALE: f32 = 30.0;

/// Fonts probed when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Draws the centerline, the active blob and the running counts.
pub struct FrameAnnotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl FrameAnnotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(TEXT_SCALE),
        }
    }

    /// Load the overlay font from `font_path`, or from a well-known system location.
    ///
    /// A missing font is not fatal: the counts overlay is skipped and a warning logged.
    pub fn load(font_path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match font_path {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };
        for path in &candidates {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::debug!("overlay font loaded from {}", path.display());
                    return Self::new(Some(font));
                }
                Err(err) => {
                    log::warn!("overlay font {} is unusable: {}", path.display(), err);
                }
            }
        }
        log::warn!("no overlay font found; counts will not be drawn on frames");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(
        &self,
        frame: &mut RgbImage,
        center_y: i32,
        blob: Option<&Blob>,
        counts: Counts,
    ) {
        let right = frame.width().saturating_sub(1) as f32;
        for dy in 0..2 {
            let y = (center_y + dy) as f32;
            draw_line_segment_mut(frame, (0.0, y), (right, y), CENTERLINE_COLOR);
        }

        if let Some(blob) = blob {
            let bbox = blob.bbox;
            draw_hollow_rect_mut(
                frame,
                Rect::at(bbox.x, bbox.y).of_size(bbox.width, bbox.height),
                BLOB_BOX_COLOR,
            );
            if bbox.width > 2 && bbox.height > 2 {
                draw_hollow_rect_mut(
                    frame,
                    Rect::at(bbox.x + 1, bbox.y + 1).of_size(bbox.width - 2, bbox.height - 2),
                    BLOB_BOX_COLOR,
                );
            }
            draw_filled_circle_mut(frame, (blob.cx, blob.cy), CENTROID_RADIUS, CENTROID_COLOR);
        }

        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                TEXT_COLOR,
                TEXT_ORIGIN.0,
                TEXT_ORIGIN.1,
                self.scale,
                font,
                &overlay_text(counts),
            );
        }
    }
}

pub fn overlay_text(counts: Counts) -> String {
    format!("LEAVE {} : ENTER {}", counts.leave, counts.enter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn blob() -> Blob {
        Blob::from_bbox(
            BoundingBox {
                x: 40,
                y: 60,
                width: 30,
                height: 50,
            },
            1500.0,
        )
    }

    #[test]
    fn centerline_spans_full_width() {
        let annotator = FrameAnnotator::new(None);
        let mut frame = RgbImage::new(200, 100);
        annotator.annotate(&mut frame, 50, None, Counts::default());

        assert_eq!(frame.get_pixel(0, 50), &CENTERLINE_COLOR);
        assert_eq!(frame.get_pixel(199, 50), &CENTERLINE_COLOR);
        assert_eq!(frame.get_pixel(199, 51), &CENTERLINE_COLOR);
        assert_eq!(frame.get_pixel(100, 52), &Rgb([0, 0, 0]));
    }

    #[test]
    fn blob_draws_box_and_centroid() {
        let annotator = FrameAnnotator::new(None);
        let mut frame = RgbImage::new(200, 200);
        let blob = blob();
        annotator.annotate(&mut frame, 20, Some(&blob), Counts::default());

        assert_eq!(frame.get_pixel(40, 60), &BLOB_BOX_COLOR);
        assert_eq!(frame.get_pixel(69, 109), &BLOB_BOX_COLOR);
        assert_eq!(frame.get_pixel(41, 61), &BLOB_BOX_COLOR);
        assert_eq!(frame.get_pixel(55, 85), &CENTROID_COLOR);
        assert_eq!(frame.get_pixel(55, 82), &CENTROID_COLOR);
    }

    #[test]
    fn missing_blob_skips_box() {
        let annotator = FrameAnnotator::new(None);
        let mut frame = RgbImage::new(200, 200);
        annotator.annotate(&mut frame, 20, None, Counts::default());
        assert!(frame.pixels().all(|p| *p != BLOB_BOX_COLOR));
    }

    #[test]
    fn overlay_text_lists_leave_then_enter() {
        let counts = Counts { enter: 3, leave: 7 };
        assert_eq!(overlay_text(counts), "LEAVE 7 : ENTER 3");
    }

    #[test]
    fn unreadable_font_path_falls_back_to_no_text() {
        let annotator = FrameAnnotator::load(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!annotator.has_font());
    }
}
