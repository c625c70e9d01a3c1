use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::config::CounterConfig;
use crate::detect::result::{Blob, BoundingBox};

/// Background-difference motion detector.
///
/// Thresholds a difference image, dilates the mask to merge fragments, and picks the
/// single largest external contour above the configured area limits.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    diff_threshold: u8,
    dilate_iterations: u8,
    hard_min_area: f64,
}

impl MotionDetector {
    pub fn new(cfg: &CounterConfig) -> Self {
        Self {
            diff_threshold: cfg.diff_threshold,
            dilate_iterations: cfg.dilate_iterations,
            hard_min_area: cfg.hard_min_area,
        }
    }

    /// Run detection on a difference image.
    ///
    /// A contour is selected only if its area strictly exceeds `min_area` and is not
    /// below the hard floor. Equal areas keep the first contour seen.
    pub fn detect(&self, difference: &GrayImage, min_area: f64) -> Option<Blob> {
        let mask = self.motion_mask(difference);
        let contours = external_contours(&mask);
        log::trace!("motion mask produced {} external contours", contours.len());
        self.select_blob(&contours, min_area)
    }

    /// Binary mask of pixels strictly above the threshold, dilated.
    pub fn motion_mask(&self, difference: &GrayImage) -> GrayImage {
        let mut mask = difference.clone();
        for pixel in mask.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > self.diff_threshold {
                255
            } else {
                0
            };
        }
        if self.dilate_iterations == 0 {
            return mask;
        }
        // n passes of a 3x3 square element equal one pass at L-inf radius n.
        dilate(&mask, Norm::LInf, self.dilate_iterations)
    }

    /// Pick the largest qualifying contour in traversal order.
    pub fn select_blob(&self, contours: &[Contour<i32>], min_area: f64) -> Option<Blob> {
        let mut biggest_area = min_area;
        let mut selected: Option<(&Contour<i32>, f64)> = None;

        for contour in contours {
            let area = contour_area(contour);
            if area < self.hard_min_area {
                continue;
            }
            if area > biggest_area {
                biggest_area = area;
                selected = Some((contour, area));
            }
        }

        let (contour, area) = selected?;
        let bbox = bounding_box(contour)?;
        Some(Blob::from_bbox(bbox, area))
    }
}

/// Outer borders that are not nested inside another component.
///
/// The mask is traced inside a 1 px zero frame so regions touching the image edge
/// still get an outer border; points are shifted back to mask coordinates.
fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut padded, mask, 1, 1);
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|mut c| {
            for p in c.points.iter_mut() {
                p.x -= 1;
                p.y -= 1;
            }
            c
        })
        .collect()
}

/// Polygon area of the contour's boundary points (shoelace formula).
pub fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Inclusive pixel bounds of the contour.
pub fn bounding_box(contour: &Contour<i32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}
