mod motion;
mod result;

pub use motion::{bounding_box, contour_area, MotionDetector};
pub use result::{Blob, BoundingBox};
