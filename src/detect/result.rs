use serde::Serialize;

/// Axis-aligned bounding rectangle in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Center of the rectangle, truncated to whole pixels.
    pub fn centroid(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

/// The single motion region selected for a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Blob {
    pub bbox: BoundingBox,
    pub cx: i32,
    pub cy: i32,
    pub area: f64,
}

impl Blob {
    pub fn from_bbox(bbox: BoundingBox, area: f64) -> Self {
        let (cx, cy) = bbox.centroid();
        Self { bbox, cx, cy, area }
    }
}
