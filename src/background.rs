use anyhow::Result;
use image::{GrayImage, Luma};

use crate::error::PipelineError;

/// One-shot background reference.
///
/// The first grayscale frame handed to `initialize_or_skip` becomes the reference for
/// the lifetime of the model. There is no re-baselining path.
#[derive(Debug, Default)]
pub struct BackgroundModel {
    reference: Option<GrayImage>,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `gray` as the reference if none exists yet.
    ///
    /// Returns `true` when the reference was just captured, meaning motion analysis
    /// must be skipped for this cycle. Later calls return `false` and leave the
    /// reference untouched.
    pub fn initialize_or_skip(&mut self, gray: GrayImage) -> bool {
        if self.reference.is_some() {
            return false;
        }
        log::debug!(
            "background reference captured ({}x{})",
            gray.width(),
            gray.height()
        );
        self.reference = Some(gray);
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    /// Per-pixel absolute difference between the reference and `gray`.
    pub fn diff(&self, gray: &GrayImage) -> Result<GrayImage> {
        let reference = self
            .reference
            .as_ref()
            .ok_or(PipelineError::UninitializedBackground)?;
        if reference.dimensions() != gray.dimensions() {
            return Err(PipelineError::DimensionMismatch {
                expected: reference.dimensions(),
                actual: gray.dimensions(),
            }
            .into());
        }
        Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let a = reference.get_pixel(x, y).0[0];
            let b = gray.get_pixel(x, y).0[0];
            Luma([a.abs_diff(b)])
        }))
    }
}
