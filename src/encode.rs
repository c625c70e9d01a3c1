use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::PipelineError;

/// Serializes an annotated frame for the outgoing stream.
pub trait FrameEncoder: Send {
    /// MIME type of the produced bytes.
    fn content_type(&self) -> &'static str;

    fn encode(&self, frame: &RgbImage) -> Result<Vec<u8>>;
}

/// Baseline JPEG encoder backed by the `image` crate.
#[derive(Clone, Copy, Debug)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn encode(&self, frame: &RgbImage) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(frame.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(frame)
            .map_err(|e| PipelineError::Encoding(e.to_string()))?;
        Ok(out)
    }
}
