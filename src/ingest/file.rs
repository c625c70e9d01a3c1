//! Local image-sequence frame source.
//!
//! Replays the JPEG/PNG files of a local directory in file-name order. Useful for
//! recorded footage exported as stills and for regression runs of the counter.
//!
//! Only local paths are accepted; there is no network access.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::SourceStats;
use crate::error::PipelineError;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    loop_playback: bool,
    frames: Vec<PathBuf>,
    position: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl AsRef<Path>, loop_playback: bool) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(anyhow!("image sequence source requires a directory"));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            loop_playback,
            frames: Vec::new(),
            position: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    /// Index the directory. Fails when it holds no usable frames.
    pub fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("open frame directory {}", self.dir.display()))?;
        let mut frames = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                frames.push(path);
            }
        }
        frames.sort();
        if frames.is_empty() {
            return Err(anyhow!(
                "frame directory {} contains no jpg/png files",
                self.dir.display()
            ));
        }
        log::info!(
            "ImageSequenceSource: connected to {} ({} frames, loop={})",
            self.dir.display(),
            frames.len(),
            self.loop_playback
        );
        self.frames = frames;
        self.position = 0;
        self.last_error = None;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<RgbImage> {
        if self.frames.is_empty() {
            return Err(anyhow!(
                "image sequence {} not connected; call connect() first",
                self.dir.display()
            ));
        }
        if self.position >= self.frames.len() {
            if !self.loop_playback {
                self.last_error = Some("end of sequence".to_string());
                return Err(PipelineError::SourceExhausted {
                    source: self.dir.display().to_string(),
                }
                .into());
            }
            log::debug!("ImageSequenceSource: restarting {}", self.dir.display());
            self.position = 0;
        }

        let path = &self.frames[self.position];
        let frame = image::open(path)
            .with_context(|| format!("decode frame {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?
            .to_rgb8();
        self.position += 1;
        self.frame_count += 1;
        Ok(frame)
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none() && !self.frames.is_empty()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.dir.display().to_string(),
        }
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path, shades: &[u8]) -> Result<()> {
        for (i, shade) in shades.iter().enumerate() {
            let frame = RgbImage::from_pixel(8, 6, Rgb([*shade, *shade, *shade]));
            frame.save(dir.join(format!("frame_{i:03}.png")))?;
        }
        std::fs::write(dir.join("notes.txt"), "not a frame")?;
        Ok(())
    }

    #[test]
    fn frames_replay_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[10, 20, 30])?;

        let mut source = ImageSequenceSource::new(dir.path(), false)?;
        source.connect()?;
        for expected in [10u8, 20, 30] {
            let frame = source.next_frame()?;
            assert_eq!(frame.get_pixel(0, 0).0[0], expected);
        }
        assert_eq!(source.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn end_of_sequence_is_reported_as_exhaustion() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[10])?;

        let mut source = ImageSequenceSource::new(dir.path(), false)?;
        source.connect()?;
        source.next_frame()?;
        let err = source.next_frame().expect_err("sequence is finite");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::SourceExhausted { .. })
        ));
        assert!(!source.is_healthy());
        Ok(())
    }

    #[test]
    fn looping_sequence_restarts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_frames(dir.path(), &[10, 20])?;

        let mut source = ImageSequenceSource::new(dir.path(), true)?;
        source.connect()?;
        source.next_frame()?;
        source.next_frame()?;
        let frame = source.next_frame()?;
        assert_eq!(frame.get_pixel(0, 0).0[0], 10);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = ImageSequenceSource::new(dir.path(), true)?;
        assert!(source.connect().is_err());
        Ok(())
    }
}
