use std::fs;
use std::path::{Path, PathBuf};

use crate::presentation::domain::frame_sink::FrameSink;
use crate::shared::frame::Frame;

/// Keeps an image file on disk showing the most recent annotated frame.
///
/// Each write goes to a sibling temp file that is renamed over the target,
/// so viewers polling the file never see a half-written image.
pub struct SnapshotSink {
    path: PathBuf,
    every: usize,
    seen: usize,
    written: usize,
}

impl SnapshotSink {
    /// The image format follows `path`'s extension.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            every: 1,
            seen: 0,
            written: 0,
        }
    }

    /// Only write every `n`th presented frame.
    pub fn every(mut self, n: usize) -> Self {
        self.every = n.max(1);
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: &Frame, _summary: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.seen += 1;
        if (self.seen - 1) % self.every != 0 {
            return Ok(());
        }

        let rgb = frame.to_rgb();
        let img = image::RgbImage::from_raw(rgb.width(), rgb.height(), rgb.data().to_vec())
            .ok_or("Frame buffer does not match its dimensions")?;

        let format = image::ImageFormat::from_path(&self.path)?;
        let temp = self.temp_path();
        img.save_with_format(&temp, format)?;
        fs::rename(&temp, &self.path)?;

        self.written += 1;
        Ok(())
    }
}
