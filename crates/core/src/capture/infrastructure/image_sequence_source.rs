use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::domain::capture_source::{CaptureError, CaptureSource, DeviceSelector};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, PixelFormat};

/// Replays a directory of still images as if it were a camera.
///
/// Files are served in file-name order. A file that fails to decode is
/// reported as a dropped frame and skipped on the next call; running out of
/// files ends the stream unless `looping` is set.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    cursor: usize,
    frame_index: usize,
    looping: bool,
    opened: Option<PathBuf>,
}

impl ImageSequenceSource {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            cursor: 0,
            frame_index: 0,
            looping: false,
            opened: None,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Default for ImageSequenceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for ImageSequenceSource {
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), CaptureError> {
        let DeviceSelector::Path(dir) = selector else {
            return Err(CaptureError::unavailable(
                selector,
                "image sequence source needs a directory path",
            ));
        };

        let files = Self::list_images(dir)
            .map_err(|e| CaptureError::unavailable(selector, e.to_string()))?;
        if files.is_empty() {
            return Err(CaptureError::unavailable(
                selector,
                "directory contains no images",
            ));
        }

        log::info!(
            "Replaying {} images from {}",
            files.len(),
            dir.display()
        );
        self.files = files;
        self.cursor = 0;
        self.frame_index = 0;
        self.opened = Some(dir.clone());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.opened.is_none() {
            return Err(CaptureError::DeviceLost("source is not open".into()));
        }
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Err(CaptureError::EndOfStream);
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;

        let img = image::open(path)
            .map_err(|e| CaptureError::FrameDropped(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyFrame);
        }

        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }

        let frame = Frame::new(data, width, height, PixelFormat::Bgr, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(dir) = self.opened.take() {
            log::debug!("Closed image sequence {}", dir.display());
        }
        self.files.clear();
        self.cursor = 0;
    }

    fn is_open(&self) -> bool {
        self.opened.is_some()
    }

    fn describe(&self) -> String {
        match &self.opened {
            Some(dir) => format!("image sequence {}", dir.display()),
            None => "image sequence (closed)".to_string(),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
