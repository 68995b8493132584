use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;

use crate::capture::domain::capture_source::{CaptureError, CaptureSource, DeviceSelector};
use crate::shared::constants::MAX_DEVICE_PROBE;
use crate::shared::frame::{Frame, PixelFormat};

#[cfg(target_os = "linux")]
const DEVICE_FORMATS: &[&str] = &["video4linux2", "v4l2"];
#[cfg(target_os = "macos")]
const DEVICE_FORMATS: &[&str] = &["avfoundation"];
#[cfg(target_os = "windows")]
const DEVICE_FORMATS: &[&str] = &["dshow"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEVICE_FORMATS: &[&str] = &[];

/// Captures frames from a local camera through libavdevice (ffmpeg-next).
///
/// Decoded frames are converted to BGR24 so the rest of the pipeline sees the
/// same encoding regardless of what the camera delivers (MJPEG, YUYV, ...).
pub struct FfmpegCamera {
    device: Option<OpenDevice>,
    frame_index: usize,
}

struct OpenDevice {
    name: String,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegCamera is owned by the producer thread for its whole run.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self {
            device: None,
            frame_index: 0,
        }
    }

    fn open_path(name: &str) -> Result<OpenDevice, Box<dyn std::error::Error>> {
        let format = ffmpeg_next::device::input::video()
            .find(|f| {
                f.name()
                    .split(',')
                    .any(|n| DEVICE_FORMATS.contains(&n.trim()))
            })
            .ok_or("no camera input format compiled into libavdevice")?;

        let ctx = ffmpeg_next::format::open_with(
            name,
            &ffmpeg_next::format::Format::Input(format),
            ffmpeg_next::Dictionary::new(),
        )?;
        let ictx = match ctx {
            ffmpeg_next::format::context::Context::Input(input) => input,
            ffmpeg_next::format::context::Context::Output(_) => {
                return Err("device opened as an output".into())
            }
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("device exposes no video stream")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::BGR24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(OpenDevice {
            name: name.to_string(),
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        })
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Device URL for a numeric camera index on this platform.
fn device_name(index: u32) -> String {
    if cfg!(target_os = "linux") {
        format!("/dev/video{index}")
    } else if cfg!(target_os = "macos") {
        format!("{index}:none")
    } else {
        index.to_string()
    }
}

fn candidates(selector: &DeviceSelector) -> Vec<String> {
    match selector {
        DeviceSelector::Any => (0..MAX_DEVICE_PROBE).map(device_name).collect(),
        DeviceSelector::Index(i) => vec![device_name(*i)],
        DeviceSelector::Path(p) => vec![path_string(p)],
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl CaptureSource for FfmpegCamera {
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::unavailable(selector, e.to_string()))?;
        ffmpeg_next::device::register_all();

        let mut last_error = String::from("no candidate devices");
        for name in candidates(selector) {
            match Self::open_path(&name) {
                Ok(device) => {
                    log::info!(
                        "Opened camera {} ({}x{})",
                        device.name,
                        device.width,
                        device.height
                    );
                    self.device = Some(device);
                    self.frame_index = 0;
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("Camera {name} did not open: {e}");
                    last_error = e.to_string();
                }
            }
        }

        Err(CaptureError::unavailable(selector, last_error))
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| CaptureError::DeviceLost("camera is not open".into()))?;

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut device.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(CaptureError::DeviceLost(format!(
                        "{} stopped producing data",
                        device.name
                    )))
                }
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                    return Err(CaptureError::Timeout)
                }
                Err(e) => return Err(CaptureError::DeviceLost(e.to_string())),
            }

            if packet.stream() != device.stream_index {
                continue;
            }

            if let Err(e) = device.decoder.send_packet(&packet) {
                return Err(CaptureError::FrameDropped(e.to_string()));
            }

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if device.decoder.receive_frame(&mut decoded).is_err() {
                // Decoder wants more packets before it can emit a picture.
                continue;
            }
            if decoded.width() == 0 || decoded.height() == 0 {
                return Err(CaptureError::EmptyFrame);
            }

            let mut bgr = ffmpeg_next::util::frame::video::Video::empty();
            device
                .scaler
                .run(&decoded, &mut bgr)
                .map_err(|e| CaptureError::FrameDropped(e.to_string()))?;

            let pixels = extract_packed_pixels(&bgr, device.width, device.height);
            let frame = Frame::new(
                pixels,
                device.width,
                device.height,
                PixelFormat::Bgr,
                self.frame_index,
            );
            self.frame_index += 1;
            return Ok(frame);
        }
    }

    fn close(&mut self) {
        if let Some(device) = self.device.take() {
            log::info!("Closed camera {}", device.name);
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn describe(&self) -> String {
        match &self.device {
            Some(d) => format!("camera {} ({}x{})", d.name, d.width, d.height),
            None => "camera (closed)".to_string(),
        }
    }
}

/// Copies a packed 3-byte-per-pixel plane, dropping the row padding ffmpeg adds.
fn extract_packed_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
