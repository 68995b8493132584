use ndarray::{s, ArrayView3, ArrayViewMut3};

use crate::shared::region::Region;

/// Channel order of a frame's pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr,
    Rgb,
}

/// A single captured frame: contiguous 3-channel bytes in row-major order.
///
/// Capture sources normalize to [`PixelFormat::Bgr`]; conversion to other
/// encodings happens only at presentation boundaries via [`Frame::to_rgb`].
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    /// A frame filled with a single color, given as (r, g, b).
    pub fn filled(width: u32, height: u32, format: PixelFormat, rgb: (u8, u8, u8)) -> Self {
        let px = match format {
            PixelFormat::Bgr => [rgb.2, rgb.1, rgb.0],
            PixelFormat::Rgb => [rgb.0, rgb.1, rgb.2],
        };
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height, format, 0)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Capture sequence number assigned by the source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Pixel at (x, y) as (r, g, b), regardless of storage order.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = &self.data[offset..offset + CHANNELS];
        Some(match self.format {
            PixelFormat::Bgr => (px[2], px[1], px[0]),
            PixelFormat::Rgb => (px[0], px[1], px[2]),
        })
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the part of the frame covered by `region`, clipped to bounds.
    ///
    /// Returns `None` when the region does not overlap the frame.
    pub fn crop(&self, region: &Region) -> Option<Frame> {
        let clipped = region.clip_to(self.width, self.height)?;
        let x = clipped.x as usize;
        let y = clipped.y as usize;
        let w = clipped.width as usize;
        let h = clipped.height as usize;

        let view = self.as_ndarray();
        let sub = view.slice(s![y..y + h, x..x + w, ..]);
        let data: Vec<u8> = sub.iter().copied().collect();

        Some(Frame::new(data, w as u32, h as u32, self.format, self.index))
    }

    /// Luma plane (BT.601 weights) for detector backends that work on gray images.
    pub fn to_grayscale(&self) -> Vec<u8> {
        let (ri, bi) = match self.format {
            PixelFormat::Bgr => (2, 0),
            PixelFormat::Rgb => (0, 2),
        };
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| {
                let luma =
                    0.299 * px[ri] as f32 + 0.587 * px[1] as f32 + 0.114 * px[bi] as f32;
                luma.round().min(255.0) as u8
            })
            .collect()
    }

    /// Converts to RGB channel order, copying only when a swap is needed.
    pub fn to_rgb(&self) -> Frame {
        match self.format {
            PixelFormat::Rgb => self.clone(),
            PixelFormat::Bgr => {
                let mut data = self.data.clone();
                for px in data.chunks_exact_mut(CHANNELS) {
                    px.swap(0, 2);
                }
                Frame::new(data, self.width, self.height, PixelFormat::Rgb, self.index)
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}
