use crate::detection::domain::detection_mode::DetectionMode;
use crate::detection::domain::detection_result::DetectionResult;
use crate::shared::frame::{Frame, PixelFormat, CHANNELS};
use crate::shared::region::Region;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const BLUE: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn to_pixel(self, format: PixelFormat) -> [u8; CHANNELS] {
        match format {
            PixelFormat::Bgr => [self.b, self.g, self.r],
            PixelFormat::Rgb => [self.r, self.g, self.b],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Outline of the region itself.
    Rectangle,
    /// Ellipse inscribed in the region.
    Ellipse,
    /// Circle at the region center, radius `round((w + h) / 4)`.
    Circle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayStyle {
    pub shape: Shape,
    pub color: Color,
    pub thickness: u32,
}

impl OverlayStyle {
    /// Single-cascade detections.
    pub const GENERIC: OverlayStyle = OverlayStyle {
        shape: Shape::Rectangle,
        color: Color::RED,
        thickness: 1,
    };
    /// Faces in nested mode.
    pub const PRIMARY: OverlayStyle = OverlayStyle {
        shape: Shape::Ellipse,
        color: Color::MAGENTA,
        thickness: 4,
    };
    /// Eyes in nested mode.
    pub const SECONDARY: OverlayStyle = OverlayStyle {
        shape: Shape::Circle,
        color: Color::BLUE,
        thickness: 4,
    };
}

/// Draws `region` onto `frame` in place. Anything outside the frame is clipped.
pub fn draw_region(frame: &mut Frame, region: &Region, style: &OverlayStyle) {
    let thickness = style.thickness.max(1) as i64;
    match style.shape {
        Shape::Rectangle => draw_rectangle(frame, region, style.color, thickness),
        Shape::Ellipse => {
            let axes = (region.width as f64 / 2.0, region.height as f64 / 2.0);
            draw_ellipse(frame, center(region), axes, style.color, thickness);
        }
        Shape::Circle => {
            let r = circle_radius(region) as f64;
            draw_ellipse(frame, center(region), (r, r), style.color, thickness);
        }
    }
}

/// Radius used for secondary detections.
pub fn circle_radius(region: &Region) -> i32 {
    let radius = ((region.width as i64 + region.height as i64) as f64 * 0.25).round();
    radius.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Moves a region found inside `parent`'s sub-frame into frame coordinates.
pub fn translate(child: &Region, parent: &Region) -> Region {
    child.translate(parent)
}

/// Status line for one cycle, counting top-level detections only.
pub fn summarize(result: &DetectionResult) -> String {
    format!("{} faces detected", result.count())
}

/// Draws every detection in `result` as `mode` prescribes and returns the
/// status line. A result with no detections leaves the frame untouched.
pub fn annotate(frame: &mut Frame, result: &DetectionResult, mode: DetectionMode) -> String {
    for detection in &result.detections {
        match mode {
            DetectionMode::Single => draw_region(frame, &detection.region, &OverlayStyle::GENERIC),
            DetectionMode::Nested => {
                draw_region(frame, &detection.region, &OverlayStyle::PRIMARY);
                for child in &detection.children {
                    draw_region(frame, child, &OverlayStyle::SECONDARY);
                }
            }
        }
    }
    summarize(result)
}

// Geometry below runs in i64 so adapter output near the i32 limits cannot
// overflow; loop bounds are clamped to the frame first.

fn center(region: &Region) -> (i64, i64) {
    (
        region.x as i64 + region.width as i64 / 2,
        region.y as i64 + region.height as i64 / 2,
    )
}

fn put_pixel(frame: &mut Frame, x: i64, y: i64, px: &[u8; CHANNELS]) {
    if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
        return;
    }
    let offset = (y as usize * frame.width() as usize + x as usize) * CHANNELS;
    frame.data_mut()[offset..offset + CHANNELS].copy_from_slice(px);
}

/// Outline with corners at (x, y) and (x + w - 1, y + h - 1); thicker
/// strokes grow symmetrically around that outline.
fn draw_rectangle(frame: &mut Frame, region: &Region, color: Color, thickness: i64) {
    let px = color.to_pixel(frame.format());
    let max_x = frame.width() as i64 - 1;
    let max_y = frame.height() as i64 - 1;
    let x1 = region.x as i64;
    let y1 = region.y as i64;
    let x2 = x1 + region.width as i64 - 1;
    let y2 = y1 + region.height as i64 - 1;
    let lo = -(thickness / 2);
    let hi = lo + thickness - 1;

    let (x_start, x_end) = ((x1 - hi).max(0), (x2 + hi).min(max_x));
    let (y_start, y_end) = ((y1 - hi).max(0), (y2 + hi).min(max_y));

    for d in lo..=hi {
        for x in x_start..=x_end {
            put_pixel(frame, x, y1 + d, &px);
            put_pixel(frame, x, y2 + d, &px);
        }
        for y in y_start..=y_end {
            put_pixel(frame, x1 + d, y, &px);
            put_pixel(frame, x2 + d, y, &px);
        }
    }
}

/// Elliptical ring of width `thickness` centered on the nominal outline.
fn draw_ellipse(
    frame: &mut Frame,
    center: (i64, i64),
    axes: (f64, f64),
    color: Color,
    thickness: i64,
) {
    let px = color.to_pixel(frame.format());
    let half = thickness as f64 / 2.0;
    let (outer_a, outer_b) = (axes.0 + half, axes.1 + half);
    let (inner_a, inner_b) = (axes.0 - half, axes.1 - half);
    let hollow = inner_a > 0.0 && inner_b > 0.0;

    let reach_x = outer_a.ceil() as i64;
    let reach_y = outer_b.ceil() as i64;
    let y_start = (center.1 - reach_y).max(0);
    let y_end = (center.1 + reach_y).min(frame.height() as i64 - 1);
    let x_start = (center.0 - reach_x).max(0);
    let x_end = (center.0 + reach_x).min(frame.width() as i64 - 1);

    for y in y_start..=y_end {
        let dy = (y - center.1) as f64;
        for x in x_start..=x_end {
            let dx = (x - center.0) as f64;
            let outer = (dx / outer_a).powi(2) + (dy / outer_b).powi(2);
            if outer > 1.0 {
                continue;
            }
            if hollow && (dx / inner_a).powi(2) + (dy / inner_b).powi(2) < 1.0 {
                continue;
            }
            put_pixel(frame, x, y, &px);
        }
    }
}
