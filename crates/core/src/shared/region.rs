/// An axis-aligned detection rectangle in a frame's pixel coordinates.
///
/// Regions produced by detectors are clipped to the searched area, so
/// `x`/`y` are non-negative and `width`/`height` positive. Secondary
/// detections start out relative to their parent's sub-frame and must go
/// through [`Region::translate`] before being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Re-expresses a region found inside `parent`'s sub-frame in the
    /// coordinate space `parent` itself lives in.
    pub fn translate(&self, parent: &Region) -> Region {
        Region {
            x: parent.x.saturating_add(self.x),
            y: parent.y.saturating_add(self.y),
            width: self.width,
            height: self.height,
        }
    }

    /// Intersection with a `width` x `height` frame, or `None` if nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.x.saturating_add(self.width).min(width as i32);
        let y2 = self.y.saturating_add(self.height).min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && self.x as i64 + self.width as i64 <= width as i64
            && self.y as i64 + self.height as i64 <= height as i64
    }

    /// Integer center, rounding half-sizes down.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }
}
