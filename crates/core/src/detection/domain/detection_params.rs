/// Multi-scale search parameters shared by every detector backend.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionParams {
    /// Ratio between successive pyramid levels. Must be greater than 1.
    pub scale_factor: f64,
    /// Overlapping candidate windows required to keep a detection.
    pub min_neighbors: u32,
    /// Smallest object size searched for, as (width, height).
    pub min_size: (u32, u32),
    pub max_size: Option<(u32, u32)>,
}

pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const DEFAULT_MIN_SIZE: (u32, u32) = (30, 30);

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_SIZE,
            max_size: None,
        }
    }
}

impl DetectionParams {
    pub fn validate(&self) -> Result<(), String> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(format!(
                "Scale factor must be greater than 1.0, got {}",
                self.scale_factor
            ));
        }
        if self.min_size.0 == 0 || self.min_size.1 == 0 {
            return Err(format!(
                "Minimum size must be non-zero, got {}x{}",
                self.min_size.0, self.min_size.1
            ));
        }
        if let Some((max_w, max_h)) = self.max_size {
            if max_w < self.min_size.0 || max_h < self.min_size.1 {
                return Err(format!(
                    "Maximum size {max_w}x{max_h} is smaller than minimum size {}x{}",
                    self.min_size.0, self.min_size.1
                ));
            }
        }
        Ok(())
    }
}
