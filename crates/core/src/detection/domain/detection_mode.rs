use std::fmt;
use std::str::FromStr;

/// How many cascades run per cycle and how their results are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionMode {
    /// One cascade over the whole frame; results drawn as rectangles.
    #[default]
    Single,
    /// Faces over the whole frame, then eyes inside every face; faces drawn
    /// as ellipses and eyes as circles.
    Nested,
}

impl DetectionMode {
    pub fn needs_secondary(&self) -> bool {
        matches!(self, DetectionMode::Nested)
    }
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(DetectionMode::Single),
            "nested" => Ok(DetectionMode::Nested),
            other => Err(format!("Mode must be 'single' or 'nested', got '{other}'")),
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Single => write!(f, "single"),
            DetectionMode::Nested => write!(f, "nested"),
        }
    }
}
