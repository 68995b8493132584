use crate::shared::region::Region;

/// One top-level detection and any secondary regions found inside it.
///
/// `children` are already in full-frame coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection {
    pub region: Region,
    pub children: Vec<Region>,
}

impl Detection {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            children: Vec::new(),
        }
    }

    pub fn with_children(region: Region, children: Vec<Region>) -> Self {
        Self { region, children }
    }
}

/// Everything found in one frame during one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionResult {
    pub model: String,
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(model: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            model: model.into(),
            detections,
        }
    }

    pub fn from_regions(model: impl Into<String>, regions: Vec<Region>) -> Self {
        Self::new(model, regions.into_iter().map(Detection::new).collect())
    }

    /// Number of top-level detections. Secondary regions are not counted.
    pub fn count(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.detections.iter().map(|d| &d.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_children() {
        let result = DetectionResult::new(
            "faces",
            vec![
                Detection::with_children(
                    Region::new(0, 0, 10, 10),
                    vec![Region::new(1, 1, 2, 2), Region::new(5, 1, 2, 2)],
                ),
                Detection::new(Region::new(20, 20, 10, 10)),
            ],
        );
        assert_eq!(result.count(), 2);
    }

    #[test]
    fn test_empty_result() {
        let result = DetectionResult::from_regions("faces", vec![]);
        assert!(result.is_empty());
        assert_eq!(result.count(), 0);
        assert_eq!(result.model, "faces");
    }

    #[test]
    fn test_regions_keep_detector_order() {
        let a = Region::new(30, 0, 5, 5);
        let b = Region::new(0, 0, 5, 5);
        let result = DetectionResult::from_regions("faces", vec![a, b]);
        let regions: Vec<_> = result.regions().copied().collect();
        assert_eq!(regions, vec![a, b]);
    }
}
