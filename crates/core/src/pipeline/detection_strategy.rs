use crate::annotation::domain::annotator::translate;
use crate::detection::domain::detection_mode::DetectionMode;
use crate::detection::domain::detection_result::{Detection, DetectionResult};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::frame::Frame;

/// The detectors a run uses and how they are combined each cycle.
pub struct DetectionStrategy {
    mode: DetectionMode,
    primary: Box<dyn ObjectDetector>,
    secondary: Option<Box<dyn ObjectDetector>>,
}

impl DetectionStrategy {
    pub fn single(primary: Box<dyn ObjectDetector>) -> Self {
        Self {
            mode: DetectionMode::Single,
            primary,
            secondary: None,
        }
    }

    /// `secondary` runs inside every region `primary` finds.
    pub fn nested(primary: Box<dyn ObjectDetector>, secondary: Box<dyn ObjectDetector>) -> Self {
        Self {
            mode: DetectionMode::Nested,
            primary,
            secondary: Some(secondary),
        }
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    pub fn detect(&mut self, frame: &Frame) -> DetectionResult {
        let faces = self.primary.detect(frame, None);

        let detections = match self.secondary.as_mut() {
            Some(secondary) => faces
                .into_iter()
                .map(|face| {
                    let eyes = secondary
                        .detect(frame, Some(&face))
                        .iter()
                        .map(|eye| translate(eye, &face))
                        .collect();
                    Detection::with_children(face, eyes)
                })
                .collect(),
            None => faces.into_iter().map(Detection::new).collect(),
        };

        DetectionResult::new(self.primary.model_name(), detections)
    }

    pub fn release(&mut self) {
        self.primary.release();
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.release();
        }
    }
}
