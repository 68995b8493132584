use std::path::Path;

use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::object_detector::{ModelLoadError, ObjectDetector};
use crate::detection::infrastructure::seetaface_detector::SeetaFaceDetector;

/// Model container formats this crate knows how to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    /// SeetaFace funnel cascade (`.bin`), loaded with rustface.
    SeetaFace,
    /// OpenCV Haar/LBP cascade (`.xml`).
    OpenCvCascade,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bin" => Some(ModelFormat::SeetaFace),
            "xml" => Some(ModelFormat::OpenCvCascade),
            _ => None,
        }
    }
}

/// Loads the model at `path` with the backend matching its file extension.
pub fn create_detector(
    path: &Path,
    params: DetectionParams,
) -> Result<Box<dyn ObjectDetector>, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }

    match ModelFormat::from_path(path) {
        Some(ModelFormat::SeetaFace) => Ok(Box::new(SeetaFaceDetector::load(path, params)?)),
        Some(ModelFormat::OpenCvCascade) => load_cascade(path, params),
        None => Err(ModelLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "expected a .bin SeetaFace model or an .xml cascade".into(),
        }),
    }
}

#[cfg(feature = "opencv")]
fn load_cascade(
    path: &Path,
    params: DetectionParams,
) -> Result<Box<dyn ObjectDetector>, ModelLoadError> {
    use crate::detection::infrastructure::opencv_cascade_detector::CascadeClassifierDetector;
    Ok(Box::new(CascadeClassifierDetector::load(path, params)?))
}

#[cfg(not(feature = "opencv"))]
fn load_cascade(
    path: &Path,
    _params: DetectionParams,
) -> Result<Box<dyn ObjectDetector>, ModelLoadError> {
    Err(ModelLoadError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: "XML cascades need the `opencv` feature".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[rstest]
    #[case("face.bin", Some(ModelFormat::SeetaFace))]
    #[case("FACE.BIN", Some(ModelFormat::SeetaFace))]
    #[case("haarcascade_eye.xml", Some(ModelFormat::OpenCvCascade))]
    #[case("model.onnx", None)]
    #[case("no_extension", None)]
    fn test_format_from_extension(#[case] name: &str, #[case] expected: Option<ModelFormat>) {
        assert_eq!(ModelFormat::from_path(&PathBuf::from(name)), expected);
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let result = create_detector(Path::new("/nonexistent/face.xml"), DetectionParams::default());
        assert!(matches!(result, Err(ModelLoadError::NotFound(_))));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.onnx");
        fs::write(&path, b"onnx").unwrap();

        let result = create_detector(&path, DetectionParams::default());
        assert!(matches!(result, Err(ModelLoadError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_bin_dispatches_to_seetaface() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("face.bin");
        fs::write(&path, b"bad").unwrap();

        let result = create_detector(&path, DetectionParams::default());
        assert!(matches!(result, Err(ModelLoadError::Malformed { .. })));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_xml_without_opencv_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("haarcascade_frontalface_default.xml");
        fs::write(&path, "<opencv_storage/>").unwrap();

        let result = create_detector(&path, DetectionParams::default());
        assert!(matches!(result, Err(ModelLoadError::UnsupportedFormat { .. })));
    }
}
