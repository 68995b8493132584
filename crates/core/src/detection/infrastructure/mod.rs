pub mod detector_factory;
#[cfg(feature = "opencv")]
pub mod opencv_cascade_detector;
pub mod seetaface_detector;
