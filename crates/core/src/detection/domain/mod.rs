pub mod detection_mode;
pub mod detection_params;
pub mod detection_result;
pub mod object_detector;
