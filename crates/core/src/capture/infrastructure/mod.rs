#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_camera;
pub mod image_sequence_source;
#[cfg(feature = "opencv")]
pub mod opencv_camera;
