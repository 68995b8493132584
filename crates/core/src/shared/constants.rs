pub const FRONTAL_FACE_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const FRONTAL_FACE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

pub const EYE_CASCADE_NAME: &str = "haarcascade_eye.xml";
pub const EYE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_eye.xml";

pub const SEETA_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const SEETA_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

/// Pause between pipeline cycles; doubles as the transient-failure retry delay.
pub const DEFAULT_CYCLE_INTERVAL_MS: u64 = 100;

/// Transient capture failures tolerated in a row before the run is faulted.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 50;

/// Capacity of the producer → presentation hand-off channel.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 4;

/// Device indices tried when opening the "any available" camera.
pub const MAX_DEVICE_PROBE: u32 = 4;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
