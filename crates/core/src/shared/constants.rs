pub const MODEL_NAME: &str = "best.onnx";

/// Where training writes the exported model, relative to the working directory.
pub const BUNDLED_MODEL_DIR: &str = "runs/detect/train/weights";

/// Class ids emitted by the mask model.
pub const MASK_CLASS_ID: u32 = 0;
pub const NO_MASK_CLASS_ID: u32 = 1;

pub const ALERT_BEEP: &str = "beep";
pub const ALERT_HIGH_RISK: &str = "HIGH_RISK_MODE";
pub const ALERT_NORMAL: &str = "NORMAL_MODE";

pub const DEFAULT_CAMERA_INDICES: &[u32] = &[0, 1, 2];
pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

pub const DEFAULT_TRANSMIT_WIDTH: u32 = 320;
pub const DEFAULT_TRANSMIT_HEIGHT: u32 = 240;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
