use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::constants::DEFAULT_CAMERA_INDICES;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaptureTarget {
    /// Local camera; indices are probed in order and the first that opens wins.
    Camera { indices: Vec<u32> },
    /// A video file, replayed from the start whenever it runs out.
    File { path: PathBuf },
}

impl CaptureTarget {
    /// Parses a `--source` value: `camera`, `camera:1`, `camera:0,2`, or a path.
    pub fn parse(source: &str) -> Self {
        match source.strip_prefix("camera") {
            Some("") => Self::default(),
            Some(rest) if rest.starts_with(':') => {
                let indices: Vec<u32> = rest[1..]
                    .split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect();
                if indices.is_empty() {
                    Self::default()
                } else {
                    Self::Camera { indices }
                }
            }
            _ => Self::File {
                path: PathBuf::from(source),
            },
        }
    }
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self::Camera {
            indices: DEFAULT_CAMERA_INDICES.to_vec(),
        }
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTarget::Camera { indices } => {
                let list: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
                write!(f, "camera[{}]", list.join(","))
            }
            CaptureTarget::File { path } => write!(f, "file {}", path.display()),
        }
    }
}
