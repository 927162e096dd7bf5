use std::path::PathBuf;

/// Stream properties needed to write an output video matching its source.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Frames per second rounded for encoder time bases, falling back to 30
    /// when the container does not report a usable rate.
    pub fn integral_fps(&self) -> i32 {
        let fps = self.fps.round() as i32;
        if fps <= 0 {
            30
        } else {
            fps
        }
    }

    /// Same stream with different frame dimensions.
    pub fn with_size(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn meta(fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: 1920,
            height: 1080,
            fps,
            total_frames: 900,
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        }
    }

    #[rstest]
    #[case::exact(30.0, 30)]
    #[case::ntsc(29.97, 30)]
    #[case::cinema(23.976, 24)]
    #[case::unknown(0.0, 30)]
    #[case::negative(-1.0, 30)]
    fn test_integral_fps(#[case] fps: f64, #[case] expected: i32) {
        assert_eq!(meta(fps).integral_fps(), expected);
    }

    #[test]
    fn test_with_size_keeps_other_fields() {
        let resized = meta(25.0).with_size(640, 640);
        assert_eq!((resized.width, resized.height), (640, 640));
        assert_eq!(resized.fps, 25.0);
        assert_eq!(resized.total_frames, 900);
        assert_eq!(resized.source_path, Some(PathBuf::from("/tmp/test.mp4")));
    }
}
