use image::codecs::jpeg::JpegEncoder;

use crate::encoding::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::shared::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_TRANSMIT_HEIGHT, DEFAULT_TRANSMIT_WIDTH,
};
use crate::shared::frame::Frame;

/// Downscales to the transmit size, then JPEG-encodes.
pub struct JpegFrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSMIT_WIDTH, DEFAULT_TRANSMIT_HEIGHT, DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError::EmptyFrame);
        }
        let resized = if frame.width() == self.width && frame.height() == self.height {
            frame.to_rgb_image()
        } else {
            frame
                .resized(self.width, self.height)
                .and_then(|f| f.to_rgb_image())
        };
        let image = resized.ok_or(EncodeError::UnsupportedChannels(frame.channels()))?;

        let mut buf = Vec::with_capacity((self.width * self.height / 4) as usize);
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        encoder.encode_image(&image)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, channels: u8) -> Frame {
        let data = vec![90u8; (width * height * channels as u32) as usize];
        Frame::new(data, width, height, channels, 0)
    }

    #[test]
    fn test_output_is_jpeg_at_transmit_size() {
        let bytes = JpegFrameEncoder::default().encode(&frame(640, 480, 3)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        // Noisy content so quality actually matters
        let data: Vec<u8> = (0..320 * 240 * 3).map(|i| (i * 7919 % 251) as u8).collect();
        let noisy = Frame::new(data, 320, 240, 3, 0);
        let high = JpegFrameEncoder::new(320, 240, 95).encode(&noisy).unwrap();
        let low = JpegFrameEncoder::new(320, 240, 20).encode(&noisy).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_rejects_empty_frame() {
        let err = JpegFrameEncoder::default().encode(&frame(0, 0, 3)).unwrap_err();
        assert!(matches!(err, EncodeError::EmptyFrame));
    }

    #[test]
    fn test_rejects_non_rgb_frame() {
        let err = JpegFrameEncoder::default().encode(&frame(64, 48, 1)).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedChannels(1)));
    }
}
