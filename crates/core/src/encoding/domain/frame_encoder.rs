use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode frame with {0} channels")]
    UnsupportedChannels(u8),
    #[error("cannot encode empty frame")]
    EmptyFrame,
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns an annotated frame into the bytes pushed to viewers.
pub trait FrameEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError>;
}
