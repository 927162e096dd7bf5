use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no capture source available: {0}")]
    Unavailable(String),
    #[error("capture source is not open")]
    NotOpen,
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("end of stream")]
    EndOfStream,
}

/// A live or recorded frame supplier.
///
/// The streaming loop owns exactly one source, opens it lazily, pulls one
/// frame per iteration and releases it on shutdown. `release` must be safe
/// to call on a source that is not open.
pub trait CaptureSource: Send {
    fn open(&mut self) -> Result<(), CaptureError>;

    fn read(&mut self) -> Result<Frame, CaptureError>;

    fn release(&mut self);

    fn is_open(&self) -> bool;
}
