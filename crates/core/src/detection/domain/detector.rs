use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for the object detector.
///
/// An empty frame yields an empty list, never an error. Implementations
/// may keep inference state between calls, hence `&mut self`.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
