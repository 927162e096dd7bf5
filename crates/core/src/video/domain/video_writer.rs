use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for annotated frames in offline mode.
pub trait VideoWriter: Send {
    /// Creates the output container sized from `metadata`.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Finishes the container. Calling it on a writer that was never opened is a no-op.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
