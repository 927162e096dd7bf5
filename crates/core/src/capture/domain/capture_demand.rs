use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag telling the streaming loop whether anyone wants the camera.
///
/// The viewer page raises it on first visit; the loop keeps the capture
/// closed until then. Once raised it stays raised.
#[derive(Clone, Debug)]
pub struct CaptureDemand {
    requested: Arc<AtomicBool>,
}

impl CaptureDemand {
    /// Capture waits for the first `request`.
    pub fn on_demand() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capture opens as soon as the loop starts.
    pub fn immediate() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `true` only for the call that flipped the flag.
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
