use std::ops::AddAssign;

use crate::detection::domain::detection::{Detection, MaskClass};

/// Per-frame tally of known classes. Unknown classes are not counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    pub masked: u32,
    pub unmasked: u32,
}

impl FrameCounts {
    pub fn new(masked: u32, unmasked: u32) -> Self {
        Self { masked, unmasked }
    }

    pub fn tally(detections: &[Detection]) -> Self {
        detections
            .iter()
            .fold(Self::default(), |mut counts, det| {
                match det.class() {
                    MaskClass::Mask => counts.masked += 1,
                    MaskClass::NoMask => counts.unmasked += 1,
                    MaskClass::Unknown(_) => {}
                }
                counts
            })
    }

    pub fn has_violation(&self) -> bool {
        self.unmasked > 0
    }
}

impl AddAssign for FrameCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.masked = self.masked.saturating_add(rhs.masked);
        self.unmasked = self.unmasked.saturating_add(rhs.unmasked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;

    fn det(class_id: u32) -> Detection {
        Detection::new(class_id, 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn test_tally_ignores_unknown_classes() {
        let counts = FrameCounts::tally(&[det(0), det(1), det(1), det(5)]);
        assert_eq!(counts, FrameCounts::new(1, 2));
        assert!(counts.has_violation());
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(FrameCounts::tally(&[]), FrameCounts::default());
    }

    #[test]
    fn test_add_assign_accumulates() {
        let mut total = FrameCounts::new(1, 0);
        total += FrameCounts::new(2, 3);
        assert_eq!(total, FrameCounts::new(3, 3));
    }
}
