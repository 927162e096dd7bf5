/// Admits one captured frame in every `interval`.
///
/// Counting starts at the first captured frame, so with an interval of 3
/// the 3rd, 6th, 9th... frames are admitted.
#[derive(Debug, Clone)]
pub struct FrameDecimator {
    interval: usize,
    frame_count: usize,
}

impl FrameDecimator {
    pub fn new(interval: usize) -> Result<Self, &'static str> {
        if interval < 1 {
            return Err("decimation interval must be >= 1");
        }
        Ok(Self {
            interval,
            frame_count: 0,
        })
    }

    /// Count one captured frame and report whether it should be processed.
    pub fn admit(&mut self) -> bool {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.frame_count % self.interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_rejects_zero_interval() {
        assert!(FrameDecimator::new(0).is_err());
    }

    #[rstest]
    #[case(1, vec![true, true, true, true])]
    #[case(2, vec![false, true, false, true])]
    #[case(3, vec![false, false, true, false, false, true])]
    fn test_admit_pattern(#[case] interval: usize, #[case] expected: Vec<bool>) {
        let mut decimator = FrameDecimator::new(interval).unwrap();
        let admitted: Vec<bool> = expected.iter().map(|_| decimator.admit()).collect();
        assert_eq!(admitted, expected);
    }
}
