use crate::annotation::domain::frame_counts::FrameCounts;
use crate::shared::constants::{ALERT_BEEP, ALERT_HIGH_RISK, ALERT_NORMAL};

pub const DEFAULT_HIGH_RISK_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertMode {
    #[default]
    Normal,
    HighRisk,
}

/// Something the viewer should be told about, in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertEvent {
    /// Violation onset: the previous frame had no unmasked faces.
    Beep,
    EnteredHighRisk,
    ReturnedToNormal,
}

impl AlertEvent {
    /// Wire text sent to connected viewers.
    pub fn as_message(&self) -> &'static str {
        match self {
            AlertEvent::Beep => ALERT_BEEP,
            AlertEvent::EnteredHighRisk => ALERT_HIGH_RISK,
            AlertEvent::ReturnedToNormal => ALERT_NORMAL,
        }
    }
}

/// Edge-triggered alerting over per-frame counts.
///
/// Events fire only on transitions: a persisting violation beeps once, and
/// mode events are emitted once per mode change.
#[derive(Debug)]
pub struct AlertStateMachine {
    mode: AlertMode,
    last_violation: bool,
    threshold: u32,
}

impl AlertStateMachine {
    pub fn new(threshold: u32) -> Self {
        Self {
            mode: AlertMode::Normal,
            last_violation: false,
            threshold,
        }
    }

    pub fn mode(&self) -> AlertMode {
        self.mode
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn evaluate(&mut self, counts: FrameCounts) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        let violation = counts.has_violation();
        if violation && !self.last_violation {
            events.push(AlertEvent::Beep);
        }
        self.last_violation = violation;

        if counts.unmasked >= self.threshold {
            if self.mode != AlertMode::HighRisk {
                self.mode = AlertMode::HighRisk;
                events.push(AlertEvent::EnteredHighRisk);
            }
        } else if self.mode != AlertMode::Normal {
            self.mode = AlertMode::Normal;
            events.push(AlertEvent::ReturnedToNormal);
        }

        if !events.is_empty() {
            log::debug!(
                "Alert events {events:?} (unmasked {}, mode {:?})",
                counts.unmasked,
                self.mode
            );
        }
        events
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_RISK_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn unmasked(n: u32) -> FrameCounts {
        FrameCounts::new(0, n)
    }

    fn run(machine: &mut AlertStateMachine, sequence: &[u32]) -> Vec<Vec<AlertEvent>> {
        sequence
            .iter()
            .map(|&n| machine.evaluate(unmasked(n)))
            .collect()
    }

    #[test]
    fn test_starts_normal_without_violation() {
        let machine = AlertStateMachine::default();
        assert_eq!(machine.mode(), AlertMode::Normal);
        assert_eq!(machine.threshold(), 2);
    }

    #[rstest]
    #[case::rise_and_fall(
        &[0, 1, 2, 2, 1, 0],
        vec![
            vec![],
            vec![AlertEvent::Beep],
            vec![AlertEvent::EnteredHighRisk],
            vec![],
            vec![AlertEvent::ReturnedToNormal],
            vec![],
        ]
    )]
    #[case::beep_per_violation_episode(
        &[0, 1, 1, 0, 3, 3, 1, 0],
        vec![
            vec![],
            vec![AlertEvent::Beep],
            vec![],
            vec![],
            vec![AlertEvent::Beep, AlertEvent::EnteredHighRisk],
            vec![],
            vec![AlertEvent::ReturnedToNormal],
            vec![],
        ]
    )]
    fn test_event_sequence(#[case] sequence: &[u32], #[case] expected: Vec<Vec<AlertEvent>>) {
        let mut machine = AlertStateMachine::new(2);
        assert_eq!(run(&mut machine, sequence), expected);
        assert_eq!(machine.mode(), AlertMode::Normal);
    }

    #[test]
    fn test_jump_straight_to_high_risk_beeps_first() {
        let mut machine = AlertStateMachine::new(2);
        assert_eq!(
            machine.evaluate(unmasked(5)),
            vec![AlertEvent::Beep, AlertEvent::EnteredHighRisk]
        );
        assert_eq!(machine.mode(), AlertMode::HighRisk);
    }

    #[test]
    fn test_high_risk_to_zero_returns_to_normal_without_beep() {
        let mut machine = AlertStateMachine::new(2);
        machine.evaluate(unmasked(2));
        assert_eq!(
            machine.evaluate(unmasked(0)),
            vec![AlertEvent::ReturnedToNormal]
        );
    }

    #[rstest]
    #[case(&[1, 1, 1, 1])]
    #[case(&[3, 3, 3, 3])]
    #[case(&[0, 0, 0, 0])]
    fn test_steady_regime_is_silent_after_first_frame(#[case] sequence: &[u32]) {
        let mut machine = AlertStateMachine::new(2);
        let events = run(&mut machine, sequence);
        assert!(events[1..].iter().all(|e| e.is_empty()));
    }

    #[test]
    fn test_threshold_one_enters_high_risk_on_single_violation() {
        let mut machine = AlertStateMachine::new(1);
        assert_eq!(
            machine.evaluate(unmasked(1)),
            vec![AlertEvent::Beep, AlertEvent::EnteredHighRisk]
        );
    }

    #[test]
    fn test_masked_faces_never_alert() {
        let mut machine = AlertStateMachine::new(2);
        assert!(machine.evaluate(FrameCounts::new(10, 0)).is_empty());
    }

    #[rstest]
    #[case(AlertEvent::Beep, "beep")]
    #[case(AlertEvent::EnteredHighRisk, "HIGH_RISK_MODE")]
    #[case(AlertEvent::ReturnedToNormal, "NORMAL_MODE")]
    fn test_wire_messages(#[case] event: AlertEvent, #[case] expected: &str) {
        assert_eq!(event.as_message(), expected);
    }
}
