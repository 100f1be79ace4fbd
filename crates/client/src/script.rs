use glam::Vec2;
use netsync::client::SLOT_ATTACK;
use netsync::{InputSource, Intent};

const LEG_SECS: f32 = 2.0;
const LEGS: [Vec2; 4] = [Vec2::X, Vec2::Y, Vec2::NEG_X, Vec2::NEG_Y];

/// Headless stand-in for a player: walks a square, pausing at each corner,
/// and turns auto-attack on once.
pub struct ScriptedInput {
    elapsed: f32,
    frame_dt: f32,
    leg: usize,
    stopped: bool,
    attack_requested: bool,
    queued: Option<Intent>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            frame_dt: 0.0,
            leg: 0,
            stopped: false,
            attack_requested: false,
            queued: None,
        }
    }

    /// Advances the script by one frame and queues that frame's intent.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
        self.frame_dt = dt;

        if self.elapsed >= LEG_SECS {
            self.elapsed -= LEG_SECS;
            self.leg = (self.leg + 1) % LEGS.len();
            self.stopped = false;
        }

        // Last fifth of each leg is spent standing still.
        let resting = self.elapsed > LEG_SECS * 0.8;
        self.queued = if resting {
            if self.stopped {
                None
            } else {
                self.stopped = true;
                Some(Intent::Stop)
            }
        } else {
            Some(Intent::Move {
                direction: LEGS[self.leg],
                elapsed: self.frame_dt,
            })
        };
    }
}

impl InputSource for ScriptedInput {
    fn next_intent(&mut self) -> Option<Intent> {
        if !self.attack_requested {
            self.attack_requested = true;
            return Some(Intent::ToggleSlot {
                slot: SLOT_ATTACK.to_string(),
                enabled: true,
            });
        }
        self.queued.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_intent_enables_attack() {
        let mut script = ScriptedInput::new();
        script.advance(0.1);

        assert!(matches!(
            script.next_intent(),
            Some(Intent::ToggleSlot { enabled: true, .. })
        ));
        assert!(matches!(script.next_intent(), Some(Intent::Move { .. })));
        assert_eq!(script.next_intent(), None);
    }

    #[test]
    fn test_stop_is_sent_once_per_rest() {
        let mut script = ScriptedInput::new();
        script.next_intent();

        let mut stops = 0;
        for _ in 0..20 {
            script.advance(0.1);
            if script.next_intent() == Some(Intent::Stop) {
                stops += 1;
            }
        }

        assert_eq!(stops, 1);
    }
}
