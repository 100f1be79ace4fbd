use std::collections::VecDeque;

use glam::Vec2;
use uuid::Uuid;

use crate::net::{DEFAULT_MAP_ID, DebugCommand, Payload};
use crate::prediction::clamp_direction;

/// Auto-cast slots the server lets a player toggle.
pub const SLOT_ATTACK: &str = "attack";
pub const SLOT_SUPPORT_A: &str = "support_a";
pub const SLOT_SUPPORT_B: &str = "support_b";

/// Gameplay intent produced by the local input layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// `elapsed` is how long, in seconds, the direction was held this tick.
    Move { direction: Vec2, elapsed: f32 },
    Stop,
    UseSkill { skill_id: String },
    ToggleSlot { slot: String, enabled: bool },
    Debug(DebugCommand),
}

impl Intent {
    pub fn to_payload(&self) -> Payload {
        match self {
            Intent::Move { direction, .. } => {
                let direction = clamp_direction(*direction);
                Payload::Move {
                    x: direction.x,
                    y: direction.y,
                }
            }
            Intent::Stop => Payload::Stop,
            Intent::UseSkill { skill_id } => Payload::Skill {
                skill_id: skill_id.clone(),
            },
            Intent::ToggleSlot { slot, enabled } => Payload::SlotToggle {
                slot: slot.clone(),
                enabled: *enabled,
            },
            Intent::Debug(command) => Payload::Debug(command.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub character_id: Uuid,
    pub season_id: Uuid,
}

pub trait CredentialProvider {
    fn credentials(&self) -> Option<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

pub trait InputSource {
    fn next_intent(&mut self) -> Option<Intent>;
}

impl InputSource for VecDeque<Intent> {
    fn next_intent(&mut self) -> Option<Intent> {
        self.pop_front()
    }
}

pub(crate) fn normalize_map_id(map_id: &str) -> String {
    let trimmed = map_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MAP_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_intent_is_clamped_on_the_wire() {
        let payload = Intent::Move {
            direction: Vec2::new(0.0, 2.0),
            elapsed: 0.016,
        }
        .to_payload();
        assert_eq!(payload, Payload::Move { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_slot_toggle_maps_to_payload() {
        let payload = Intent::ToggleSlot {
            slot: SLOT_SUPPORT_A.to_string(),
            enabled: false,
        }
        .to_payload();
        assert_eq!(
            payload,
            Payload::SlotToggle {
                slot: "support_a".to_string(),
                enabled: false
            }
        );
    }

    #[test]
    fn test_blank_map_id_falls_back_to_default() {
        assert_eq!(normalize_map_id("  "), DEFAULT_MAP_ID);
        assert_eq!(normalize_map_id("crypt"), "crypt");
    }

    #[test]
    fn test_queue_is_an_input_source() {
        let mut queue = VecDeque::from([Intent::Stop]);
        assert_eq!(queue.next_intent(), Some(Intent::Stop));
        assert_eq!(queue.next_intent(), None);
    }
}
