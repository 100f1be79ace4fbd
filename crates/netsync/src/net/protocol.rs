use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const MAX_DATAGRAM_SIZE: usize = 65_507;
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_MAP_ID: &str = "default";

const DEBUG_PREFIX: &str = "debug_";
const TYPE_KEY: &str = "type";

/// Fields shared by every envelope regardless of message type.
///
/// `packet_seq` is zero for unreliable traffic. `ack` piggybacks the highest
/// reliable sequence the sender has accepted in order. `seq` is the
/// application command sequence and stays zero on server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub packet_seq: u32,
    #[serde(default)]
    pub ack: u32,
    #[serde(default)]
    pub reliable: bool,
    #[serde(default)]
    pub seq: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    Reliable,
}

impl Reliability {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugCommand {
    /// Suffix after `debug_`, e.g. `spawn_melee`.
    pub action: String,
    pub position: Option<Vec2>,
}

impl DebugCommand {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Payload {
    Connect {
        token: String,
        character_id: Uuid,
        season_id: Uuid,
    },
    Start {
        map_id: String,
    },
    Move {
        x: f32,
        y: f32,
    },
    Stop,
    Skill {
        skill_id: String,
    },
    SlotToggle {
        slot: String,
        enabled: bool,
    },
    /// Encoded by hand: the wire type is `debug_<action>`.
    #[serde(skip)]
    Debug(DebugCommand),
    Ack,
    Disconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// The assigned session id travels in the header's `sessionId`.
    Hello {
        tick_rate: u32,
    },
    ConnectOk {
        character_id: Uuid,
        season_id: Uuid,
        #[serde(default)]
        player_name: String,
    },
    InstanceStart {
        instance_id: Uuid,
        seed: i32,
        map_id: String,
    },
    Snapshot(SnapshotPayload),
    Error {
        code: String,
        message: String,
    },
    NetStats {
        ticks_last_sec: u32,
        sent_snapshots_last_sec: u32,
        packet_loss_pct: f32,
        avg_ping_ms: f32,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Start { .. } => "start",
            Self::Move { .. } => "move",
            Self::Stop => "stop",
            Self::Skill { .. } => "skill",
            Self::SlotToggle { .. } => "slot_toggle",
            Self::Debug(_) => "debug",
            Self::Ack => "ack",
            Self::Disconnect { .. } => "disconnect",
            Self::Hello { .. } => "hello",
            Self::ConnectOk { .. } => "connect_ok",
            Self::InstanceStart { .. } => "instance_start",
            Self::Snapshot(_) => "snapshot",
            Self::Error { .. } => "error",
            Self::NetStats { .. } => "net_stats",
        }
    }

    /// Channel a client sends this message on. Per-tick movement and
    /// ack-only traffic is idempotent, everything else is an event.
    pub fn reliability(&self) -> Reliability {
        match self {
            Self::Move { .. } | Self::Stop | Self::Ack | Self::Disconnect { .. } => {
                Reliability::Unreliable
            }
            Self::Snapshot(_) | Self::NetStats { .. } | Self::Hello { .. } => {
                Reliability::Unreliable
            }
            _ => Reliability::Reliable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub server_time_ms: i64,
    pub ack_seq: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldowns: Option<BTreeMap<String, f32>>,
    #[serde(default)]
    pub player: PlayerSnapshot,
    #[serde(default)]
    pub monsters: Vec<MonsterSnapshot>,
    #[serde(default)]
    pub projectiles: Vec<ProjectileSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack_enabled: bool,
    pub support_a_enabled: bool,
    pub support_b_enabled: bool,
    pub movement_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_skill_id: Option<String>,
    pub attack_anim_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonsterSnapshot {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub archetype: String,
    pub state: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectileSnapshot {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub spawn_time_ms: i64,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(Debug, Default, Deserialize)]
struct DebugPosition {
    x: Option<f32>,
    y: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Payload,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(serde_json::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(serde_json::Error),
    #[error("envelope has no message type")]
    MissingType,
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("packet of {0} bytes exceeds the datagram limit")]
    Oversized(usize),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let mut object = into_object(
            serde_json::to_value(self.header).map_err(PacketError::Serialize)?,
        )?;

        match &self.payload {
            Payload::Debug(command) => {
                object.insert(
                    TYPE_KEY.to_string(),
                    Value::String(format!("{DEBUG_PREFIX}{}", command.action)),
                );
                if let Some(position) = command.position {
                    object.insert("x".to_string(), Value::from(position.x));
                    object.insert("y".to_string(), Value::from(position.y));
                }
            }
            payload => {
                let fields = into_object(
                    serde_json::to_value(payload).map_err(PacketError::Serialize)?,
                )?;
                object.extend(fields);
            }
        }

        let data = serde_json::to_vec(&Value::Object(object)).map_err(PacketError::Serialize)?;
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(PacketError::Oversized(data.len()));
        }
        Ok(data)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let value: Value = serde_json::from_slice(data).map_err(PacketError::Deserialize)?;
        if !value.is_object() {
            return Err(PacketError::NotAnObject);
        }

        let debug_action = value
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or(PacketError::MissingType)?
            .strip_prefix(DEBUG_PREFIX)
            .map(str::to_owned);

        let header = PacketHeader::deserialize(&value).map_err(PacketError::Deserialize)?;

        let payload = match debug_action {
            Some(action) => {
                let position =
                    DebugPosition::deserialize(&value).map_err(PacketError::Deserialize)?;
                Payload::Debug(DebugCommand {
                    action,
                    position: position.x.zip(position.y).map(|(x, y)| Vec2::new(x, y)),
                })
            }
            None => Payload::deserialize(&value).map_err(PacketError::Deserialize)?,
        };

        Ok(Self { header, payload })
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, PacketError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(PacketError::NotAnObject),
    }
}
