use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::Vec2;
use uuid::Uuid;

use crate::net::{MonsterSnapshot, PlayerSnapshot, ProjectileSnapshot, SnapshotPayload};

bitflags! {
    /// Presentation toggles the server reports per entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityFlags: u8 {
        const ATTACK_ENABLED = 0b0000_0001;
        const SUPPORT_A_ENABLED = 0b0000_0010;
        const SUPPORT_B_ENABLED = 0b0000_0100;
        const MOVEMENT_ACTIVE = 0b0000_1000;
        /// Set on the snapshot where an attack started; edge, not level.
        const ATTACK_ANIM_TRIGGERED = 0b0001_0000;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player,
    Monster {
        archetype: String,
        state: String,
    },
    Projectile {
        owner: Uuid,
        radius: f32,
        spawn_time_ms: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub id: Uuid,
    pub kind: EntityKind,
    pub position: Vec2,
    pub hp: i32,
    pub max_hp: i32,
    pub flags: EntityFlags,
}

impl EntityState {
    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player)
    }

    pub fn with_position(&self, position: Vec2) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }
}

impl From<&PlayerSnapshot> for EntityState {
    fn from(player: &PlayerSnapshot) -> Self {
        let mut flags = EntityFlags::empty();
        flags.set(EntityFlags::ATTACK_ENABLED, player.attack_enabled);
        flags.set(EntityFlags::SUPPORT_A_ENABLED, player.support_a_enabled);
        flags.set(EntityFlags::SUPPORT_B_ENABLED, player.support_b_enabled);
        flags.set(EntityFlags::MOVEMENT_ACTIVE, player.movement_active);
        flags.set(EntityFlags::ATTACK_ANIM_TRIGGERED, player.attack_anim_triggered);

        Self {
            id: player.id,
            kind: EntityKind::Player,
            position: Vec2::new(player.x, player.y),
            hp: player.hp,
            max_hp: player.max_hp,
            flags,
        }
    }
}

impl From<&MonsterSnapshot> for EntityState {
    fn from(monster: &MonsterSnapshot) -> Self {
        Self {
            id: monster.id,
            kind: EntityKind::Monster {
                archetype: monster.archetype.clone(),
                state: monster.state.clone(),
            },
            position: Vec2::new(monster.x, monster.y),
            hp: monster.hp,
            max_hp: monster.max_hp,
            flags: EntityFlags::empty(),
        }
    }
}

impl From<&ProjectileSnapshot> for EntityState {
    fn from(projectile: &ProjectileSnapshot) -> Self {
        Self {
            id: projectile.id,
            kind: EntityKind::Projectile {
                owner: projectile.owner_id,
                radius: projectile.radius,
                spawn_time_ms: projectile.spawn_time_ms,
            },
            position: Vec2::new(projectile.x, projectile.y),
            hp: 0,
            max_hp: 0,
            flags: EntityFlags::empty(),
        }
    }
}

/// Authoritative world state at one server instant. Shared behind an `Arc`
/// once decoded and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub server_time_ms: i64,
    /// Highest command sequence the server had processed.
    pub ack_seq: u32,
    pub player_id: Uuid,
    pub movement_skill_id: Option<String>,
    pub cooldowns: BTreeMap<String, f32>,
    pub entities: BTreeMap<Uuid, EntityState>,
}

impl Snapshot {
    pub fn player(&self) -> Option<&EntityState> {
        self.entities.get(&self.player_id)
    }

    pub fn entity(&self, id: &Uuid) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl From<SnapshotPayload> for Snapshot {
    fn from(payload: SnapshotPayload) -> Self {
        let mut entities = BTreeMap::new();
        for monster in &payload.monsters {
            entities.insert(monster.id, EntityState::from(monster));
        }
        for projectile in &payload.projectiles {
            entities.insert(projectile.id, EntityState::from(projectile));
        }
        // The local player wins any id collision.
        entities.insert(payload.player.id, EntityState::from(&payload.player));

        Self {
            server_time_ms: payload.server_time_ms,
            ack_seq: payload.ack_seq,
            player_id: payload.player.id,
            movement_skill_id: payload.player.movement_skill_id,
            cooldowns: payload.cooldowns.unwrap_or_default(),
            entities,
        }
    }
}
