use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use uuid::Uuid;

use super::entity::EntityState;

pub const DEFAULT_POSITION_SMOOTHING: f32 = 12.0;

/// Last rendered state of every networked entity, keyed by id.
///
/// Owned by the client coordinator; renderers look entities up here rather
/// than through any global table.
#[derive(Debug)]
pub struct EntityRegistry {
    entities: HashMap<Uuid, EntityState>,
    removed_entities: Vec<Uuid>,
    smoothing: f32,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_SMOOTHING)
    }
}

impl EntityRegistry {
    /// `smoothing` of zero snaps straight to sampled positions.
    pub fn new(smoothing: f32) -> Self {
        Self {
            entities: HashMap::new(),
            removed_entities: Vec::new(),
            smoothing,
        }
    }

    fn blend_factor(&self, dt: f32) -> f32 {
        if self.smoothing <= 0.0 {
            return 1.0;
        }
        1.0 - (-self.smoothing * dt.max(0.0)).exp()
    }

    /// Upserts one frame of sampled states and drops everything that was
    /// not sampled. Newly seen entities are placed without smoothing.
    pub fn apply(&mut self, sampled: BTreeMap<Uuid, EntityState>, dt: f32) -> &[Uuid] {
        let alpha = self.blend_factor(dt);

        self.removed_entities.clear();
        let removed = &mut self.removed_entities;
        self.entities.retain(|id, _| {
            let keep = sampled.contains_key(id);
            if !keep {
                removed.push(*id);
            }
            keep
        });
        self.removed_entities.sort_unstable();

        for (id, state) in sampled {
            match self.entities.get_mut(&id) {
                Some(existing) => {
                    let position = existing.position.lerp(state.position, alpha);
                    *existing = EntityState { position, ..state };
                }
                None => {
                    self.entities.insert(id, state);
                }
            }
        }

        &self.removed_entities
    }

    /// Overrides an entity's position, e.g. with the locally predicted one.
    pub fn pin(&mut self, id: &Uuid, position: Vec2) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids dropped by the most recent [`EntityRegistry::apply`].
    pub fn removed_entities(&self) -> &[Uuid] {
        &self.removed_entities
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.removed_entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::entity::test_support::player_at;

    fn frame(id: Uuid, x: f32) -> BTreeMap<Uuid, EntityState> {
        player_at(0, id, x).entities
    }

    #[test]
    fn test_new_entities_snap_into_place() {
        let id = Uuid::new_v4();
        let mut registry = EntityRegistry::default();

        registry.apply(frame(id, 4.0), 0.016);

        assert_eq!(registry.get(&id).unwrap().position.x, 4.0);
    }

    #[test]
    fn test_smoothing_approaches_target() {
        let id = Uuid::new_v4();
        let mut registry = EntityRegistry::new(12.0);
        registry.apply(frame(id, 0.0), 0.016);

        registry.apply(frame(id, 1.0), 0.1);

        let expected = 1.0 - (-1.2f32).exp();
        let x = registry.get(&id).unwrap().position.x;
        assert!((x - expected).abs() < 1e-5);
        assert!(x > 0.0 && x < 1.0);
    }

    #[test]
    fn test_zero_smoothing_snaps() {
        let id = Uuid::new_v4();
        let mut registry = EntityRegistry::new(0.0);
        registry.apply(frame(id, 0.0), 0.016);
        registry.apply(frame(id, 3.0), 0.016);
        assert_eq!(registry.get(&id).unwrap().position.x, 3.0);
    }

    #[test]
    fn test_unsampled_entities_are_removed() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut registry = EntityRegistry::default();
        registry.apply(frame(a, 0.0), 0.016);

        let removed = registry.apply(frame(b, 0.0), 0.016).to_vec();

        assert_eq!(removed, vec![a]);
        assert!(registry.get(&a).is_none());
        assert_eq!(registry.entity_count(), 1);
    }

    #[test]
    fn test_pin_overrides_position() {
        let id = Uuid::new_v4();
        let mut registry = EntityRegistry::default();
        registry.apply(frame(id, 0.0), 0.016);

        assert!(registry.pin(&id, Vec2::new(9.0, 1.0)));
        assert_eq!(registry.get(&id).unwrap().position, Vec2::new(9.0, 1.0));
        assert!(!registry.pin(&Uuid::new_v4(), Vec2::ZERO));
    }
}
