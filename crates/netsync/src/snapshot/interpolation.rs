use std::collections::BTreeMap;

use glam::Vec2;
use uuid::Uuid;

use super::entity::{EntityState, Snapshot};
use super::render::RenderWindow;

pub const DEFAULT_MAX_EXTRAPOLATION_MS: f64 = 120.0;

/// Units per second between two snapshots, `None` unless both carry the
/// entity and the server clock moved forward by a representable amount.
pub fn estimate_velocity(previous: &Snapshot, latest: &Snapshot, id: &Uuid) -> Option<Vec2> {
    let elapsed_ms = latest
        .server_time_ms
        .checked_sub(previous.server_time_ms)
        .filter(|&ms| ms > 0)?;
    let elapsed_secs = elapsed_ms as f32 / 1000.0;
    let before = previous.entity(id)?;
    let after = latest.entity(id)?;
    Some((after.position - before.position) / elapsed_secs)
}

/// Entity states at the window's render timestamp.
///
/// Inside the window positions are lerped, entities new in `to` appear at
/// their `to` position. Past the newest snapshot each entity is projected
/// along the velocity between the two most recent snapshots in `history`,
/// at most `max_extrapolation_ms` ahead. Only entities present in `to` are
/// returned.
pub fn sample(
    window: &RenderWindow,
    history: Option<(&Snapshot, &Snapshot)>,
    max_extrapolation_ms: f64,
) -> BTreeMap<Uuid, EntityState> {
    if window.is_extrapolating() {
        let ahead_secs = (window.overshoot_ms().min(max_extrapolation_ms) / 1000.0) as f32;
        return window
            .to
            .entities()
            .map(|state| {
                let velocity = history
                    .and_then(|(previous, latest)| estimate_velocity(previous, latest, &state.id))
                    .unwrap_or(Vec2::ZERO);
                (state.id, state.with_position(state.position + velocity * ahead_secs))
            })
            .collect();
    }

    let t = window.fraction();
    window
        .to
        .entities()
        .map(|state| {
            let position = match window.from.entity(&state.id) {
                Some(from) => from.position.lerp(state.position, t),
                None => state.position,
            };
            (state.id, state.with_position(position))
        })
        .collect()
}
