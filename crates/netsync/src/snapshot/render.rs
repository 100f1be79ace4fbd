use std::sync::Arc;

use super::buffer::SnapshotBuffer;
use super::entity::Snapshot;

pub const DEFAULT_INTERPOLATION_DELAY_MS: f64 = 100.0;
pub const MIN_MAX_BEHIND_MS: f64 = 100.0;

/// Pair of buffered snapshots bracketing a render timestamp.
///
/// `from == to` when the timestamp falls before the oldest snapshot or past
/// the newest one; in the latter case the caller extrapolates.
#[derive(Debug, Clone)]
pub struct RenderWindow {
    pub from: Arc<Snapshot>,
    pub to: Arc<Snapshot>,
    pub render_timestamp: f64,
}

impl RenderWindow {
    /// Interpolation factor in `[0, 1]`, zero for a degenerate window.
    pub fn fraction(&self) -> f32 {
        let from = self.from.server_time_ms as f64;
        let to = self.to.server_time_ms as f64;
        let span = to - from;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.render_timestamp - from) / span).clamp(0.0, 1.0) as f32
    }

    pub fn is_extrapolating(&self) -> bool {
        self.render_timestamp > self.to.server_time_ms as f64
    }

    /// How far past `to` the render timestamp lies, in milliseconds.
    pub fn overshoot_ms(&self) -> f64 {
        (self.render_timestamp - self.to.server_time_ms as f64).max(0.0)
    }
}

/// Server-timeline render timestamp for local wall time `local_now_ms`,
/// pulled forward so it never trails the newest snapshot by more than
/// `max(min_max_behind_ms, 2 * interpolation_delay_ms)`.
pub fn render_timestamp(
    local_now_ms: f64,
    clock_offset_ms: f64,
    interpolation_delay_ms: f64,
    rtt_ms: f64,
    newest_server_time_ms: f64,
    min_max_behind_ms: f64,
) -> f64 {
    let render = local_now_ms - clock_offset_ms - interpolation_delay_ms + rtt_ms / 2.0;
    let max_behind = min_max_behind_ms.max(2.0 * interpolation_delay_ms);
    if newest_server_time_ms - render > max_behind {
        newest_server_time_ms - max_behind
    } else {
        render
    }
}

/// Finds the render window, or `None` until a snapshot has arrived.
pub fn resolve(
    buffer: &SnapshotBuffer,
    local_now_ms: f64,
    interpolation_delay_ms: f64,
    rtt_ms: f64,
    min_max_behind_ms: f64,
) -> Option<RenderWindow> {
    let offset = buffer.clock_offset_ms()?;
    let newest = buffer.newest()?;
    let oldest = buffer.oldest()?;

    let render = render_timestamp(
        local_now_ms,
        offset,
        interpolation_delay_ms,
        rtt_ms,
        newest.server_time_ms as f64,
        min_max_behind_ms,
    );

    let mut from = None;
    let mut to = None;
    for snapshot in buffer.iter() {
        let time = snapshot.server_time_ms as f64;
        if time <= render {
            from = Some(snapshot);
        }
        if time >= render && to.is_none() {
            to = Some(snapshot);
        }
    }

    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        (Some(_), None) => (newest, newest),
        (None, _) => (oldest, oldest),
    };

    Some(RenderWindow {
        from: Arc::clone(from),
        to: Arc::clone(to),
        render_timestamp: render,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::entity::test_support::player_at;
    use uuid::Uuid;

    fn timeline(times: &[i64], first_local_ms: f64) -> SnapshotBuffer {
        let mut buffer = SnapshotBuffer::new(30);
        for (i, &time) in times.iter().enumerate() {
            buffer.push(Arc::new(player_at(time, Uuid::nil(), i as f32)), first_local_ms);
        }
        buffer
    }

    #[test]
    fn test_midpoint_between_two_snapshots() {
        // Offset 0: first snapshot arrives at local 1000.
        let buffer = timeline(&[1000, 1100], 1000.0);

        let window = resolve(&buffer, 1100.0, 50.0, 0.0, MIN_MAX_BEHIND_MS).unwrap();

        assert_eq!(window.render_timestamp, 1050.0);
        assert_eq!(window.from.server_time_ms, 1000);
        assert_eq!(window.to.server_time_ms, 1100);
        assert!((window.fraction() - 0.5).abs() < 1e-6);
        assert!(!window.is_extrapolating());
    }

    #[test]
    fn test_half_rtt_moves_render_forward() {
        let buffer = timeline(&[1000, 1100], 1000.0);

        let window = resolve(&buffer, 1100.0, 50.0, 40.0, MIN_MAX_BEHIND_MS).unwrap();

        assert_eq!(window.render_timestamp, 1070.0);
        assert_eq!(window.from.server_time_ms, 1000);
        assert_eq!(window.to.server_time_ms, 1100);
        assert!((window.fraction() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_applies_after_half_rtt() {
        // 1100 - 0 - 50 + 20 = 1070 trails 1200 by 130, over the 100 bound.
        let render = render_timestamp(1100.0, 0.0, 50.0, 40.0, 1200.0, MIN_MAX_BEHIND_MS);
        assert_eq!(render, 1100.0);

        let buffer = timeline(&[1000, 1100, 1200], 1000.0);
        let window = resolve(&buffer, 1100.0, 50.0, 40.0, MIN_MAX_BEHIND_MS).unwrap();
        assert_eq!(window.render_timestamp, 1200.0 - MIN_MAX_BEHIND_MS);
        assert_eq!(window.from.server_time_ms, 1100);
    }

    #[test]
    fn test_render_never_trails_beyond_max_behind() {
        let buffer = timeline(&[1000, 1100, 1200, 1300, 1400, 1500], 1000.0);

        let window = resolve(&buffer, 1000.0, 50.0, 0.0, MIN_MAX_BEHIND_MS).unwrap();
        assert_eq!(window.render_timestamp, 1400.0);
        assert_eq!(window.from.server_time_ms, 1400);

        let window = resolve(&buffer, 1000.0, 80.0, 0.0, MIN_MAX_BEHIND_MS).unwrap();
        assert_eq!(window.render_timestamp, 1500.0 - 160.0);
    }

    #[test]
    fn test_past_newest_extrapolates_from_newest() {
        let buffer = timeline(&[1000, 1100], 1000.0);

        let window = resolve(&buffer, 1300.0, 50.0, 0.0, MIN_MAX_BEHIND_MS).unwrap();

        assert_eq!(window.from.server_time_ms, 1100);
        assert_eq!(window.to.server_time_ms, 1100);
        assert!(window.is_extrapolating());
        assert_eq!(window.overshoot_ms(), 150.0);
        assert_eq!(window.fraction(), 0.0);
    }

    #[test]
    fn test_before_oldest_holds_oldest() {
        let buffer = timeline(&[1000, 1100], 1000.0);

        let window = resolve(&buffer, 1000.0, 50.0, 0.0, MIN_MAX_BEHIND_MS).unwrap();

        assert_eq!(window.render_timestamp, 1000.0);
        assert_eq!(window.from.server_time_ms, 1000);

        let early = resolve(&buffer, 990.0, 50.0, 0.0, 1000.0).unwrap();
        assert_eq!(early.from.server_time_ms, 1000);
        assert_eq!(early.to.server_time_ms, 1000);
        assert!(!early.is_extrapolating());
    }

    #[test]
    fn test_empty_buffer_has_no_window() {
        let buffer = SnapshotBuffer::new(4);
        assert!(resolve(&buffer, 0.0, 100.0, 0.0, MIN_MAX_BEHIND_MS).is_none());
    }
}
