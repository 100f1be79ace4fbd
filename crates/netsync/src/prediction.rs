use std::collections::VecDeque;

use glam::Vec2;
use log::warn;

pub const DEFAULT_MOVE_SPEED: f32 = 4.5;
pub const DEFAULT_MAX_PENDING_INPUTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub sequence: u32,
    pub direction: Vec2,
    /// Seconds the input was held for.
    pub elapsed: f32,
}

/// Clamps a movement direction to unit length; shorter vectors keep their
/// magnitude so analog input still walks slowly.
pub fn clamp_direction(direction: Vec2) -> Vec2 {
    if direction.length_squared() > 1.0 {
        direction.normalize_or_zero()
    } else {
        direction
    }
}

/// Optimistic movement for the locally controlled entity.
///
/// Inputs move the predicted position immediately and stay logged until a
/// snapshot acknowledges them. Each snapshot resets to the authoritative
/// position and replays the inputs the server has not seen yet.
#[derive(Debug)]
pub struct PredictionReconciler {
    pending: VecDeque<PendingInput>,
    position: Option<Vec2>,
    move_speed: f32,
    max_pending: usize,
    last_ack: u32,
    last_server_time_ms: Option<i64>,
}

impl Default for PredictionReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MOVE_SPEED, DEFAULT_MAX_PENDING_INPUTS)
    }
}

impl PredictionReconciler {
    pub fn new(move_speed: f32, max_pending: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            position: None,
            move_speed,
            max_pending: max_pending.max(1),
            last_ack: 0,
            last_server_time_ms: None,
        }
    }

    fn step(&self, input: &PendingInput) -> Vec2 {
        input.direction * self.move_speed * input.elapsed
    }

    /// Logs the input and applies it to the prediction. Before the first
    /// snapshot there is no position to move, so the input is only logged.
    pub fn apply_input(&mut self, sequence: u32, direction: Vec2, elapsed: f32) -> Option<Vec2> {
        let input = PendingInput {
            sequence,
            direction: clamp_direction(direction),
            elapsed: elapsed.max(0.0),
        };

        let delta = self.step(&input);
        if let Some(position) = self.position.as_mut() {
            *position += delta;
        }

        self.pending.push_back(input);
        if self.pending.len() > self.max_pending {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(
                    "Pending input log full, dropping input {} (ack stalled at {})",
                    dropped.sequence, self.last_ack
                );
            }
        }

        self.position
    }

    /// Rebases onto an authoritative position. Snapshots older than the last
    /// reconciled one are ignored and return false.
    pub fn reconcile(&mut self, authoritative: Vec2, ack_seq: u32, server_time_ms: i64) -> bool {
        if self
            .last_server_time_ms
            .is_some_and(|last| server_time_ms < last)
        {
            return false;
        }
        self.last_server_time_ms = Some(server_time_ms);
        self.last_ack = ack_seq;

        while self
            .pending
            .front()
            .is_some_and(|input| input.sequence <= ack_seq)
        {
            self.pending.pop_front();
        }

        let replayed = self
            .pending
            .iter()
            .fold(authoritative, |position, input| position + self.step(input));
        self.position = Some(replayed);
        true
    }

    pub fn predicted_position(&self) -> Option<Vec2> {
        self.position
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_inputs(&self) -> impl Iterator<Item = &PendingInput> {
        self.pending.iter()
    }

    pub fn last_ack(&self) -> u32 {
        self.last_ack
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.position = None;
        self.last_ack = 0;
        self.last_server_time_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler() -> PredictionReconciler {
        PredictionReconciler::new(1.0, DEFAULT_MAX_PENDING_INPUTS)
    }

    #[test]
    fn test_acknowledged_input_is_not_replayed() {
        let mut prediction = reconciler();
        prediction.apply_input(10, Vec2::X, 1.0);

        assert!(prediction.reconcile(Vec2::new(5.0, 0.0), 10, 1000));

        assert_eq!(prediction.predicted_position(), Some(Vec2::new(5.0, 0.0)));
        assert_eq!(prediction.pending_count(), 0);
    }

    #[test]
    fn test_unacknowledged_inputs_are_replayed_in_order() {
        let mut prediction = reconciler();
        prediction.reconcile(Vec2::ZERO, 0, 900);
        prediction.apply_input(1, Vec2::X, 1.0);
        prediction.apply_input(2, Vec2::Y, 0.5);
        prediction.apply_input(3, Vec2::X, 0.25);
        assert_eq!(prediction.predicted_position(), Some(Vec2::new(1.25, 0.5)));

        prediction.reconcile(Vec2::new(10.0, 0.0), 1, 1000);

        assert_eq!(prediction.pending_count(), 2);
        assert_eq!(prediction.predicted_position(), Some(Vec2::new(10.25, 0.5)));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut prediction = reconciler();
        prediction.apply_input(1, Vec2::X, 1.0);
        prediction.apply_input(2, Vec2::X, 1.0);

        prediction.reconcile(Vec2::new(3.0, 0.0), 1, 1000);
        let first = prediction.predicted_position();
        prediction.reconcile(Vec2::new(3.0, 0.0), 1, 1000);

        assert_eq!(prediction.predicted_position(), first);
        assert_eq!(first, Some(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn test_older_snapshot_is_ignored() {
        let mut prediction = reconciler();
        prediction.reconcile(Vec2::new(2.0, 0.0), 0, 1000);

        assert!(!prediction.reconcile(Vec2::new(-50.0, 0.0), 0, 950));
        assert_eq!(prediction.predicted_position(), Some(Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn test_inputs_before_first_snapshot_are_logged() {
        let mut prediction = reconciler();
        assert_eq!(prediction.apply_input(1, Vec2::X, 1.0), None);
        assert_eq!(prediction.pending_count(), 1);

        prediction.reconcile(Vec2::ZERO, 0, 100);
        assert_eq!(prediction.predicted_position(), Some(Vec2::X));
    }

    #[test]
    fn test_long_directions_are_normalized() {
        let mut prediction = PredictionReconciler::new(DEFAULT_MOVE_SPEED, 16);
        prediction.reconcile(Vec2::ZERO, 0, 0);

        let position = prediction.apply_input(1, Vec2::new(3.0, 4.0), 1.0).unwrap();

        assert!((position.length() - DEFAULT_MOVE_SPEED).abs() < 1e-4);
        assert_eq!(clamp_direction(Vec2::new(0.5, 0.0)), Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_pending_log_is_capped() {
        let mut prediction = PredictionReconciler::new(1.0, 4);
        for sequence in 1..=6 {
            prediction.apply_input(sequence, Vec2::X, 0.1);
        }

        assert_eq!(prediction.pending_count(), 4);
        assert_eq!(prediction.pending_inputs().next().unwrap().sequence, 3);
    }
}
