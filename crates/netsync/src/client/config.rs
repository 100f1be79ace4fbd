use std::time::Duration;

use crate::net::{DEFAULT_MAX_RETRIES, DEFAULT_RECV_TIMEOUT, DEFAULT_RESEND_INTERVAL};
use crate::prediction::{DEFAULT_MAX_PENDING_INPUTS, DEFAULT_MOVE_SPEED};
use crate::snapshot::{
    DEFAULT_INTERPOLATION_DELAY_MS, DEFAULT_MAX_EXTRAPOLATION_MS, DEFAULT_POSITION_SMOOTHING,
    DEFAULT_SNAPSHOT_CAPACITY, MIN_MAX_BEHIND_MS,
};

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub resend_interval: Duration,
    pub max_retries: u32,
    pub keepalive_interval: Duration,
    /// Upper bound on how long the receive loop takes to notice cancellation.
    pub recv_timeout: Duration,
    pub snapshot_capacity: usize,
    pub interpolation_delay_ms: f64,
    pub max_extrapolation_ms: f64,
    pub min_max_behind_ms: f64,
    pub move_speed: f32,
    pub position_smoothing: f32,
    pub max_pending_inputs: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            resend_interval: DEFAULT_RESEND_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            interpolation_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            max_extrapolation_ms: DEFAULT_MAX_EXTRAPOLATION_MS,
            min_max_behind_ms: MIN_MAX_BEHIND_MS,
            move_speed: DEFAULT_MOVE_SPEED,
            position_smoothing: DEFAULT_POSITION_SMOOTHING,
            max_pending_inputs: DEFAULT_MAX_PENDING_INPUTS,
        }
    }
}
