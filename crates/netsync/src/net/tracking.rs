use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub sequence: u32,
    pub payload: Vec<u8>,
    pub first_sent: Instant,
    pub last_sent: Instant,
    pub retries: u32,
}

#[derive(Debug, Default)]
pub struct AckOutcome {
    pub removed: usize,
    pub rtt_sample: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct ResendBatch {
    /// Sorted by sequence.
    pub resend: Vec<(u32, Vec<u8>)>,
    pub exhausted: Vec<u32>,
}

/// Reliable packets awaiting acknowledgement, keyed by packet sequence.
///
/// The receive loop deletes acked entries while the resend loop walks and
/// mutates the rest, so the table is a sharded concurrent map.
#[derive(Debug)]
pub struct PendingTable {
    entries: DashMap<u32, PendingPacket>,
    resend_interval: Duration,
    max_retries: u32,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_INTERVAL, DEFAULT_MAX_RETRIES)
    }
}

impl PendingTable {
    pub fn new(resend_interval: Duration, max_retries: u32) -> Self {
        Self {
            entries: DashMap::new(),
            resend_interval,
            max_retries,
        }
    }

    pub fn track(&self, sequence: u32, payload: Vec<u8>, now: Instant) {
        self.entries.insert(
            sequence,
            PendingPacket {
                sequence,
                payload,
                first_sent: now,
                last_sent: now,
                retries: 0,
            },
        );
    }

    /// Drops every entry with sequence <= `ack`. Only a packet that was never
    /// retransmitted yields an RTT sample, otherwise the ack is ambiguous.
    pub fn acknowledge(&self, ack: u32, now: Instant) -> AckOutcome {
        let rtt_sample = self
            .entries
            .get(&ack)
            .filter(|packet| packet.retries == 0)
            .map(|packet| now.saturating_duration_since(packet.first_sent));

        let mut removed = 0;
        self.entries.retain(|&sequence, _| {
            if sequence <= ack {
                removed += 1;
                false
            } else {
                true
            }
        });

        AckOutcome {
            removed,
            rtt_sample,
        }
    }

    pub fn collect_resends(&self, now: Instant) -> ResendBatch {
        let mut batch = ResendBatch::default();

        self.entries.retain(|&sequence, packet| {
            if now.saturating_duration_since(packet.last_sent) < self.resend_interval {
                return true;
            }
            if packet.retries >= self.max_retries {
                batch.exhausted.push(sequence);
                return false;
            }
            packet.retries += 1;
            packet.last_sent = now;
            batch.resend.push((sequence, packet.payload.clone()));
            true
        });

        batch.resend.sort_unstable_by_key(|(sequence, _)| *sequence);
        batch.exhausted.sort_unstable();
        batch
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.entries.contains_key(&sequence)
    }

    pub fn retries(&self, sequence: u32) -> Option<u32> {
        self.entries.get(&sequence).map(|packet| packet.retries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Accept,
    /// Already accepted; a retransmission whose ack never reached the peer.
    Duplicate,
    /// An earlier reliable packet is missing.
    Gap,
}

/// Strict in-order acceptance: only `expected + 1` passes.
pub fn check_order(expected: u32, sequence: u32) -> GateVerdict {
    if sequence == expected.wrapping_add(1) {
        GateVerdict::Accept
    } else if sequence <= expected {
        GateVerdict::Duplicate
    } else {
        GateVerdict::Gap
    }
}

/// Smoothed round-trip time, written by the receive loop only.
#[derive(Debug)]
pub struct RttEstimator {
    srtt_bits: AtomicU32,
    rtt_var_bits: AtomicU32,
    samples: AtomicU32,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RttEstimator {
    const INITIAL_SRTT_MS: f32 = 100.0;
    const INITIAL_RTT_VAR_MS: f32 = 50.0;

    pub fn new() -> Self {
        Self {
            srtt_bits: AtomicU32::new(Self::INITIAL_SRTT_MS.to_bits()),
            rtt_var_bits: AtomicU32::new(Self::INITIAL_RTT_VAR_MS.to_bits()),
            samples: AtomicU32::new(0),
        }
    }

    pub fn update(&self, sample: Duration) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let rtt = sample.as_secs_f32() * 1000.0;
        let (srtt, rtt_var) = if self.samples.fetch_add(1, Ordering::AcqRel) == 0 {
            (rtt, rtt / 2.0)
        } else {
            let srtt = self.srtt_ms();
            let diff = (rtt - srtt).abs();
            (
                (1.0 - ALPHA) * srtt + ALPHA * rtt,
                (1.0 - BETA) * self.rtt_var_ms() + BETA * diff,
            )
        };

        self.srtt_bits.store(srtt.to_bits(), Ordering::Release);
        self.rtt_var_bits.store(rtt_var.to_bits(), Ordering::Release);
    }

    pub fn srtt_ms(&self) -> f32 {
        f32::from_bits(self.srtt_bits.load(Ordering::Acquire))
    }

    pub fn rtt_var_ms(&self) -> f32 {
        f32::from_bits(self.rtt_var_bits.load(Ordering::Acquire))
    }

    pub fn sample_count(&self) -> u32 {
        self.samples.load(Ordering::Acquire)
    }
}
