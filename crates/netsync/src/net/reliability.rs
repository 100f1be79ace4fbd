use std::time::{Duration, Instant};

use super::connection::Session;
use super::protocol::{Packet, PacketError, PacketHeader, Payload};
use super::tracking::{
    DEFAULT_MAX_RETRIES, DEFAULT_RESEND_INTERVAL, GateVerdict, PendingTable, ResendBatch,
    RttEstimator, check_order,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundVerdict {
    Deliver,
    Duplicate,
    Gap,
}

impl From<GateVerdict> for InboundVerdict {
    fn from(verdict: GateVerdict) -> Self {
        match verdict {
            GateVerdict::Accept => InboundVerdict::Deliver,
            GateVerdict::Duplicate => InboundVerdict::Duplicate,
            GateVerdict::Gap => InboundVerdict::Gap,
        }
    }
}

/// Sequencing, acknowledgement and retransmission on top of a datagram link.
///
/// Reliable messages get the next packet sequence and stay in the pending
/// table until the peer's cumulative ack covers them. Unreliable messages
/// carry sequence 0 and skip both the pending table and the inbound gate.
#[derive(Debug)]
pub struct ReliableChannel {
    session: Session,
    pending: PendingTable,
    rtt: RttEstimator,
}

impl Default for ReliableChannel {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_INTERVAL, DEFAULT_MAX_RETRIES)
    }
}

impl ReliableChannel {
    pub fn new(resend_interval: Duration, max_retries: u32) -> Self {
        Self {
            session: Session::new(),
            pending: PendingTable::new(resend_interval, max_retries),
            rtt: RttEstimator::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    fn header(
        &self,
        packet_seq: u32,
        reliable: bool,
        seq: u32,
        client_time_ms: Option<i64>,
    ) -> PacketHeader {
        PacketHeader {
            session_id: self.session.session_id(),
            packet_seq,
            ack: self.session.expected_sequence(),
            reliable,
            seq,
            client_time_ms,
        }
    }

    /// Stamps and records a reliable packet. Reliable sends come from the
    /// owning application thread only, so the sequence is committed after
    /// serialization succeeds and a failed encode leaves no hole for the
    /// peer's ordering gate to stall on.
    pub fn prepare_reliable(
        &self,
        payload: Payload,
        seq: u32,
        client_time_ms: Option<i64>,
        now: Instant,
    ) -> Result<(u32, Vec<u8>), PacketError> {
        let sequence = self.session.last_sent_sequence().wrapping_add(1);
        let packet = Packet::new(self.header(sequence, true, seq, client_time_ms), payload);
        let data = packet.serialize()?;

        let committed = self.session.next_send_sequence();
        debug_assert_eq!(committed, sequence);

        self.pending.track(sequence, data.clone(), now);
        Ok((sequence, data))
    }

    pub fn prepare_unreliable(
        &self,
        payload: Payload,
        seq: u32,
        client_time_ms: Option<i64>,
    ) -> Result<Vec<u8>, PacketError> {
        Packet::new(self.header(0, false, seq, client_time_ms), payload).serialize()
    }

    /// Ack-only packet so the peer's bookkeeping advances without traffic.
    pub fn keepalive(&self) -> Result<Vec<u8>, PacketError> {
        self.prepare_unreliable(Payload::Ack, 0, None)
    }

    /// Applies the piggybacked ack, then gates reliable packets to strict
    /// order. Rejected packets still contribute their ack.
    pub fn process_inbound(&self, header: &PacketHeader, now: Instant) -> InboundVerdict {
        if self.session.advance_peer_ack(header.ack) {
            let outcome = self.pending.acknowledge(header.ack, now);
            if let Some(sample) = outcome.rtt_sample {
                self.rtt.update(sample);
            }
        }

        if !header.reliable {
            return InboundVerdict::Deliver;
        }

        let verdict = check_order(self.session.expected_sequence(), header.packet_seq);
        if verdict == GateVerdict::Accept {
            self.session.set_expected_sequence(header.packet_seq);
        }
        verdict.into()
    }

    pub fn collect_resends(&self, now: Instant) -> ResendBatch {
        self.pending.collect_resends(now)
    }
}
