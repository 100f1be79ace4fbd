use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;

use super::ClientEvent;
use super::config::ClientConfig;
use crate::clock;
use crate::error::NetError;
use crate::net::{
    CancelSignal, ConnectionState, Handshake, InboundVerdict, LinkQuality, NetworkEndpoint,
    NetworkStats, Packet, Payload, ReliableChannel,
};
use crate::snapshot::{Snapshot, SnapshotBuffer};

/// State shared between the application thread and the network loops of
/// one connection.
#[derive(Debug)]
pub(crate) struct Link {
    pub endpoint: NetworkEndpoint,
    pub channel: ReliableChannel,
    pub snapshots: Mutex<SnapshotBuffer>,
    pub cancel: CancelSignal,
    pub config: ClientConfig,
    events: Sender<ClientEvent>,
}

impl Link {
    pub fn new(
        endpoint: NetworkEndpoint,
        config: ClientConfig,
        events: Sender<ClientEvent>,
    ) -> Self {
        Self {
            endpoint,
            channel: ReliableChannel::new(config.resend_interval, config.max_retries),
            snapshots: Mutex::new(SnapshotBuffer::new(config.snapshot_capacity)),
            cancel: CancelSignal::new(),
            config,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.session().state()
    }

    pub fn stats(&self) -> NetworkStats {
        let rtt = self.channel.rtt();
        NetworkStats {
            pending_reliable: self.channel.pending().len(),
            rtt_ms: rtt.srtt_ms(),
            rtt_variance: rtt.rtt_var_ms(),
            ..self.endpoint.stats()
        }
    }

    /// Smoothed RTT, or zero before the first sample.
    pub fn rtt_estimate_ms(&self) -> f64 {
        let rtt = self.channel.rtt();
        if rtt.sample_count() == 0 {
            0.0
        } else {
            rtt.srtt_ms() as f64
        }
    }

    fn emit(&self, event: ClientEvent) {
        // The receiver only goes away during teardown.
        let _ = self.events.send(event);
    }

    /// Returns the packet sequence assigned to the message.
    pub fn send_reliable(&self, payload: Payload, seq: u32) -> Result<u32, NetError> {
        let (sequence, data) = self.channel.prepare_reliable(
            payload,
            seq,
            Some(clock::unix_ms()),
            Instant::now(),
        )?;
        self.endpoint.send_bytes(&data)?;
        Ok(sequence)
    }

    pub fn send_unreliable(&self, payload: Payload, seq: u32) -> Result<(), NetError> {
        let data = self
            .channel
            .prepare_unreliable(payload, seq, Some(clock::unix_ms()))?;
        self.endpoint.send_bytes(&data)?;
        Ok(())
    }

    pub fn send(&self, payload: Payload, seq: u32) -> Result<(), NetError> {
        if payload.reliability().is_reliable() {
            self.send_reliable(payload, seq).map(|_| ())
        } else {
            self.send_unreliable(payload, seq)
        }
    }

    /// Drops the session and stops every loop. Only the first call reports
    /// a `Disconnected` event.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let previous = self.channel.session().mark_disconnected();
        if !self.cancel.cancel() {
            return;
        }
        if previous != ConnectionState::Disconnected {
            warn!("Connection lost ({}): {}", previous, reason);
        }
        self.emit(ClientEvent::Disconnected { reason });
    }

    pub fn handle_datagram(&self, data: &[u8], now: Instant) {
        let packet = match Packet::deserialize(data) {
            Ok(packet) => packet,
            Err(e) => {
                self.endpoint.counters().record_malformed();
                trace!("Dropping malformed datagram ({} bytes): {}", data.len(), e);
                return;
            }
        };

        match self.channel.process_inbound(&packet.header, now) {
            InboundVerdict::Deliver => self.dispatch(packet),
            InboundVerdict::Duplicate => {
                self.endpoint.counters().record_duplicate();
                trace!("Duplicate reliable packet {}", packet.header.packet_seq);
            }
            InboundVerdict::Gap => {
                self.endpoint.counters().record_gap();
                trace!(
                    "Out-of-order reliable packet {} (expected {})",
                    packet.header.packet_seq,
                    self.channel.session().expected_sequence().wrapping_add(1)
                );
            }
        }
    }

    fn dispatch(&self, packet: Packet) {
        let session = self.channel.session();

        match packet.payload {
            Payload::Hello { tick_rate } => {
                let Some(session_id) = packet.header.session_id else {
                    debug!("Ignoring hello without a session id");
                    return;
                };
                session.set_session_id(session_id);
                if let Some(state) = session.observe(Handshake::Hello) {
                    debug!("Hello from server, session {} ({})", session_id, state);
                }
                self.emit(ClientEvent::Hello {
                    session_id,
                    tick_rate,
                });
            }
            Payload::ConnectOk {
                character_id,
                season_id,
                player_name,
            } => {
                if let Some(state) = session.observe(Handshake::ConnectOk) {
                    debug!("Connect accepted for {} ({})", player_name, state);
                }
                self.emit(ClientEvent::ConnectOk {
                    character_id,
                    season_id,
                    player_name,
                });
            }
            Payload::InstanceStart {
                instance_id,
                seed,
                map_id,
            } => {
                if session.observe(Handshake::InstanceStart) == Some(ConnectionState::Active) {
                    info!("Instance {} started on map '{}'", instance_id, map_id);
                }
                self.emit(ClientEvent::InstanceStart(super::InstanceInfo {
                    instance_id,
                    seed,
                    map_id,
                }));
            }
            Payload::Snapshot(payload) => {
                let snapshot = Arc::new(Snapshot::from(payload));
                let inserted = self
                    .snapshots
                    .lock()
                    .push(Arc::clone(&snapshot), clock::now_ms());
                if inserted {
                    self.emit(ClientEvent::Snapshot(snapshot));
                } else {
                    trace!("Duplicate snapshot at {}", snapshot.server_time_ms);
                }
            }
            Payload::Error { code, message } => {
                warn!("Server error {}: {}", code, message);
                self.emit(ClientEvent::ServerError { code, message });
            }
            Payload::NetStats {
                ticks_last_sec,
                sent_snapshots_last_sec,
                packet_loss_pct,
                avg_ping_ms,
            } => {
                self.emit(ClientEvent::NetStats(LinkQuality {
                    ticks_last_sec,
                    sent_snapshots_last_sec,
                    packet_loss_percent: packet_loss_pct,
                    avg_ping_ms,
                }));
            }
            Payload::Disconnect { reason } => {
                info!("Disconnected by server");
                self.fail(reason.unwrap_or_else(|| "closed by server".to_string()));
            }
            Payload::Ack => {}
            other => {
                trace!("Ignoring client-bound message type '{}'", other.kind());
            }
        }
    }
}
