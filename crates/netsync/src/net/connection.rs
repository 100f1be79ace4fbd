use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    /// Socket open, `connect` and `start` sent, waiting for `hello`.
    Connecting = 1,
    AwaitingConnectOk = 2,
    AwaitingInstanceStart = 3,
    Active = 4,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::AwaitingConnectOk,
            3 => ConnectionState::AwaitingInstanceStart,
            4 => ConnectionState::Active,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingConnectOk => "awaiting connect_ok",
            Self::AwaitingInstanceStart => "awaiting instance_start",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

/// Handshake milestone observed on the inbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Hello,
    ConnectOk,
    InstanceStart,
}

/// Per-connection bookkeeping shared by the network threads and the
/// application tick.
#[derive(Debug)]
pub struct Session {
    state: AtomicU8,
    session_id: RwLock<Option<Uuid>>,
    send_sequence: AtomicU32,
    peer_ack: AtomicU32,
    expected_sequence: AtomicU32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            session_id: RwLock::new(None),
            send_sequence: AtomicU32::new(0),
            peer_ack: AtomicU32::new(0),
            expected_sequence: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    pub fn session_id(&self) -> Option<Uuid> {
        *self.session_id.read()
    }

    /// Highest reliable sequence the peer has acknowledged.
    pub fn peer_ack(&self) -> u32 {
        self.peer_ack.load(Ordering::Acquire)
    }

    /// Highest inbound reliable sequence accepted in order; piggybacked as
    /// the ack on every outbound packet.
    pub fn expected_sequence(&self) -> u32 {
        self.expected_sequence.load(Ordering::Acquire)
    }

    pub fn last_sent_sequence(&self) -> u32 {
        self.send_sequence.load(Ordering::Acquire)
    }

    pub(crate) fn begin_connect(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Disconnected as u8,
                ConnectionState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns the previous state.
    pub(crate) fn mark_disconnected(&self) -> ConnectionState {
        let previous = self
            .state
            .swap(ConnectionState::Disconnected as u8, Ordering::AcqRel);
        ConnectionState::from(previous)
    }

    /// Advances the handshake. Out-of-band milestones (e.g. a second hello)
    /// leave the state untouched. Returns the new state when it changed.
    pub(crate) fn observe(&self, milestone: Handshake) -> Option<ConnectionState> {
        let current = self.state();
        let next = match (current, milestone) {
            (ConnectionState::Connecting, Handshake::Hello) => ConnectionState::AwaitingConnectOk,
            (
                ConnectionState::Connecting | ConnectionState::AwaitingConnectOk,
                Handshake::ConnectOk,
            ) => ConnectionState::AwaitingInstanceStart,
            (ConnectionState::AwaitingInstanceStart, Handshake::InstanceStart) => {
                ConnectionState::Active
            }
            _ => return None,
        };

        self.state
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| next)
    }

    pub(crate) fn set_session_id(&self, id: Uuid) {
        *self.session_id.write() = Some(id);
    }

    pub(crate) fn next_send_sequence(&self) -> u32 {
        self.send_sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns true when `ack` moved the peer ack forward.
    pub(crate) fn advance_peer_ack(&self, ack: u32) -> bool {
        self.peer_ack.fetch_max(ack, Ordering::AcqRel) < ack
    }

    pub(crate) fn set_expected_sequence(&self, sequence: u32) {
        self.expected_sequence.store(sequence, Ordering::Release);
    }
}
