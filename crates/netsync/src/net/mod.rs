mod cancel;
mod connection;
mod endpoint;
mod protocol;
mod reliability;
mod stats;
mod tracking;

pub use cancel::CancelSignal;
pub use connection::{ConnectionState, Handshake, Session};
pub use endpoint::{DEFAULT_RECV_TIMEOUT, NetworkEndpoint};
pub use protocol::{
    DEFAULT_MAP_ID, DEFAULT_PORT, DebugCommand, MAX_DATAGRAM_SIZE, MonsterSnapshot, Packet,
    PacketError, PacketHeader, Payload, PlayerSnapshot, ProjectileSnapshot, Reliability,
    SnapshotPayload,
};
pub use reliability::{InboundVerdict, ReliableChannel};
pub use stats::{LinkCounters, LinkQuality, NetworkStats};
pub use tracking::{
    AckOutcome, DEFAULT_MAX_RETRIES, DEFAULT_RESEND_INTERVAL, GateVerdict, PendingPacket,
    PendingTable, ResendBatch, RttEstimator, check_order,
};
