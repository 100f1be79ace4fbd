pub mod client;
pub mod clock;
pub mod error;
pub mod net;
pub mod prediction;
pub mod snapshot;

pub use client::{
    ClientConfig, ClientEvent, CredentialProvider, Credentials, InputSource, InstanceInfo, Intent,
    NetworkClient,
};
pub use error::NetError;
pub use net::{
    ConnectionState, DebugCommand, LinkQuality, NetworkStats, Packet, PacketError, PacketHeader,
    Payload, Reliability,
};
pub use prediction::PredictionReconciler;
pub use snapshot::{EntityFlags, EntityKind, EntityRegistry, EntityState, RenderWindow, Snapshot};
