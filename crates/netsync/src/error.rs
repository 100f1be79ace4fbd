use std::io;

use thiserror::Error;

use crate::net::{ConnectionState, PacketError};

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("session is {0}, gameplay commands need an active session")]
    NotActive(ConnectionState),
    #[error("a session is already open")]
    AlreadyConnected,
    #[error("no credentials available")]
    NoCredentials,
}
