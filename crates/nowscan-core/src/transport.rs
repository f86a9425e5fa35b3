//! Peer-to-peer datagram transport (ESP-NOW)

use heapless::Vec;
use log::debug;
use thiserror_no_std::Error;

use crate::error::ErrorDetails;
use crate::mac::MacAddress;

/// Largest payload of a single ESP-NOW frame
pub const MAX_PAYLOAD_LEN: usize = 250;

/// Size of the ESP-NOW peer table
pub const MAX_PEERS: usize = 20;

/// Payload sent to test whether a peer is reachable
pub const PING_PAYLOAD: &[u8] = b"ping";

pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// A frame received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub peer: MacAddress,
    pub data: Payload,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("Peer already registered")]
    AlreadyRegistered,

    #[error("Peer table full (max: {max})")]
    TableFull { max: usize },

    #[error("Transport driver error: {0}")]
    Driver(ErrorDetails),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Receive failed: {0}")]
    Receive(ErrorDetails),
}

/// Send/receive primitives of the datagram service.
///
/// `send` reports link-layer delivery: `true` once the peer's radio
/// acknowledged the frame, not an application level reply.
pub trait Transport {
    fn add_peer(&mut self, peer: &MacAddress) -> Result<(), PeerError>;

    fn send(&mut self, peer: &MacAddress, payload: &[u8]) -> bool;

    /// Wait up to `timeout_ms` for the next frame. `Ok(None)` on timeout.
    fn receive(&mut self, timeout_ms: u32) -> Result<Option<Received>, TransportError>;
}

/// Register `peer`, treating an existing registration as success.
///
/// Returns whether the peer was newly added. Any other failure is returned.
pub fn register_peer<T: Transport + ?Sized>(
    transport: &mut T,
    peer: &MacAddress,
) -> Result<bool, PeerError> {
    match transport.add_peer(peer) {
        Ok(()) => {
            debug!("Registered peer {}", peer);
            Ok(true)
        }
        Err(PeerError::AlreadyRegistered) => Ok(false),
        Err(e) => Err(e),
    }
}
