//! Echo test over the peer-to-peer transport
//!
//! One device runs [`echo_server`], which sends every frame back to its
//! sender. Another runs [`echo_client`] (or single [`echo`] round trips)
//! against it and checks that what comes back matches what was sent.
//! Payloads starting with `!` are control messages; `!done` stops the server.

use heapless::Vec;
use log::{debug, error, info, warn};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;
use thiserror_no_std::Error;

use crate::mac::MacAddress;
use crate::transport::{
    MAX_PAYLOAD_LEN, MAX_PEERS, Payload, PeerError, Transport, TransportError, register_peer,
};

/// Payload that ends an echo server session
pub const DONE_MESSAGE: &[u8] = b"!done";

/// First byte of every generated test message, so none starts with `!`
pub const MESSAGE_MARKER: u8 = b'_';

/// Default time to wait for a reply or for the next message
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u32 = 1_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EchoError {
    #[error("Send to {peer} failed")]
    SendFailed { peer: MacAddress },

    #[error("Message of {len} bytes exceeds the {max} byte frame limit")]
    MessageTooLong { len: usize, max: usize },

    #[error("Peer registration failed: {0}")]
    Peer(#[from] PeerError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result of a single echo round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    Matched,
    Mismatched,
    Timeout,
}

/// Tally of an [`echo_client`] run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EchoReport {
    pub matched: u32,
    pub mismatched: u32,
    pub timeouts: u32,
}

impl EchoReport {
    pub fn total(&self) -> u32 {
        self.matched + self.mismatched + self.timeouts
    }

    pub fn all_matched(&self) -> bool {
        self.matched == self.total()
    }

    fn record(&mut self, outcome: EchoOutcome) {
        match outcome {
            EchoOutcome::Matched => self.matched += 1,
            EchoOutcome::Mismatched => self.mismatched += 1,
            EchoOutcome::Timeout => self.timeouts += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoServerConfig {
    /// A receive wait this long with no traffic ends the session
    pub idle_timeout_ms: u32,
}

impl Default for EchoServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

/// What an [`echo_server`] session handled
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EchoSummary {
    pub messages: u32,
    pub peers: Vec<MacAddress, MAX_PEERS>,
    /// Whether the session ended on a `!done` message rather than idling out
    pub done: bool,
}

/// Echo every received frame back to its sender until `!done` or silence.
pub fn echo_server<T: Transport + ?Sized>(
    transport: &mut T,
    config: &EchoServerConfig,
) -> Result<EchoSummary, EchoError> {
    let mut summary = EchoSummary::default();

    loop {
        let Some(received) = transport.receive(config.idle_timeout_ms)? else {
            info!(
                "Echo server idle for {} ms, stopping after {} messages",
                config.idle_timeout_ms, summary.messages
            );
            return Ok(summary);
        };
        let peer = received.peer;

        if !summary.peers.contains(&peer) {
            register_peer(transport, &peer)?;
            if summary.peers.push(peer).is_err() {
                warn!("Echo server peer list full, not tracking {}", peer);
            }
        }

        if !transport.send(&peer, &received.data) {
            error!("Echo send to {} failed", peer);
            return Err(EchoError::SendFailed { peer });
        }
        summary.messages += 1;
        debug!("Echoed {} bytes to {}", received.data.len(), peer);

        if received.data.as_slice() == DONE_MESSAGE {
            info!("Echo server done after {} messages", summary.messages);
            summary.done = true;
            return Ok(summary);
        }
    }
}

/// Send `message` to `peer` and wait for it to come back.
pub fn echo<T: Transport + ?Sized>(
    transport: &mut T,
    peer: &MacAddress,
    message: &[u8],
    timeout_ms: u32,
) -> Result<EchoOutcome, EchoError> {
    if message.len() > MAX_PAYLOAD_LEN {
        return Err(EchoError::MessageTooLong {
            len: message.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    register_peer(transport, peer)?;

    if !transport.send(peer, message) {
        error!("Echo send to {} failed", peer);
        return Err(EchoError::SendFailed { peer: *peer });
    }

    let Some(reply) = transport.receive(timeout_ms)? else {
        warn!("Echo from {} timed out", peer);
        return Ok(EchoOutcome::Timeout);
    };

    if reply.data.as_slice() == message {
        debug!("Echo of {} bytes OK", message.len());
        Ok(EchoOutcome::Matched)
    } else {
        warn!(
            "Echo mismatch from {}: sent {} bytes, received {} bytes",
            reply.peer,
            message.len(),
            reply.data.len()
        );
        Ok(EchoOutcome::Mismatched)
    }
}

/// Build a test message of `len` bytes: the marker followed by random bytes.
pub fn test_message(rng: &mut impl RngCore, len: usize) -> Result<Payload, EchoError> {
    let mut message = Payload::new();
    message
        .resize(len, 0)
        .map_err(|_| EchoError::MessageTooLong {
            len,
            max: MAX_PAYLOAD_LEN,
        })?;
    if let Some((first, rest)) = message.split_first_mut() {
        *first = MESSAGE_MARKER;
        rng.fill_bytes(rest);
    }
    Ok(message)
}

/// Run one echo round trip per entry of `lengths` with generated messages.
///
/// Send failures abort the run; mismatches and timeouts are tallied.
pub fn echo_client<T: Transport + ?Sized>(
    transport: &mut T,
    peer: &MacAddress,
    lengths: &[usize],
    rng_seed: u64,
    timeout_ms: u32,
) -> Result<EchoReport, EchoError> {
    let mut rng = WyRand::seed_from_u64(rng_seed);
    let mut report = EchoReport::default();

    for &len in lengths {
        let message = test_message(&mut rng, len)?;
        report.record(echo(transport, peer, &message, timeout_ms)?);
    }

    info!(
        "Echo client: {}/{} matched ({} mismatched, {} timed out)",
        report.matched,
        report.total(),
        report.mismatched,
        report.timeouts
    );
    Ok(report)
}

/// Tell a remote echo server to stop.
pub fn finish<T: Transport + ?Sized>(transport: &mut T, peer: &MacAddress) -> Result<(), EchoError> {
    register_peer(transport, peer)?;
    if transport.send(peer, DONE_MESSAGE) {
        Ok(())
    } else {
        Err(EchoError::SendFailed { peer: *peer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::radio::{Interface, Radio, WifiDriver};
    use crate::sim::{RemoteBehaviour, SimTransport, SimulatedAir};

    const PEER: MacAddress = MacAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);
    const OTHER: MacAddress = MacAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x02]);

    /// Air with the local radio already on the peer's channel
    fn tuned(air: SimulatedAir) -> (SimulatedAir, SimTransport) {
        let (mut driver, transport) = air.split();
        driver.set_active(Interface::Station, true).unwrap();
        let mut radio = Radio::new(driver);
        radio.set_channel(Channel::new(6).unwrap()).unwrap();
        (air, transport)
    }

    #[test]
    fn test_echo_matches() {
        let (_air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));
        assert_eq!(echo(&mut transport, &PEER, b"_hello", 10), Ok(EchoOutcome::Matched));
    }

    #[test]
    fn test_echo_detects_corruption() {
        let air = SimulatedAir::new(PEER, Channel::new(6).unwrap())
            .with_behaviour(RemoteBehaviour::Corrupt);
        let (_air, mut transport) = tuned(air);
        assert_eq!(
            echo(&mut transport, &PEER, b"_hello", 10),
            Ok(EchoOutcome::Mismatched)
        );
    }

    #[test]
    fn test_echo_times_out_on_silent_peer() {
        let air = SimulatedAir::new(PEER, Channel::new(6).unwrap())
            .with_behaviour(RemoteBehaviour::Silent);
        let (_air, mut transport) = tuned(air);
        assert_eq!(echo(&mut transport, &PEER, b"_hello", 10), Ok(EchoOutcome::Timeout));
    }

    #[test]
    fn test_echo_send_failure_is_an_error() {
        let (_air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(2).unwrap()));
        assert_eq!(
            echo(&mut transport, &PEER, b"_hello", 10),
            Err(EchoError::SendFailed { peer: PEER })
        );
    }

    #[test]
    fn test_echo_rejects_oversized_message() {
        let (_air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));
        let message = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            echo(&mut transport, &PEER, &message, 10),
            Err(EchoError::MessageTooLong {
                len: MAX_PAYLOAD_LEN + 1,
                max: MAX_PAYLOAD_LEN
            })
        );
    }

    #[test]
    fn test_generated_messages_never_start_with_control_prefix() {
        let mut rng = WyRand::seed_from_u64(7);
        for len in [1, 2, 16, MAX_PAYLOAD_LEN] {
            let message = test_message(&mut rng, len).unwrap();
            assert_eq!(message.len(), len);
            assert_eq!(message[0], MESSAGE_MARKER);
        }
        assert!(test_message(&mut rng, 0).unwrap().is_empty());
        assert!(test_message(&mut rng, MAX_PAYLOAD_LEN + 1).is_err());
    }

    #[test]
    fn test_echo_client_tallies_round_trips() {
        let (air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));

        let lengths = [1, 10, 100, 250];
        let report = echo_client(&mut transport, &PEER, &lengths, 42, 10).unwrap();

        assert_eq!(report.matched, 4);
        assert!(report.all_matched());
        let delivered = air.delivered();
        assert_eq!(delivered.len(), 4);
        assert!(delivered.iter().all(|(_, data)| data[0] == MESSAGE_MARKER));
    }

    #[test]
    fn test_echo_client_is_deterministic_per_seed() {
        let (air_a, mut a) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));
        let (air_b, mut b) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));

        echo_client(&mut a, &PEER, &[32], 9, 10).unwrap();
        echo_client(&mut b, &PEER, &[32], 9, 10).unwrap();
        assert_eq!(air_a.delivered(), air_b.delivered());
    }

    #[test]
    fn test_server_echoes_until_done() {
        let air = SimulatedAir::new(PEER, Channel::new(6).unwrap())
            .with_behaviour(RemoteBehaviour::Silent)
            .with_remote(OTHER, Channel::new(6).unwrap());
        let (air, mut transport) = tuned(air);
        air.deliver(PEER, b"_one");
        air.deliver(OTHER, b"_two");
        air.deliver(PEER, DONE_MESSAGE);
        air.deliver(PEER, b"_never");

        let summary = echo_server(&mut transport, &EchoServerConfig::default()).unwrap();

        assert!(summary.done);
        assert_eq!(summary.messages, 3);
        assert_eq!(summary.peers.as_slice(), &[PEER, OTHER]);
        assert!(air.is_registered(&OTHER));
        let delivered = air.delivered();
        assert_eq!(delivered[1].0, OTHER);
        assert_eq!(delivered[2].1.as_slice(), DONE_MESSAGE);
    }

    #[test]
    fn test_server_stops_when_idle() {
        let air = SimulatedAir::new(PEER, Channel::new(6).unwrap())
            .with_behaviour(RemoteBehaviour::Silent);
        let (air, mut transport) = tuned(air);
        air.deliver(PEER, b"_one");

        let summary = echo_server(&mut transport, &EchoServerConfig::default()).unwrap();
        assert!(!summary.done);
        assert_eq!(summary.messages, 1);
    }

    #[test]
    fn test_server_stops_on_failed_send() {
        let (air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));
        let stranger = MacAddress::new([0x02, 0, 0, 0, 0, 9]);
        air.deliver(stranger, b"_hi");

        assert_eq!(
            echo_server(&mut transport, &EchoServerConfig::default()),
            Err(EchoError::SendFailed { peer: stranger })
        );
    }

    #[test]
    fn test_finish_sends_done() {
        let (air, mut transport) = tuned(SimulatedAir::new(PEER, Channel::new(6).unwrap()));
        finish(&mut transport, &PEER).unwrap();
        assert_eq!(air.delivered()[0].1.as_slice(), DONE_MESSAGE);
    }
}
