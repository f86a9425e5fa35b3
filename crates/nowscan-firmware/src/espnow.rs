//! ESP-NOW [`Transport`] over the `esp-radio` split handles

use embassy_time::{Duration, Instant, block_for};
use esp_radio::esp_now::{
    EspNowManager, EspNowReceiver, EspNowSender, EspNowWifiInterface, PeerInfo,
};
use nowscan_core::error::details;
use nowscan_core::mac::MacAddress;
use nowscan_core::transport::{
    MAX_PEERS, Payload, PeerError, Received, Transport, TransportError,
};

const RECEIVE_POLL: Duration = Duration::from_millis(1);

pub struct EspNowTransport<'d> {
    manager: &'d EspNowManager<'d>,
    sender: EspNowSender<'d>,
    receiver: EspNowReceiver<'d>,
    peers: usize,
}

impl<'d> EspNowTransport<'d> {
    pub fn new(
        manager: &'d EspNowManager<'d>,
        sender: EspNowSender<'d>,
        receiver: EspNowReceiver<'d>,
    ) -> Self {
        Self {
            manager,
            sender,
            receiver,
            peers: 0,
        }
    }
}

impl Transport for EspNowTransport<'_> {
    fn add_peer(&mut self, peer: &MacAddress) -> Result<(), PeerError> {
        let address = peer.octets();
        if self.manager.peer_exists(&address) {
            return Err(PeerError::AlreadyRegistered);
        }
        if self.peers >= MAX_PEERS {
            return Err(PeerError::TableFull { max: MAX_PEERS });
        }

        self.manager
            .add_peer(PeerInfo {
                interface: EspNowWifiInterface::Sta,
                peer_address: address,
                lmk: None,
                // Follow whatever channel the radio is on
                channel: None,
                encrypt: false,
            })
            .map_err(|e| PeerError::Driver(details(&e)))?;
        self.peers += 1;
        Ok(())
    }

    fn send(&mut self, peer: &MacAddress, payload: &[u8]) -> bool {
        match self.sender.send(&peer.octets(), payload) {
            Ok(waiter) => waiter.wait().is_ok(),
            Err(_) => false,
        }
    }

    fn receive(&mut self, timeout_ms: u32) -> Result<Option<Received>, TransportError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms.into());

        loop {
            if let Some(frame) = self.receiver.receive() {
                let data = Payload::from_slice(frame.data())
                    .map_err(|e| TransportError::Receive(details(&e)))?;
                return Ok(Some(Received {
                    peer: MacAddress::new(frame.info.src_address),
                    data,
                }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            block_for(RECEIVE_POLL);
        }
    }
}
