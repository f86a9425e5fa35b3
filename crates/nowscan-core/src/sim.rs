//! In-memory radio and ESP-NOW transport
//!
//! [`SimulatedAir`] models one local chip and any number of remote devices,
//! each listening on a channel. A frame sent while the local radio sits on a
//! remote's channel, or on one of its bleed channels, is acknowledged.
//! Remotes can echo payloads back the way an echo server would; the scan
//! ping is never echoed.
//!
//! [`SimulatedAir::split`] hands out a [`SimDriver`] and a [`SimTransport`]
//! that share the same state, mirroring how the firmware drives the Wi-Fi
//! controller and ESP-NOW separately.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::channel::{CHANNEL_COUNT, Channel};
use crate::mac::MacAddress;
use crate::radio::{
    ChipFamily, Credentials, Interface, MAX_SSID_LEN, PowerSave, Protocol, WifiDriver,
};
use crate::transport::{PING_PAYLOAD, Payload, PeerError, Received, Transport, TransportError};

/// [`DelayNs`] that returns immediately, for driving timeouts in tests
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// The operation is not modelled for this chip
    Unsupported,
    /// The interface must be active for this operation
    InterfaceInactive(Interface),
    /// The chip refused the request
    Rejected,
}

/// What a remote device does with frames it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBehaviour {
    /// Acknowledge only
    Silent,
    /// Send every payload back
    Echo,
    /// Send every payload back with the last byte flipped
    Corrupt,
}

#[derive(Debug, Clone)]
struct Remote {
    mac: MacAddress,
    channel: Channel,
    bleed: Vec<Channel>,
    online: bool,
    behaviour: RemoteBehaviour,
    /// Acknowledgements still to be lost
    dropped_acks: u32,
}

impl Remote {
    fn hears(&self, channel: Channel) -> bool {
        self.online && (self.channel == channel || self.bleed.contains(&channel))
    }
}

#[derive(Debug)]
struct AirState {
    family: ChipFamily,
    channel: Channel,
    /// Cleared by an untracked join until the next channel write
    channel_known: bool,
    untracked_join: bool,
    channel_write_fails: bool,
    access_point_stuck_on: bool,
    sticky_association: bool,
    active: [bool; 2],
    station_connected: bool,
    ap_clients: bool,
    networks: Vec<(String<MAX_SSID_LEN>, Channel)>,
    last_network: Option<String<MAX_SSID_LEN>>,
    joined: Option<String<MAX_SSID_LEN>>,
    power_save: PowerSave,
    protocol: Protocol,
    protocol_supported: bool,
    channel_writes: [u32; 2],

    remotes: Vec<Remote>,
    peers: Vec<MacAddress>,
    peer_capacity: usize,
    sends: u32,
    sends_per_channel: [u32; CHANNEL_COUNT + 1],
    inbox: VecDeque<Received>,
    outbox: Vec<(MacAddress, Payload)>,
}

const fn slot(iface: Interface) -> usize {
    match iface {
        Interface::Station => 0,
        Interface::AccessPoint => 1,
    }
}

/// Shared simulated radio environment
#[derive(Debug, Clone)]
pub struct SimulatedAir {
    state: Rc<RefCell<AirState>>,
}

impl SimulatedAir {
    /// An ESP32 with both interfaces off on channel 1, and one echoing remote
    /// `peer` listening on `channel`.
    pub fn new(peer: MacAddress, channel: Channel) -> Self {
        let state = AirState {
            family: ChipFamily::Esp32,
            channel: Channel::ONE,
            channel_known: true,
            untracked_join: false,
            channel_write_fails: false,
            access_point_stuck_on: false,
            sticky_association: false,
            active: [false; 2],
            station_connected: false,
            ap_clients: false,
            networks: Vec::new(),
            last_network: None,
            joined: None,
            power_save: PowerSave::None,
            protocol: Protocol::BGN,
            protocol_supported: true,
            channel_writes: [0; 2],
            remotes: Vec::new(),
            peers: Vec::new(),
            peer_capacity: crate::transport::MAX_PEERS,
            sends: 0,
            sends_per_channel: [0; CHANNEL_COUNT + 1],
            inbox: VecDeque::new(),
            outbox: Vec::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
        .with_remote(peer, channel)
    }

    fn update(self, f: impl FnOnce(&mut AirState)) -> Self {
        f(&mut self.state.borrow_mut());
        self
    }

    fn update_primary(self, f: impl FnOnce(&mut Remote)) -> Self {
        self.update(|s| {
            if let Some(remote) = s.remotes.first_mut() {
                f(remote);
            }
        })
    }

    /// Add another remote device listening on `channel`
    pub fn with_remote(self, mac: MacAddress, channel: Channel) -> Self {
        self.update(|s| {
            s.remotes.push(Remote {
                mac,
                channel,
                bleed: Vec::new(),
                online: true,
                behaviour: RemoteBehaviour::Echo,
                dropped_acks: 0,
            })
        })
    }

    /// Neighbouring channels on which the primary peer is also heard
    pub fn with_bleed(self, channels: &[Channel]) -> Self {
        let channels = channels.to_vec();
        self.update_primary(|r| r.bleed = channels)
    }

    pub fn with_peer_offline(self) -> Self {
        self.update_primary(|r| r.online = false)
    }

    pub fn with_behaviour(self, behaviour: RemoteBehaviour) -> Self {
        self.update_primary(|r| r.behaviour = behaviour)
    }

    /// Lose the first `count` acknowledgements the primary peer would send
    pub fn with_dropped_acks(self, count: u32) -> Self {
        self.update_primary(|r| r.dropped_acks = count)
    }

    pub fn with_family(self, family: ChipFamily) -> Self {
        self.update(|s| s.family = family)
    }

    pub fn with_station_connected(self, connected: bool) -> Self {
        self.update(|s| {
            s.active[slot(Interface::Station)] |= connected;
            s.station_connected = connected;
        })
    }

    pub fn with_access_point_clients(self, clients: bool) -> Self {
        self.update(|s| {
            s.active[slot(Interface::AccessPoint)] |= clients;
            s.ap_clients = clients;
        })
    }

    /// A network the station can join, operating on `channel`
    pub fn with_network(self, ssid: &str, channel: Channel) -> Self {
        let ssid = String::try_from(ssid).unwrap_or_default();
        self.update(|s| s.networks.push((ssid, channel)))
    }

    pub fn with_power_save(self, mode: PowerSave) -> Self {
        self.update(|s| s.power_save = mode)
    }

    pub fn with_protocol_support(self, supported: bool) -> Self {
        self.update(|s| s.protocol_supported = supported)
    }

    pub fn with_peer_capacity(self, capacity: usize) -> Self {
        self.update(|s| s.peer_capacity = capacity)
    }

    /// Joining a network leaves the channel unreadable until it is next set
    pub fn with_untracked_join(self) -> Self {
        self.update(|s| s.untracked_join = true)
    }

    /// Every channel write is rejected
    pub fn with_channel_write_failure(self) -> Self {
        self.update(|s| s.channel_write_fails = true)
    }

    /// Deactivating the access point is rejected
    pub fn with_access_point_stuck_on(self) -> Self {
        self.update(|s| s.access_point_stuck_on = true)
    }

    /// A disconnect request leaves the station associated
    pub fn with_sticky_association(self) -> Self {
        self.update(|s| s.sticky_association = true)
    }

    /// Driver and transport handles over this air
    pub fn split(&self) -> (SimDriver, SimTransport) {
        (
            SimDriver {
                state: Rc::clone(&self.state),
            },
            SimTransport {
                state: Rc::clone(&self.state),
            },
        )
    }

    /// Queue a frame for the local transport to receive
    pub fn deliver(&self, from: MacAddress, data: &[u8]) {
        let data = Payload::from_slice(data).unwrap_or_default();
        self.state
            .borrow_mut()
            .inbox
            .push_back(Received { peer: from, data });
    }

    /// Total frames sent by the local transport
    pub fn sends(&self) -> u32 {
        self.state.borrow().sends
    }

    pub fn sends_on(&self, channel: Channel) -> u32 {
        self.state.borrow().sends_per_channel[channel.number() as usize]
    }

    /// Acknowledged frames, in send order
    pub fn delivered(&self) -> Vec<(MacAddress, Payload)> {
        self.state.borrow().outbox.clone()
    }

    /// How many channel changes went through `iface`
    pub fn channel_writes_via(&self, iface: Interface) -> u32 {
        self.state.borrow().channel_writes[slot(iface)]
    }

    pub fn is_registered(&self, peer: &MacAddress) -> bool {
        self.state.borrow().peers.contains(peer)
    }
}

/// [`WifiDriver`] half of a [`SimulatedAir`]
#[derive(Debug)]
pub struct SimDriver {
    state: Rc<RefCell<AirState>>,
}

impl WifiDriver for SimDriver {
    type Error = SimError;

    fn family(&self) -> ChipFamily {
        self.state.borrow().family
    }

    fn is_active(&self, iface: Interface) -> bool {
        self.state.borrow().active[slot(iface)]
    }

    fn set_active(&mut self, iface: Interface, active: bool) -> Result<(), SimError> {
        let mut s = self.state.borrow_mut();
        if !active && iface == Interface::AccessPoint && s.access_point_stuck_on {
            return Err(SimError::Rejected);
        }
        s.active[slot(iface)] = active;
        if !active {
            match iface {
                Interface::Station => {
                    s.station_connected = false;
                    s.joined = None;
                }
                Interface::AccessPoint => s.ap_clients = false,
            }
        }
        Ok(())
    }

    fn is_connected(&self, iface: Interface) -> bool {
        let s = self.state.borrow();
        match iface {
            Interface::Station => s.station_connected,
            Interface::AccessPoint => s.ap_clients,
        }
    }

    fn channel(&self, _iface: Interface) -> Result<Channel, SimError> {
        let s = self.state.borrow();
        if s.channel_known {
            Ok(s.channel)
        } else {
            Err(SimError::Unsupported)
        }
    }

    fn set_channel(&mut self, iface: Interface, channel: Channel) -> Result<(), SimError> {
        let mut s = self.state.borrow_mut();
        if !s.active[slot(iface)] {
            return Err(SimError::InterfaceInactive(iface));
        }
        if s.channel_write_fails {
            return Err(SimError::Rejected);
        }
        s.channel = channel;
        s.channel_known = true;
        s.channel_writes[slot(iface)] += 1;
        Ok(())
    }

    fn mac(&self, iface: Interface) -> MacAddress {
        // Espressif derives the AP address from the station address
        let last = match iface {
            Interface::Station => 0x10,
            Interface::AccessPoint => 0x11,
        };
        MacAddress::new([0x24, 0x0a, 0xc4, 0x5a, 0x00, last])
    }

    fn connect(&mut self, credentials: Option<&Credentials>) -> Result<(), SimError> {
        let mut s = self.state.borrow_mut();
        if !s.active[slot(Interface::Station)] {
            return Err(SimError::InterfaceInactive(Interface::Station));
        }
        if let Some(credentials) = credentials {
            s.last_network = Some(credentials.ssid.clone());
        }
        let Some(target) = s.last_network.clone() else {
            return Ok(());
        };
        let network = s.networks.iter().find(|(ssid, _)| *ssid == target).cloned();
        if let Some((ssid, channel)) = network {
            s.channel = channel;
            s.channel_known = !s.untracked_join;
            s.joined = Some(ssid);
            s.station_connected = true;
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SimError> {
        let mut s = self.state.borrow_mut();
        if s.sticky_association {
            return Ok(());
        }
        s.station_connected = false;
        s.joined = None;
        Ok(())
    }

    fn ssid(&self) -> Option<String<MAX_SSID_LEN>> {
        self.state.borrow().joined.clone()
    }

    fn power_save(&self) -> Result<PowerSave, SimError> {
        Ok(self.state.borrow().power_save)
    }

    fn set_power_save(&mut self, mode: PowerSave) -> Result<(), SimError> {
        self.state.borrow_mut().power_save = mode;
        Ok(())
    }

    fn protocol(&self, _iface: Interface) -> Result<Protocol, SimError> {
        let s = self.state.borrow();
        if s.protocol_supported {
            Ok(s.protocol)
        } else {
            Err(SimError::Unsupported)
        }
    }

    fn set_protocol(&mut self, _iface: Interface, protocol: Protocol) -> Result<(), SimError> {
        let mut s = self.state.borrow_mut();
        if !s.protocol_supported {
            return Err(SimError::Unsupported);
        }
        s.protocol = protocol;
        Ok(())
    }

    fn is_unsupported(error: &SimError) -> bool {
        matches!(error, SimError::Unsupported)
    }
}

/// [`Transport`] half of a [`SimulatedAir`]
#[derive(Debug)]
pub struct SimTransport {
    state: Rc<RefCell<AirState>>,
}

impl Transport for SimTransport {
    fn add_peer(&mut self, peer: &MacAddress) -> Result<(), PeerError> {
        let mut s = self.state.borrow_mut();
        if s.peers.contains(peer) {
            return Err(PeerError::AlreadyRegistered);
        }
        if s.peers.len() >= s.peer_capacity {
            return Err(PeerError::TableFull {
                max: s.peer_capacity,
            });
        }
        s.peers.push(*peer);
        Ok(())
    }

    fn send(&mut self, peer: &MacAddress, payload: &[u8]) -> bool {
        let mut s = self.state.borrow_mut();
        let s = &mut *s;
        let channel = s.channel;
        s.sends += 1;
        s.sends_per_channel[channel.number() as usize] += 1;

        if !s.peers.contains(peer) {
            return false;
        }
        let Some(remote) = s.remotes.iter_mut().find(|r| r.mac == *peer) else {
            return false;
        };
        if !remote.hears(channel) {
            return false;
        }
        if remote.dropped_acks > 0 {
            remote.dropped_acks -= 1;
            return false;
        }

        let Ok(data) = Payload::from_slice(payload) else {
            return false;
        };
        if payload != PING_PAYLOAD {
            let reply = match remote.behaviour {
                RemoteBehaviour::Silent => None,
                RemoteBehaviour::Echo => Some(data.clone()),
                RemoteBehaviour::Corrupt => {
                    let mut corrupted = data.clone();
                    if let Some(last) = corrupted.last_mut() {
                        *last ^= 0xff;
                    }
                    Some(corrupted)
                }
            };
            if let Some(reply) = reply {
                s.inbox.push_back(Received {
                    peer: *peer,
                    data: reply,
                });
            }
        }
        s.outbox.push((*peer, data));
        true
    }

    fn receive(&mut self, _timeout_ms: u32) -> Result<Option<Received>, TransportError> {
        Ok(self.state.borrow_mut().inbox.pop_front())
    }
}
