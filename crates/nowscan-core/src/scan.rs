//! Channel discovery for an ESP-NOW peer
//!
//! The scanner sweeps the channels of a [`ChannelPlan`] in ascending order,
//! pinging the peer on each. Adjacent 2.4 GHz channels overlap, so a peer on
//! channel 6 is usually also "found" on 5 and 7. The voting strategy collects
//! every hit and resolves the run with a fixed tie-break table (see
//! [`select_channel`]); the first-hit strategy stops at the first success.
//!
//! # Example
//!
//! ```no_run
//! # use nowscan_core::{mac::MacAddress, radio::{Radio, WifiDriver}, scan::{self, ScanConfig}, transport::Transport};
//! # fn demo<D: WifiDriver, T: Transport>(radio: &mut Radio<D>, espnow: &mut T) {
//! let peer: MacAddress = "24:0a:c4:12:34:56".parse().unwrap();
//! let outcome = scan::scan(radio, espnow, &peer, &ScanConfig::default()).unwrap();
//! log::info!("peer channel: {}", outcome.channel_number()); // 0 when not found
//! # }
//! ```

use heapless::Vec;
use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::channel::{CHANNEL_COUNT, Channel, ChannelPlan};
use crate::mac::MacAddress;
use crate::radio::{Radio, RadioError, WifiDriver};
use crate::transport::{PING_PAYLOAD, PeerError, Transport, register_peer};

/// Ping attempts per channel for [`ScanStrategy::Vote`]
pub const DEFAULT_VOTE_RETRIES: u8 = 5;

/// Ping attempts per channel for [`ScanStrategy::FirstHit`]
pub const DEFAULT_FIRST_HIT_RETRIES: u8 = 3;

/// Channels on which a ping succeeded, in scan order
pub type HitSet = Vec<Channel, CHANNEL_COUNT>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanStrategy {
    /// Sweep every channel, then pick from the hits with the tie-break table
    #[default]
    Vote,
    /// Stop at the first channel with a successful ping
    FirstHit,
}

impl ScanStrategy {
    pub const fn default_retries(self) -> u8 {
        match self {
            Self::Vote => DEFAULT_VOTE_RETRIES,
            Self::FirstHit => DEFAULT_FIRST_HIT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Ping attempts per channel, must be at least 1
    pub retries: u8,
    pub plan: ChannelPlan,
    pub strategy: ScanStrategy,
}

impl ScanConfig {
    pub const fn new(strategy: ScanStrategy) -> Self {
        Self {
            retries: strategy.default_retries(),
            plan: ChannelPlan::WORLD,
            strategy,
        }
    }

    pub const fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub const fn with_plan(mut self, plan: ChannelPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Upper bound on pings sent by one scan
    pub const fn max_attempts(&self) -> u32 {
        self.plan.len() as u32 * self.retries as u32
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(ScanStrategy::Vote)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Retry count must be at least 1")]
    InvalidRetries,

    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    #[error("Peer registration failed: {0}")]
    Peer(#[from] PeerError),
}

/// Result of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub hits: HitSet,
    /// Channel the radio was left on for the peer, `None` when not found
    pub selected: Option<Channel>,
    /// Pings sent across all channels
    pub attempts: u32,
}

impl ScanOutcome {
    pub fn is_found(&self) -> bool {
        self.selected.is_some()
    }

    /// Selected channel number, or 0 when the peer was not found
    pub fn channel_number(&self) -> u8 {
        self.selected.map_or(0, Channel::number)
    }
}

/// Pick the peer's channel from the hits of a full sweep.
///
/// | hits                               | selected        |
/// |------------------------------------|-----------------|
/// | none                               | not found       |
/// | one                                | that channel    |
/// | two, first is the plan's lowest    | the second      |
/// | two otherwise, or three and more   | hit at index 1  |
///
/// Bleed-through is assumed to reach at most one neighbour on each side.
pub fn select_channel(hits: &[Channel], plan: &ChannelPlan) -> Option<Channel> {
    match hits {
        [] => None,
        [only] => Some(*only),
        [first, second] if *first == plan.first() => Some(*second),
        [_, second] => Some(*second),
        [_, second, ..] => Some(*second),
    }
}

/// Sweep the channel plan looking for `peer` and park the radio on its channel.
///
/// `peer` is registered with the transport first; an existing registration is
/// fine. When the peer is not found the radio returns to the channel it was on
/// before the scan. Fails without pinging if the radio's channel is pinned by
/// a station association or AP clients.
pub fn scan<D, T>(
    radio: &mut Radio<D>,
    transport: &mut T,
    peer: &MacAddress,
    config: &ScanConfig,
) -> Result<ScanOutcome, ScanError>
where
    D: WifiDriver,
    T: Transport + ?Sized,
{
    if config.retries == 0 {
        return Err(ScanError::InvalidRetries);
    }
    radio.ensure_channel_changeable()?;
    let starting_channel = radio.current_channel()?;
    register_peer(transport, peer)?;

    let mut hits = HitSet::new();
    let mut attempts = 0;

    for channel in config.plan.iter() {
        radio.set_channel(channel)?;
        if !ping_channel(transport, peer, config.retries, &mut attempts) {
            continue;
        }

        info!("Found peer {} on channel {}", peer, channel);
        // Capacity covers the whole band
        let _ = hits.push(channel);

        if config.strategy == ScanStrategy::FirstHit {
            return Ok(ScanOutcome {
                hits,
                selected: Some(channel),
                attempts,
            });
        }
    }

    let selected = select_channel(&hits, &config.plan);
    match selected {
        Some(channel) => {
            info!("Setting wifi channel to {}", channel);
            radio.set_channel(channel)?;
        }
        None => {
            // Without a known starting channel, park on the plan's first
            let fallback = starting_channel.unwrap_or(config.plan.first());
            warn!(
                "Peer {} not found on channels 1-{}, returning to channel {}",
                peer,
                config.plan.last(),
                fallback
            );
            radio.set_channel(fallback)?;
        }
    }

    Ok(ScanOutcome {
        hits,
        selected,
        attempts,
    })
}

/// Send the ping up to `retries` times, stopping at the first acknowledgement.
fn ping_channel<T: Transport + ?Sized>(
    transport: &mut T,
    peer: &MacAddress,
    retries: u8,
    attempts: &mut u32,
) -> bool {
    for attempt in 1..=retries {
        *attempts += 1;
        if transport.send(peer, PING_PAYLOAD) {
            return true;
        }
        trace!("Ping {}/{} to {} unacknowledged", attempt, retries, peer);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::Interface;
    use crate::sim::{SimDriver, SimTransport, SimulatedAir};

    const PEER: MacAddress = MacAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);

    fn ch(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    fn chs(numbers: &[u8]) -> HitSet {
        numbers.iter().map(|&n| ch(n)).collect()
    }

    fn setup(air: &SimulatedAir) -> (Radio<SimDriver>, SimTransport) {
        let (mut driver, transport) = air.split();
        driver.set_active(Interface::Station, true).unwrap();
        (Radio::new(driver), transport)
    }

    #[test]
    fn test_select_no_hits() {
        assert_eq!(select_channel(&[], &ChannelPlan::WORLD), None);
    }

    #[test]
    fn test_select_single_hit() {
        for n in 1..=13 {
            assert_eq!(select_channel(&chs(&[n]), &ChannelPlan::WORLD), Some(ch(n)));
        }
    }

    #[test]
    fn test_select_pair_starting_at_lowest_channel() {
        for k in 2..=13 {
            assert_eq!(
                select_channel(&chs(&[1, k]), &ChannelPlan::WORLD),
                Some(ch(k))
            );
        }
    }

    #[test]
    fn test_select_other_pairs_pick_second() {
        assert_eq!(select_channel(&chs(&[5, 6]), &ChannelPlan::WORLD), Some(ch(6)));
        assert_eq!(select_channel(&chs(&[12, 13]), &ChannelPlan::WORLD), Some(ch(13)));
        assert_eq!(select_channel(&chs(&[3, 9]), &ChannelPlan::WORLD), Some(ch(9)));
    }

    #[test]
    fn test_select_runs_pick_index_one() {
        assert_eq!(select_channel(&chs(&[5, 6, 7]), &ChannelPlan::WORLD), Some(ch(6)));
        assert_eq!(select_channel(&chs(&[1, 2, 3]), &ChannelPlan::WORLD), Some(ch(2)));
        assert_eq!(
            select_channel(&chs(&[4, 5, 6, 7]), &ChannelPlan::WORLD),
            Some(ch(5))
        );
    }

    #[test]
    fn test_scan_resolves_symmetric_bleed() {
        let air = SimulatedAir::new(PEER, ch(6)).with_bleed(&[ch(5), ch(7)]);
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::default().with_retries(3);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert_eq!(outcome.hits, chs(&[5, 6, 7]));
        assert_eq!(outcome.channel_number(), 6);
        assert_eq!(radio.channel().unwrap(), ch(6));
    }

    #[test]
    fn test_scan_prefers_higher_channel_at_band_edge() {
        let air = SimulatedAir::new(PEER, ch(1)).with_bleed(&[ch(2)]);
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::default().with_retries(3);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert_eq!(outcome.hits, chs(&[1, 2]));
        assert_eq!(outcome.channel_number(), 2);
        assert_eq!(radio.channel().unwrap(), ch(2));
    }

    #[test]
    fn test_scan_single_hit() {
        let air = SimulatedAir::new(PEER, ch(11));
        let (mut radio, mut transport) = setup(&air);

        let outcome = scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()).unwrap();
        assert_eq!(outcome.selected, Some(ch(11)));
        assert_eq!(radio.channel().unwrap(), ch(11));
    }

    #[test]
    fn test_scan_not_found_restores_starting_channel() {
        let air = SimulatedAir::new(PEER, ch(6)).with_peer_offline();
        let (mut radio, mut transport) = setup(&air);
        radio.set_channel(ch(4)).unwrap();

        let config = ScanConfig::default().with_retries(3);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert!(!outcome.is_found());
        assert_eq!(outcome.channel_number(), 0);
        assert!(outcome.hits.is_empty());
        assert_eq!(radio.channel().unwrap(), ch(4));
    }

    #[test]
    fn test_scan_not_found_after_join_without_channel_readback() {
        let air = SimulatedAir::new(PEER, ch(6))
            .with_peer_offline()
            .with_network("home", ch(11))
            .with_untracked_join();
        let (mut radio, mut transport) = setup(&air);
        let credentials = crate::radio::Credentials::new("home", "secret").unwrap();
        radio
            .connect(Some(&credentials), &mut crate::sim::NoopDelay)
            .unwrap();
        radio.disconnect(&mut crate::sim::NoopDelay).unwrap();
        assert_eq!(radio.current_channel(), Ok(None));

        let config = ScanConfig::default().with_retries(1);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert!(!outcome.is_found());
        assert_eq!(radio.channel().unwrap(), ch(1));
    }

    #[test]
    fn test_scan_attempt_budget() {
        let air = SimulatedAir::new(PEER, ch(6)).with_peer_offline();
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::default().with_retries(3);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert_eq!(outcome.attempts, config.max_attempts());
        assert_eq!(air.sends(), 13 * 3);
        for channel in ChannelPlan::WORLD.iter() {
            assert_eq!(air.sends_on(channel), 3);
        }
    }

    #[test]
    fn test_scan_stops_pinging_channel_after_first_ack() {
        let air = SimulatedAir::new(PEER, ch(6));
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::default().with_retries(4);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert_eq!(air.sends_on(ch(6)), 1);
        assert_eq!(outcome.attempts, 12 * 4 + 1);
        assert!(outcome.attempts <= config.max_attempts());
    }

    #[test]
    fn test_scan_retries_lossy_link() {
        let air = SimulatedAir::new(PEER, ch(9)).with_dropped_acks(2);
        let (mut radio, mut transport) = setup(&air);
        let config = ScanConfig::default().with_retries(3);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();
        assert_eq!(outcome.channel_number(), 9);
        assert_eq!(air.sends_on(ch(9)), 3);

        let air = SimulatedAir::new(PEER, ch(9)).with_dropped_acks(2);
        let (mut radio, mut transport) = setup(&air);
        let config = ScanConfig::default().with_retries(2);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();
        assert_eq!(outcome.channel_number(), 0);
    }

    #[test]
    fn test_first_hit_stops_at_lowest_hit() {
        let air = SimulatedAir::new(PEER, ch(6)).with_bleed(&[ch(5), ch(7)]);
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::new(ScanStrategy::FirstHit);
        assert_eq!(config.retries, DEFAULT_FIRST_HIT_RETRIES);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();

        assert_eq!(outcome.channel_number(), 5);
        assert_eq!(outcome.hits, chs(&[5]));
        assert_eq!(radio.channel().unwrap(), ch(5));
        assert_eq!(air.sends_on(ch(7)), 0);
    }

    #[test]
    fn test_scan_refuses_connected_radio() {
        let air = SimulatedAir::new(PEER, ch(6)).with_station_connected(true);
        let (mut radio, mut transport) = setup(&air);

        assert_eq!(
            scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()),
            Err(ScanError::Radio(RadioError::StationConnected))
        );
        assert_eq!(air.sends(), 0);
    }

    #[test]
    fn test_scan_refuses_busy_access_point() {
        let air = SimulatedAir::new(PEER, ch(6)).with_access_point_clients(true);
        let (mut radio, mut transport) = setup(&air);

        assert_eq!(
            scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()),
            Err(ScanError::Radio(RadioError::AccessPointBusy))
        );
    }

    #[test]
    fn test_scan_with_registered_peer() {
        let air = SimulatedAir::new(PEER, ch(3));
        let (mut radio, mut transport) = setup(&air);
        transport.add_peer(&PEER).unwrap();

        let outcome = scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()).unwrap();
        assert_eq!(outcome.channel_number(), 3);
    }

    #[test]
    fn test_scan_surfaces_full_peer_table() {
        let air = SimulatedAir::new(PEER, ch(3)).with_peer_capacity(0);
        let (mut radio, mut transport) = setup(&air);

        assert_eq!(
            scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()),
            Err(ScanError::Peer(PeerError::TableFull { max: 0 }))
        );
    }

    #[test]
    fn test_scan_rejects_zero_retries() {
        let air = SimulatedAir::new(PEER, ch(3));
        let (mut radio, mut transport) = setup(&air);

        let config = ScanConfig::default().with_retries(0);
        assert_eq!(
            scan(&mut radio, &mut transport, &PEER, &config),
            Err(ScanError::InvalidRetries)
        );
    }

    #[test]
    fn test_channel_fourteen_needs_japan_plan() {
        let air = SimulatedAir::new(PEER, ch(14));
        let (mut radio, mut transport) = setup(&air);

        let outcome = scan(&mut radio, &mut transport, &PEER, &ScanConfig::default()).unwrap();
        assert!(!outcome.is_found());

        let config = ScanConfig::default().with_plan(ChannelPlan::JAPAN);
        let outcome = scan(&mut radio, &mut transport, &PEER, &config).unwrap();
        assert_eq!(outcome.channel_number(), 14);
    }
}
