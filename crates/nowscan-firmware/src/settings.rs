//! Node settings baked in at build time from `.env`

use log::warn;
use nowscan_core::MacAddress;
use nowscan_core::config::{NodeConfig, ScanSettings, WifiCredentials};
use nowscan_core::scan::ScanStrategy;

const WIFI_SSID: &str = env!("NOWSCAN_WIFI_SSID");
const WIFI_PASSWORD: &str = env!("NOWSCAN_WIFI_PASSWORD");
const PEER: &str = env!("NOWSCAN_PEER");
const ROLE: &str = env!("NOWSCAN_ROLE");
const STRATEGY: &str = env!("NOWSCAN_STRATEGY");

/// What the node does once its radio is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Scan for the peer, then run echo round trips against it
    Client,
    /// Echo whatever arrives until told to stop
    Server,
}

pub fn role() -> Role {
    match ROLE {
        "server" => Role::Server,
        "client" => Role::Client,
        other => {
            warn!("Unknown NOWSCAN_ROLE \"{}\", acting as client", other);
            Role::Client
        }
    }
}

pub fn node_config() -> NodeConfig<'static> {
    let strategy = match STRATEGY {
        "vote" => ScanStrategy::Vote,
        "first-hit" => ScanStrategy::FirstHit,
        other => {
            warn!("Unknown NOWSCAN_STRATEGY \"{}\", using vote", other);
            ScanStrategy::Vote
        }
    };
    let peer = match PEER.parse::<MacAddress>() {
        Ok(mac) => Some(mac),
        Err(e) => {
            if !PEER.is_empty() {
                warn!("Ignoring NOWSCAN_PEER \"{}\": {}", PEER, e);
            }
            None
        }
    };

    NodeConfig {
        wifi: WifiCredentials {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        scan: ScanSettings {
            retries: strategy.default_retries(),
            strategy,
            ..ScanSettings::default()
        },
        peer,
        peer_channel: None,
    }
}
