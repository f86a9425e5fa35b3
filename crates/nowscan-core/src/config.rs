//! Node configuration and its compact binary form
//!
//! The configuration is encoded with `postcard` so it can be kept in a small
//! flash region or passed over a serial console, and decoded without copying
//! the credential strings.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::channel::{Channel, ChannelError, ChannelPlan};
use crate::mac::MacAddress;
use crate::radio::Credentials;
use crate::scan::{ScanConfig, ScanStrategy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Encoding failed: {0}")]
    Encode(postcard::Error),

    #[error("Decoding failed: {0}")]
    Decode(postcard::Error),

    #[error("Invalid channel setting: {0}")]
    Channel(#[from] ChannelError),

    #[error("Retry count must be at least 1")]
    InvalidRetries,

    #[error("Credentials exceed 802.11 length limits")]
    CredentialsTooLong,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct NodeConfig<'a> {
    pub wifi: WifiCredentials<'a>,
    pub scan: ScanSettings,
    /// Peer to look for at start-up
    pub peer: Option<MacAddress>,
    /// Channel the peer was last found on
    pub peer_channel: Option<u8>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl WifiCredentials<'_> {
    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }

    pub fn to_credentials(&self) -> Result<Credentials, ConfigError> {
        Credentials::new(self.ssid, self.password).ok_or(ConfigError::CredentialsTooLong)
    }
}

/// Persisted form of a [`ScanConfig`]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub retries: u8,
    pub last_channel: u8,
    pub strategy: ScanStrategy,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let config = ScanConfig::default();
        Self {
            retries: config.retries,
            last_channel: config.plan.last().number(),
            strategy: config.strategy,
        }
    }
}

impl ScanSettings {
    pub fn to_scan_config(&self) -> Result<ScanConfig, ConfigError> {
        if self.retries == 0 {
            return Err(ConfigError::InvalidRetries);
        }
        Ok(ScanConfig::new(self.strategy)
            .with_retries(self.retries)
            .with_plan(ChannelPlan::new(self.last_channel)?))
    }
}

impl<'a> NodeConfig<'a> {
    /// Encode into `buf`, returning the used prefix.
    pub fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(ConfigError::Encode)
    }

    pub fn decode(bytes: &'a [u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(ConfigError::Decode)
    }

    /// Last known channel of the peer, if one was stored and is valid
    pub fn peer_channel(&self) -> Option<Channel> {
        self.peer_channel.and_then(|n| Channel::new(n).ok())
    }

    pub fn remember_peer(&mut self, peer: MacAddress, channel: Option<Channel>) {
        self.peer = Some(peer);
        self.peer_channel = channel.map(Channel::number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeConfig<'static> {
        NodeConfig {
            wifi: WifiCredentials {
                ssid: "workshop",
                password: "hunter22",
            },
            scan: ScanSettings {
                retries: 3,
                last_channel: 14,
                strategy: ScanStrategy::FirstHit,
            },
            peer: Some(MacAddress::new([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56])),
            peer_channel: Some(6),
        }
    }

    #[test]
    fn test_encode_decode() {
        let config = sample();
        let mut buf = [0u8; 128];
        let used = config.encode(&mut buf).unwrap().len();

        let decoded = NodeConfig::decode(&buf[..used]).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.peer_channel(), Some(Channel::new(6).unwrap()));
    }

    #[test]
    fn test_encode_into_short_buffer_fails() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            sample().encode(&mut buf),
            Err(ConfigError::Encode(_))
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            NodeConfig::decode(&[0xff, 0xff, 0xff]),
            Err(ConfigError::Decode(_))
        ));
    }

    #[test]
    fn test_scan_settings_validation() {
        let config = sample().scan.to_scan_config().unwrap();
        assert_eq!(config.retries, 3);
        assert_eq!(config.plan, ChannelPlan::JAPAN);
        assert_eq!(config.strategy, ScanStrategy::FirstHit);

        let zero = ScanSettings {
            retries: 0,
            ..ScanSettings::default()
        };
        assert_eq!(zero.to_scan_config(), Err(ConfigError::InvalidRetries));

        let bad_plan = ScanSettings {
            last_channel: 15,
            ..ScanSettings::default()
        };
        assert_eq!(
            bad_plan.to_scan_config(),
            Err(ConfigError::Channel(ChannelError::InvalidPlan { last: 15 }))
        );
    }

    #[test]
    fn test_defaults_match_scanner_defaults() {
        let settings = ScanSettings::default();
        assert_eq!(settings.to_scan_config().unwrap(), ScanConfig::default());
        assert!(NodeConfig::default().wifi.is_empty());
        assert_eq!(NodeConfig::default().peer_channel(), None);
    }

    #[test]
    fn test_remember_peer() {
        let mut config = NodeConfig::default();
        let peer = MacAddress::new([1, 2, 3, 4, 5, 6]);
        config.remember_peer(peer, Channel::new(11).ok());
        assert_eq!(config.peer, Some(peer));
        assert_eq!(config.peer_channel(), Some(Channel::new(11).unwrap()));
    }

    #[test]
    fn test_credentials_length_limit() {
        let long = "x".repeat(40);
        let wifi = WifiCredentials {
            ssid: &long,
            password: "pw",
        };
        assert_eq!(wifi.to_credentials(), Err(ConfigError::CredentialsTooLong));
    }
}
