//! Driver trait for the two Wi-Fi interfaces of a chip

use core::fmt::Debug;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::mac::MacAddress;

/// Longest SSID allowed by 802.11
pub const MAX_SSID_LEN: usize = 32;

/// Longest WPA2 passphrase
pub const MAX_PASSWORD_LEN: usize = 64;

/// The two logical interfaces every supported chip exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    /// Station, used to join networks and to send ESP-NOW frames
    Station,
    /// Soft access point
    AccessPoint,
}

impl Interface {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Station => "STA",
            Self::AccessPoint => "AP",
        }
    }
}

/// Chip families differ in which interface can change the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipFamily {
    /// ESP32 and its variants: the station interface sets the channel
    Esp32,
    /// ESP8266: the channel must be set through the access point interface
    Esp8266,
}

/// Power saving used while the station is associated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerSave {
    #[default]
    None,
    Minimum,
    Maximum,
}

impl PowerSave {
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Minimum => 1,
            Self::Maximum => 2,
        }
    }

    /// Vendor name of the mode for the given chip family
    pub const fn name(self, family: ChipFamily) -> &'static str {
        match (family, self) {
            (ChipFamily::Esp8266, Self::None) => "SLEEP_NONE",
            (ChipFamily::Esp8266, Self::Minimum) => "SLEEP_LIGHT",
            (ChipFamily::Esp8266, Self::Maximum) => "SLEEP_MODEM",
            (ChipFamily::Esp32, Self::None) => "WIFI_PS_NONE",
            (ChipFamily::Esp32, Self::Minimum) => "WIFI_PS_MIN_MODEM",
            (ChipFamily::Esp32, Self::Maximum) => "WIFI_PS_MAX_MODEM",
        }
    }
}

/// Bit mask of enabled 802.11 PHY protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol(u8);

impl Protocol {
    pub const B: Self = Self(1 << 0);
    pub const G: Self = Self(1 << 1);
    pub const N: Self = Self(1 << 2);
    /// Espressif long range mode
    pub const LR: Self = Self(1 << 3);

    /// 802.11b/g/n
    pub const BGN: Self = Self(Self::B.0 | Self::G.0 | Self::N.0);

    const NAMES: [(Protocol, &'static str); 4] = [
        (Self::B, "MODE_11B"),
        (Self::G, "MODE_11G"),
        (Self::N, "MODE_11N"),
        (Self::LR, "MODE_LR"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Protocol) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the enabled protocols
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::BGN
    }
}

/// Network credentials for joining an access point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String<MAX_SSID_LEN>,
    pub password: String<MAX_PASSWORD_LEN>,
}

impl Credentials {
    /// Returns `None` when either value exceeds its 802.11 limit.
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        Some(Self {
            ssid: String::try_from(ssid).ok()?,
            password: String::try_from(password).ok()?,
        })
    }
}

/// Raw radio operations for one chip.
///
/// Implementations are thin: policy such as which interface may change the
/// channel lives in [`Radio`](super::Radio). Operations a platform cannot
/// perform return an error for which [`WifiDriver::is_unsupported`] holds.
pub trait WifiDriver {
    type Error: Debug;

    fn family(&self) -> ChipFamily;

    fn is_active(&self, iface: Interface) -> bool;

    fn set_active(&mut self, iface: Interface, active: bool) -> Result<(), Self::Error>;

    /// For the station: associated with a network.
    /// For the access point: at least one client associated.
    fn is_connected(&self, iface: Interface) -> bool;

    fn channel(&self, iface: Interface) -> Result<Channel, Self::Error>;

    fn set_channel(&mut self, iface: Interface, channel: Channel) -> Result<(), Self::Error>;

    fn mac(&self, iface: Interface) -> MacAddress;

    /// Start joining a network. `None` rejoins the last configured network.
    fn connect(&mut self, credentials: Option<&Credentials>) -> Result<(), Self::Error>;

    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// SSID of the network the station is associated with
    fn ssid(&self) -> Option<String<MAX_SSID_LEN>>;

    fn power_save(&self) -> Result<PowerSave, Self::Error>;

    fn set_power_save(&mut self, mode: PowerSave) -> Result<(), Self::Error>;

    fn protocol(&self, iface: Interface) -> Result<Protocol, Self::Error>;

    fn set_protocol(&mut self, iface: Interface, protocol: Protocol) -> Result<(), Self::Error>;

    /// Whether an error only means the operation is unavailable on this chip
    fn is_unsupported(error: &Self::Error) -> bool;
}
