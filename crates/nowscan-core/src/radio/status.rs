//! Printable snapshot of the radio configuration

use core::fmt;

use heapless::String;

use super::driver::{ChipFamily, Interface, MAX_SSID_LEN, PowerSave, Protocol, WifiDriver};
use crate::channel::Channel;
use crate::mac::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub iface: Interface,
    pub active: bool,
    pub mac: MacAddress,
}

/// State of both interfaces plus the settings they share.
///
/// Settings the driver cannot report are `None` and omitted from the
/// rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiStatus {
    pub family: ChipFamily,
    pub station: InterfaceStatus,
    pub access_point: InterfaceStatus,
    /// SSID of the joined network, `None` while disconnected
    pub connected_to: Option<String<MAX_SSID_LEN>>,
    pub channel: Option<Channel>,
    pub power_save: Option<PowerSave>,
    pub protocol: Option<Protocol>,
}

impl WifiStatus {
    pub(super) fn capture<D: WifiDriver>(driver: &D) -> Self {
        let iface_status = |iface: Interface| InterfaceStatus {
            iface,
            active: driver.is_active(iface),
            mac: driver.mac(iface),
        };

        let connected_to = if driver.is_connected(Interface::Station) {
            Some(driver.ssid().unwrap_or_default())
        } else {
            None
        };

        Self {
            family: driver.family(),
            station: iface_status(Interface::Station),
            access_point: iface_status(Interface::AccessPoint),
            connected_to,
            channel: driver.channel(Interface::AccessPoint).ok(),
            power_save: driver.power_save().ok(),
            protocol: driver.protocol(Interface::Station).ok(),
        }
    }
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = if self.active { "on," } else { "off," };
        write!(f, "{:<3}: {:<4} mac= {}", self.iface.label(), active, self.mac)
    }
}

impl fmt::Display for WifiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.station)?;
        writeln!(f, "{}", self.access_point)?;

        match &self.connected_to {
            Some(ssid) => write!(f, "     connected: {ssid}")?,
            None => write!(f, "     disconnected")?,
        }
        if let Some(channel) = self.channel {
            write!(f, ", channel={channel}")?;
        }
        if let Some(mode) = self.power_save {
            write!(f, ", ps_mode={} ({})", mode.code(), mode.name(self.family))?;
        }
        if let Some(protocol) = self.protocol {
            write!(f, ", protocol={} (", protocol.bits())?;
            for (i, name) in protocol.names().enumerate() {
                if i > 0 {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
