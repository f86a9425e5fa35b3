//! [`WifiDriver`] for the ESP32-S3 built on `esp-radio`
//!
//! `esp-radio` runs the chip as a station only, so access point operations
//! report [`EspWifiError::Unsupported`]. The radio has a single channel which
//! is applied through the ESP-NOW manager and remembered here, as the
//! controller has no way to read it back. Joining a network moves the radio to
//! the access point's channel, so the remembered value is dropped on connect
//! and reads report [`EspWifiError::Unsupported`] until the next write.

use alloc::string::String as AllocString;

use esp_radio::esp_now::{EspNowError, EspNowManager};
use esp_radio::wifi::{ClientConfig, ModeConfig, PowerSaveMode, WifiController, WifiError};
use heapless::String;
use nowscan_core::channel::Channel;
use nowscan_core::mac::MacAddress;
use nowscan_core::radio::{
    ChipFamily, Credentials, Interface, MAX_SSID_LEN, PowerSave, Protocol, WifiDriver,
};
use thiserror_no_std::Error;

#[derive(Debug, Error)]
pub enum EspWifiError {
    #[error("Wi-Fi controller error: {0:?}")]
    Wifi(WifiError),

    #[error("ESP-NOW error: {0:?}")]
    EspNow(EspNowError),

    #[error("Operation not supported by esp-radio")]
    Unsupported,
}

impl From<WifiError> for EspWifiError {
    fn from(e: WifiError) -> Self {
        Self::Wifi(e)
    }
}

impl From<EspNowError> for EspWifiError {
    fn from(e: EspNowError) -> Self {
        Self::EspNow(e)
    }
}

pub struct EspWifi<'d> {
    controller: WifiController<'d>,
    esp_now: &'d EspNowManager<'d>,
    station_active: bool,
    channel: Option<Channel>,
    power_save: PowerSave,
    credentials: Option<Credentials>,
}

impl<'d> EspWifi<'d> {
    pub fn new(controller: WifiController<'d>, esp_now: &'d EspNowManager<'d>) -> Self {
        Self {
            controller,
            esp_now,
            station_active: false,
            channel: Some(Channel::ONE),
            power_save: PowerSave::default(),
            credentials: None,
        }
    }

    fn client_config(&self) -> ModeConfig {
        let config = ClientConfig::default();
        let config = match &self.credentials {
            Some(c) => config
                .with_ssid(AllocString::from(c.ssid.as_str()))
                .with_password(AllocString::from(c.password.as_str())),
            None => config,
        };
        ModeConfig::Client(config)
    }
}

impl WifiDriver for EspWifi<'_> {
    type Error = EspWifiError;

    fn family(&self) -> ChipFamily {
        ChipFamily::Esp32
    }

    fn is_active(&self, iface: Interface) -> bool {
        match iface {
            Interface::Station => self.station_active,
            Interface::AccessPoint => false,
        }
    }

    fn set_active(&mut self, iface: Interface, active: bool) -> Result<(), Self::Error> {
        match (iface, active) {
            (Interface::AccessPoint, false) => Ok(()),
            (Interface::AccessPoint, true) => Err(EspWifiError::Unsupported),
            (Interface::Station, true) if !self.station_active => {
                let config = self.client_config();
                self.controller.set_config(&config)?;
                self.controller.start()?;
                self.station_active = true;
                Ok(())
            }
            (Interface::Station, false) if self.station_active => {
                self.controller.stop()?;
                self.station_active = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_connected(&self, iface: Interface) -> bool {
        match iface {
            Interface::Station => self.controller.is_connected().unwrap_or(false),
            Interface::AccessPoint => false,
        }
    }

    fn channel(&self, _iface: Interface) -> Result<Channel, Self::Error> {
        self.channel.ok_or(EspWifiError::Unsupported)
    }

    fn set_channel(&mut self, iface: Interface, channel: Channel) -> Result<(), Self::Error> {
        if iface == Interface::AccessPoint || !self.station_active {
            return Err(EspWifiError::Unsupported);
        }
        self.esp_now.set_channel(channel.number())?;
        self.channel = Some(channel);
        Ok(())
    }

    fn mac(&self, iface: Interface) -> MacAddress {
        match iface {
            Interface::Station => MacAddress::new(esp_radio::wifi::sta_mac()),
            Interface::AccessPoint => MacAddress::new(esp_radio::wifi::ap_mac()),
        }
    }

    fn connect(&mut self, credentials: Option<&Credentials>) -> Result<(), Self::Error> {
        if let Some(credentials) = credentials {
            self.credentials = Some(credentials.clone());
            let config = self.client_config();
            self.controller.set_config(&config)?;
        }
        self.channel = None;
        self.controller.connect()?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        if self.controller.is_connected().unwrap_or(false) {
            self.controller.disconnect()?;
        }
        Ok(())
    }

    fn ssid(&self) -> Option<String<MAX_SSID_LEN>> {
        if !self.is_connected(Interface::Station) {
            return None;
        }
        self.credentials.as_ref().map(|c| c.ssid.clone())
    }

    fn power_save(&self) -> Result<PowerSave, Self::Error> {
        Ok(self.power_save)
    }

    fn set_power_save(&mut self, mode: PowerSave) -> Result<(), Self::Error> {
        let esp_mode = match mode {
            PowerSave::None => PowerSaveMode::None,
            PowerSave::Minimum => PowerSaveMode::Minimum,
            PowerSave::Maximum => PowerSaveMode::Maximum,
        };
        self.controller.set_power_saving(esp_mode)?;
        self.power_save = mode;
        Ok(())
    }

    fn protocol(&self, _iface: Interface) -> Result<Protocol, Self::Error> {
        Err(EspWifiError::Unsupported)
    }

    fn set_protocol(&mut self, _iface: Interface, _protocol: Protocol) -> Result<(), Self::Error> {
        Err(EspWifiError::Unsupported)
    }

    fn is_unsupported(error: &Self::Error) -> bool {
        matches!(error, EspWifiError::Unsupported)
    }
}
