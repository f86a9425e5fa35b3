//! Wi-Fi radio state handling
//!
//! [`Radio`] owns a [`WifiDriver`] and applies the rules that keep the radio in
//! a known state on both chip families:
//!
//! - the channel can only change while the station is not associated and the
//!   access point has no clients;
//! - on ESP32 an active station interface sets the channel directly;
//! - on ESP8266 (or with the station down) the channel is set through the
//!   access point interface, which is switched on just long enough to do so.
//!
//! All mutation goes through `&mut Radio`, so only one scan or reconfiguration
//! can touch the radio at a time.
//!
//! # Example
//!
//! ```no_run
//! # use nowscan_core::radio::{Radio, ResetOptions, WifiDriver};
//! # fn demo<D: WifiDriver>(driver: D, delay: &mut impl embedded_hal::delay::DelayNs) {
//! let mut radio = Radio::new(driver);
//! radio.reset(&ResetOptions::default(), delay).unwrap(); // STA on, AP off, channel 1
//! log::info!("{}", radio.status());
//! # }
//! ```

mod driver;
mod status;

pub use driver::*;
pub use status::*;

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::channel::Channel;
use crate::error::{ErrorDetails, details};

/// Default time allowed for joining a network
pub const CONNECT_TIMEOUT_MS: u32 = 20_000;

/// Default time allowed for the station to drop its association
pub const DISCONNECT_TIMEOUT_MS: u32 = 5_000;

/// Interval between connection state polls
pub const POLL_INTERVAL_MS: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// Channel changes are refused while the station is associated
    #[error("Can not set channel when connected to wifi network")]
    StationConnected,

    /// Channel changes are refused while clients are associated to the AP
    #[error("Can not set channel when clients are connected to AP")]
    AccessPointBusy,

    #[error("Timed out after {waited_ms} ms waiting to {operation}")]
    Timeout {
        operation: &'static str,
        waited_ms: u32,
    },

    #[error("Radio driver failed to {operation}: {details}")]
    Driver {
        operation: &'static str,
        details: ErrorDetails,
    },
}

impl RadioError {
    fn driver<E: core::fmt::Debug>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |error| Self::Driver {
            operation,
            details: details(&error),
        }
    }
}

/// Waiting limits used by [`Radio::connect`] and [`Radio::disconnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect_ms: u32,
    pub disconnect_ms: u32,
    pub poll_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: CONNECT_TIMEOUT_MS,
            disconnect_ms: DISCONNECT_TIMEOUT_MS,
            poll_ms: POLL_INTERVAL_MS,
        }
    }
}

/// Target state for [`Radio::reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOptions {
    pub station: bool,
    pub access_point: bool,
    pub channel: Channel,
    pub power_save: PowerSave,
    /// `None` leaves the PHY protocols untouched
    pub protocol: Option<Protocol>,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            station: true,
            access_point: false,
            channel: Channel::ONE,
            power_save: PowerSave::None,
            protocol: Some(Protocol::BGN),
        }
    }
}

/// Network the station joined in [`Radio::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub ssid: Option<String<MAX_SSID_LEN>>,
    /// `None` when the driver cannot tell which channel the network is on
    pub channel: Option<Channel>,
}

/// Exclusive handle on a chip's Wi-Fi radio
pub struct Radio<D: WifiDriver> {
    driver: D,
    timeouts: Timeouts,
}

impl<D: WifiDriver> Radio<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn family(&self) -> ChipFamily {
        self.driver.family()
    }

    /// Current operating channel, as reported by the access point interface
    pub fn channel(&self) -> Result<Channel, RadioError> {
        self.driver
            .channel(Interface::AccessPoint)
            .map_err(RadioError::driver("read channel"))
    }

    /// Like [`Radio::channel`], but `None` when the driver does not know the
    /// channel, e.g. after joining a network on a chip with no channel readback.
    pub fn current_channel(&self) -> Result<Option<Channel>, RadioError> {
        match self.driver.channel(Interface::AccessPoint) {
            Ok(channel) => Ok(Some(channel)),
            Err(e) if D::is_unsupported(&e) => Ok(None),
            Err(e) => Err(RadioError::driver("read channel")(e)),
        }
    }

    /// Fails when the radio is in a state where the channel is pinned.
    pub fn ensure_channel_changeable(&self) -> Result<(), RadioError> {
        if self.driver.is_connected(Interface::Station) {
            return Err(RadioError::StationConnected);
        }
        if self.driver.is_connected(Interface::AccessPoint) {
            return Err(RadioError::AccessPointBusy);
        }
        Ok(())
    }

    /// Move the radio to `channel` and return the channel now in effect.
    pub fn set_channel(&mut self, channel: Channel) -> Result<Channel, RadioError> {
        self.ensure_channel_changeable()?;

        let use_station = self.driver.family() == ChipFamily::Esp32
            && self.driver.is_active(Interface::Station);

        if use_station {
            self.driver
                .set_channel(Interface::Station, channel)
                .map_err(RadioError::driver("set station channel"))?;
            return self
                .driver
                .channel(Interface::Station)
                .map_err(RadioError::driver("read station channel"));
        }

        let ap_was_active = self.driver.is_active(Interface::AccessPoint);
        self.driver
            .set_active(Interface::AccessPoint, true)
            .map_err(RadioError::driver("activate access point"))?;
        let result = self.driver.set_channel(Interface::AccessPoint, channel);
        // Restore the AP even when the channel change failed
        if let Err(e) = self.driver.set_active(Interface::AccessPoint, ap_was_active) {
            if let Err(set_error) = &result {
                error!(
                    "Setting access point channel {} failed: {:?}",
                    channel, set_error
                );
            }
            return Err(RadioError::driver("restore access point")(e));
        }
        result.map_err(RadioError::driver("set access point channel"))?;

        self.channel()
    }

    /// Force both interfaces off, then bring the radio up in the requested state.
    pub fn reset(
        &mut self,
        options: &ResetOptions,
        delay: &mut impl DelayNs,
    ) -> Result<(), RadioError> {
        for iface in [Interface::Station, Interface::AccessPoint] {
            self.driver
                .set_active(iface, false)
                .map_err(RadioError::driver("deactivate interface"))?;
        }
        self.driver
            .set_active(Interface::Station, options.station)
            .map_err(RadioError::driver("activate station"))?;
        self.driver
            .set_active(Interface::AccessPoint, options.access_point)
            .map_err(RadioError::driver("activate access point"))?;

        if options.station {
            self.disconnect(delay)?;
            self.driver
                .set_power_save(options.power_save)
                .map_err(RadioError::driver("set power save mode"))?;
        }

        let protocol_iface = if options.station {
            Some(Interface::Station)
        } else if options.access_point {
            Some(Interface::AccessPoint)
        } else {
            None
        };
        if let (Some(iface), Some(protocol)) = (protocol_iface, options.protocol) {
            if let Err(e) = self.driver.set_protocol(iface, protocol) {
                if D::is_unsupported(&e) {
                    debug!("{} protocol selection unsupported", iface.label());
                } else {
                    warn!("Ignoring {} protocol error: {:?}", iface.label(), e);
                }
            }
        }

        let channel = self.set_channel(options.channel)?;
        info!(
            "Wifi reset: STA {}, AP {}, channel {}",
            on_off(options.station),
            on_off(options.access_point),
            channel
        );
        Ok(())
    }

    /// Drop the station's association and wait until it is gone.
    pub fn disconnect(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        self.driver
            .disconnect()
            .map_err(RadioError::driver("disconnect station"))?;
        self.wait_for(delay, self.timeouts.disconnect_ms, "disconnect", |d| {
            !d.is_connected(Interface::Station)
        })
    }

    /// Join a network. `None` rejoins the last network the station knew.
    pub fn connect(
        &mut self,
        credentials: Option<&Credentials>,
        delay: &mut impl DelayNs,
    ) -> Result<Connection, RadioError> {
        self.driver
            .set_active(Interface::Station, true)
            .map_err(RadioError::driver("activate station"))?;
        self.disconnect(delay)?;
        self.driver
            .connect(credentials)
            .map_err(RadioError::driver("connect station"))?;
        self.wait_for(delay, self.timeouts.connect_ms, "connect", |d| {
            d.is_connected(Interface::Station)
        })?;

        let connection = Connection {
            ssid: self.driver.ssid(),
            channel: self.current_channel()?,
        };
        let ssid = connection.ssid.as_deref().unwrap_or("");
        match connection.channel {
            Some(channel) => info!("Connected to \"{}\" on wifi channel {}", ssid, channel),
            None => info!("Connected to \"{}\"", ssid),
        }
        Ok(connection)
    }

    /// Snapshot of both interfaces and the shared radio settings
    pub fn status(&self) -> WifiStatus {
        WifiStatus::capture(&self.driver)
    }

    fn wait_for(
        &self,
        delay: &mut impl DelayNs,
        timeout_ms: u32,
        operation: &'static str,
        mut done: impl FnMut(&D) -> bool,
    ) -> Result<(), RadioError> {
        let poll_ms = self.timeouts.poll_ms.max(1);
        let mut waited_ms = 0;
        while !done(&self.driver) {
            if waited_ms >= timeout_ms {
                return Err(RadioError::Timeout {
                    operation,
                    waited_ms,
                });
            }
            delay.delay_ms(poll_ms);
            waited_ms = waited_ms.saturating_add(poll_ms);
        }
        Ok(())
    }
}

const fn on_off(active: bool) -> &'static str {
    if active { "on" } else { "off" }
}
