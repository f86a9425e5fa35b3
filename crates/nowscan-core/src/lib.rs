//! Hardware-independent core library for nowscan
//!
//! This crate contains all platform-agnostic logic for finding an ESP-NOW peer
//! and keeping the Wi-Fi radio in a known state: hardware address and channel
//! types, the radio driver and transport traits, the channel scanner, the
//! echo test, and node configuration.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32, ESP8266 class chips) and desktop hosts (for the
//! simulator and tests).

#![no_std]

extern crate alloc;

pub mod channel;
pub mod config;
pub mod echo;
pub mod error;
pub mod mac;
pub mod radio;
pub mod scan;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transport;

pub use channel::{Channel, ChannelPlan};
pub use mac::MacAddress;
pub use radio::Radio;
pub use scan::{ScanConfig, ScanOutcome, ScanStrategy, scan};
