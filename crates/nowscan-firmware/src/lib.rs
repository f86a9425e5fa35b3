//! ESP32-S3 firmware-specific modules for nowscan
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the `esp-radio` Wi-Fi driver and ESP-NOW transport behind the
//! `nowscan_core` traits, and the build-time node settings.

#![no_std]

extern crate alloc;

pub mod espnow;
pub mod settings;
pub mod wifi;
