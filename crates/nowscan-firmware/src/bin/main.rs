#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::esp_now::EspNowManager;
use log::{error, info, warn};
use nowscan_core::echo::{self, DEFAULT_RECEIVE_TIMEOUT_MS, EchoServerConfig};
use nowscan_core::radio::{Radio, ResetOptions};
use nowscan_core::scan;
use nowscan_firmware::espnow::EspNowTransport;
use nowscan_firmware::settings::{self, Role};
use nowscan_firmware::wifi::EspWifi;
use rtt_target::rprintln;
use static_cell::StaticCell;

/// Message sizes the echo client sends, up to the ESP-NOW frame limit
const ECHO_LENGTHS: [usize; 5] = [1, 16, 64, 128, 250];

/// Room for the encoded node config with full-length credentials
const NODE_CONFIG_CAPACITY: usize = 192;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_print!();
    rtt_target::init_logger_with_level(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("Embassy initialized!");

    static RADIO_INIT: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio_init = RADIO_INIT
        .init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    static ESP_NOW_MANAGER: StaticCell<EspNowManager<'static>> = StaticCell::new();
    let (manager, sender, receiver) = interfaces.esp_now.split();
    let manager: &'static EspNowManager<'static> = ESP_NOW_MANAGER.init(manager);

    let mut radio = Radio::new(EspWifi::new(wifi_controller, manager));
    let mut transport = EspNowTransport::new(manager, sender, receiver);
    let mut delay = Delay;

    if let Err(e) = radio.reset(&ResetOptions::default(), &mut delay) {
        panic!("Wifi reset failed: {}", e);
    }
    info!("{}", radio.status());

    let mut node = settings::node_config();
    match settings::role() {
        Role::Server => loop {
            match echo::echo_server(&mut transport, &EchoServerConfig::default()) {
                Ok(summary) if summary.messages > 0 => info!(
                    "Echo session: {} messages from {} peers",
                    summary.messages,
                    summary.peers.len()
                ),
                Ok(_) => {}
                Err(e) => error!("Echo server: {}", e),
            }
        },
        Role::Client => match node.peer {
            Some(peer) => {
                let scan_config = match node.scan.to_scan_config() {
                    Ok(config) => config,
                    Err(e) => panic!("Invalid scan settings: {}", e),
                };
                match scan::scan(&mut radio, &mut transport, &peer, &scan_config) {
                    Ok(outcome) if outcome.is_found() => {
                        info!("Peer {} on channel {}", peer, outcome.channel_number());
                        node.remember_peer(peer, outcome.selected);
                        let mut buf = [0u8; NODE_CONFIG_CAPACITY];
                        match node.encode(&mut buf) {
                            Ok(bytes) => info!(
                                "Node config updated, peer channel {:?} ({} bytes encoded)",
                                node.peer_channel().map(|c| c.number()),
                                bytes.len()
                            ),
                            Err(e) => warn!("Could not encode node config: {}", e),
                        }
                        match echo::echo_client(
                            &mut transport,
                            &peer,
                            &ECHO_LENGTHS,
                            embassy_time::Instant::now().as_ticks(),
                            DEFAULT_RECEIVE_TIMEOUT_MS,
                        ) {
                            Ok(report) if report.all_matched() => {
                                if let Err(e) = echo::finish(&mut transport, &peer) {
                                    warn!("Could not stop echo server: {}", e);
                                }
                            }
                            Ok(report) => warn!(
                                "Echo test failed: {} of {} matched",
                                report.matched,
                                report.total()
                            ),
                            Err(e) => error!("Echo client: {}", e),
                        }
                    }
                    Ok(outcome) => warn!(
                        "Peer {} not found after {} pings",
                        peer, outcome.attempts
                    ),
                    Err(e) => error!("Scan failed: {}", e),
                }
            }
            None if !node.wifi.is_empty() => match node.wifi.to_credentials() {
                Ok(credentials) => {
                    if let Err(e) = radio.connect(Some(&credentials), &mut delay) {
                        error!("Wifi connect failed: {}", e);
                    }
                }
                Err(e) => error!("Wifi credentials: {}", e),
            },
            None => warn!("No peer configured, set NOWSCAN_PEER in .env"),
        },
    }

    info!("{}", radio.status());
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}
