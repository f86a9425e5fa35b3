//! Desktop simulator for nowscan.
//!
//! Places a peer on a chosen channel of a simulated ESP-NOW air, lets its
//! frames bleed into neighbouring channels, and runs both scan strategies and
//! an echo session against it.
//!
//! # Usage
//!
//! ```text
//! nowscan-simulator [true_channel] [bleed,channels] [retries]
//! ```
//!
//! | Argument       | Default | Meaning                                    |
//! |----------------|---------|--------------------------------------------|
//! | `true_channel` | 6       | Channel the peer listens on                |
//! | `bleed`        | `5,7`   | Extra channels the peer still hears, or `-` |
//! | `retries`      | per strategy | Pings per channel                     |
//!
//! Set `RUST_LOG=debug` (or `trace`) to see every ping.

use std::fmt;
use std::process::ExitCode;

use log::{error, info, warn};

use nowscan_core::channel::{Channel, ChannelError};
use nowscan_core::echo::{self, DEFAULT_RECEIVE_TIMEOUT_MS, EchoError};
use nowscan_core::mac::MacAddress;
use nowscan_core::radio::{Radio, RadioError, ResetOptions};
use nowscan_core::scan::{self, ScanConfig, ScanError, ScanOutcome, ScanStrategy};
use nowscan_core::sim::{NoopDelay, SimulatedAir};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

const PEER: MacAddress = MacAddress::new([0x24, 0x0a, 0xc4, 0x5e, 0x00, 0x01]);

/// Echo message sizes, from a single marker byte to a full frame
const ECHO_LENGTHS: [usize; 6] = [1, 8, 32, 100, 200, 250];

const ECHO_SEED: u64 = 0x6e6f_7773_6361_6e00;

struct Scenario {
    true_channel: Channel,
    bleed: Vec<Channel>,
    retries: Option<u8>,
}

impl Scenario {
    fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let true_channel = match args.next() {
            Some(arg) => parse_channel(&arg)?,
            None => Channel::new(6).map_err(|e| e.to_string())?,
        };
        let bleed = match args.next().as_deref() {
            None => [5, 7]
                .into_iter()
                .map(Channel::new)
                .collect::<Result<_, ChannelError>>()
                .map_err(|e| e.to_string())?,
            Some("-") | Some("") => Vec::new(),
            Some(list) => list
                .split(',')
                .map(parse_channel)
                .collect::<Result<_, _>>()?,
        };
        let retries = args
            .next()
            .map(|arg| {
                arg.parse::<u8>()
                    .map_err(|e| format!("invalid retries \"{arg}\": {e}"))
            })
            .transpose()?;

        Ok(Self {
            true_channel,
            bleed,
            retries,
        })
    }

    fn air(&self) -> SimulatedAir {
        SimulatedAir::new(PEER, self.true_channel).with_bleed(&self.bleed)
    }

    fn scan_config(&self, strategy: ScanStrategy) -> ScanConfig {
        let config = ScanConfig::new(strategy);
        match self.retries {
            Some(retries) => config.with_retries(retries),
            None => config,
        }
    }
}

fn parse_channel(arg: &str) -> Result<Channel, String> {
    let number = arg
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("invalid channel \"{arg}\": {e}"))?;
    Channel::new(number).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

fn run_scan(scenario: &Scenario, strategy: ScanStrategy) -> Result<ScanOutcome, ScanError> {
    let air = scenario.air();
    let (driver, mut transport) = air.split();
    let mut radio = Radio::new(driver);
    radio.reset(&ResetOptions::default(), &mut NoopDelay)?;

    let config = scenario.scan_config(strategy);
    let outcome = scan::scan(&mut radio, &mut transport, &PEER, &config)?;

    info!(
        "{:?}: hits {:?}, selected channel {}, {} pings sent",
        strategy,
        outcome.hits.iter().map(|c| c.number()).collect::<Vec<_>>(),
        outcome.channel_number(),
        air.sends()
    );
    if outcome.selected != Some(scenario.true_channel) {
        warn!(
            "{:?} settled on channel {} but the peer is on {}",
            strategy,
            outcome.channel_number(),
            scenario.true_channel
        );
    }
    info!("{}", radio.status());
    Ok(outcome)
}

#[derive(Debug)]
enum EchoSessionError {
    Scan(ScanError),
    Echo(EchoError),
}

impl fmt::Display for EchoSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(e) => write!(f, "scan: {e}"),
            Self::Echo(e) => write!(f, "echo: {e}"),
        }
    }
}

impl From<ScanError> for EchoSessionError {
    fn from(e: ScanError) -> Self {
        Self::Scan(e)
    }
}

impl From<RadioError> for EchoSessionError {
    fn from(e: RadioError) -> Self {
        Self::Scan(e.into())
    }
}

impl From<EchoError> for EchoSessionError {
    fn from(e: EchoError) -> Self {
        Self::Echo(e)
    }
}

fn run_echo(scenario: &Scenario) -> Result<(), EchoSessionError> {
    let air = scenario.air();
    let (driver, mut transport) = air.split();
    let mut radio = Radio::new(driver);
    radio.reset(&ResetOptions::default(), &mut NoopDelay)?;

    let outcome = scan::scan(
        &mut radio,
        &mut transport,
        &PEER,
        &scenario.scan_config(ScanStrategy::Vote),
    )?;
    if !outcome.is_found() {
        warn!("Skipping echo session, peer not found");
        return Ok(());
    }

    let report = echo::echo_client(
        &mut transport,
        &PEER,
        &ECHO_LENGTHS,
        ECHO_SEED,
        DEFAULT_RECEIVE_TIMEOUT_MS,
    )?;
    echo::finish(&mut transport, &PEER)?;
    info!(
        "Echo session on channel {}: {} matched, {} mismatched, {} timed out",
        outcome.channel_number(),
        report.matched,
        report.mismatched,
        report.timeouts
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scenario = match Scenario::from_args(std::env::args().skip(1)) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{e}");
            error!("usage: nowscan-simulator [true_channel] [bleed,channels] [retries]");
            return ExitCode::from(2);
        }
    };

    info!("Starting nowscan simulator");
    info!(
        "Peer {} on channel {}, bleeding into {:?}",
        PEER,
        scenario.true_channel,
        scenario.bleed.iter().map(|c| c.number()).collect::<Vec<_>>()
    );

    let mut failed = false;
    for strategy in [ScanStrategy::Vote, ScanStrategy::FirstHit] {
        if let Err(e) = run_scan(&scenario, strategy) {
            error!("{:?} scan failed: {}", strategy, e);
            failed = true;
        }
    }
    if let Err(e) = run_echo(&scenario) {
        error!("Echo session failed: {}", e);
        failed = true;
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
