use std::path::PathBuf;
use std::time::Duration;

use canmux_dispatch::DEFAULT_QUEUE_SIZE;
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod crc;
pub mod replay;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a capture file through a filtered dispatch client.
    Replay(ReplayArgs),
    /// Run the communication driver against a virtual loopback bus.
    Simulate(SimulateArgs),
    /// Compute the auto-support CRC8 of payload bytes.
    Crc(CrcArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Crc(args) => crc::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file to replay.
    pub capture: PathBuf,
    /// Only show frames with this identifier (hex with 0x prefix, or decimal).
    #[arg(long, value_parser = parse_id)]
    pub id: Option<u32>,
    /// Identifier mask applied with --id.
    #[arg(long, value_parser = parse_id, requires = "id")]
    pub mask: Option<u32>,
    /// Match extended (29-bit) identifiers with --id.
    #[arg(long, requires = "id")]
    pub extended: bool,
    /// Stop after N matching frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Bound of the replay client's queue.
    #[arg(long, default_value_t = DEFAULT_QUEUE_SIZE)]
    pub queue_size: usize,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Driver configuration (JSON).
    #[arg(long, value_name = "FILE", env = "CANMUX_CONFIG")]
    pub config: Option<PathBuf>,
    /// How long to run (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    pub duration: Duration,
    /// Poll loop period (e.g. 1ms).
    #[arg(long, default_value = "1ms", value_parser = parse_duration)]
    pub tick: Duration,
    /// Write all bus traffic to this capture file.
    #[arg(long, value_name = "FILE")]
    pub capture: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// Payload bytes in hex, separately ("00 1f") or concatenated ("001f").
    #[arg(required = true, num_args = 1..)]
    pub bytes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn parse_id(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid identifier: {input}"))
}

/// Decode hex byte arguments. Each argument may hold one or more bytes.
pub fn parse_hex_bytes(args: &[String]) -> CliResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for arg in args {
        let digits = arg.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(CliError::new(
                USAGE,
                format!("'{arg}' is not a whole number of hex bytes"),
            ));
        }
        for pair in digits.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| CliError::new(USAGE, format!("'{arg}' is not hex")))?;
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|_| CliError::new(USAGE, format!("'{arg}' is not hex")))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}
