use canmux_driver::{auto_support_crc, CRC8_SEED};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::cmd::{parse_hex_bytes, CrcArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{hex_string, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    bytes: String,
    length: usize,
    seed: String,
    crc: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex_bytes(&args.bytes)?;
    let output = CrcOutput {
        bytes: hex_string(&bytes),
        length: bytes.len(),
        seed: format!("0x{CRC8_SEED:02x}"),
        crc: format!("0x{:02x}", auto_support_crc(&bytes)),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["BYTES", "LEN", "SEED", "CRC8"])
                .add_row(vec![
                    output.bytes.clone(),
                    output.length.to_string(),
                    output.seed.clone(),
                    output.crc.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", output.crc),
    }
    Ok(SUCCESS)
}
