use std::{
    fs::File,
    io::{self, BufReader, Write},
};

use anyhow::Context;
use srconv::{i2c, image::Image};
use tracing::debug;

#[derive(argh::FromArgs)]
/// Convert a sigrok i2c eeprom read log to a binary image on stdout.
struct Arguments {
    #[argh(
        option,
        short = 'a',
        default = "i2c::DEFAULT_ADDRESS",
        from_str_fn(parse_hex_address)
    )]
    /// eeprom address in hexadecimal (default: 50)
    address: u8,

    #[argh(positional)]
    /// input i2c log file, stdin if not given
    file: Option<String>,
}

fn parse_hex_address(value: &str) -> Result<u8, String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u8::from_str_radix(digits, 16).map_err(|e| format!("bad hex address: {}", e))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Arguments = argh::from_env();

    let txns = match &args.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path))?;
            i2c::parse_log(BufReader::new(file), args.address)?
        }
        None => i2c::parse_log(io::stdin().lock(), args.address)?,
    };
    debug!(transactions = txns.len(), "replayed log");

    let image = Image::assemble(txns)?;
    io::stdout().write_all(&image.bytes)?;

    Ok(())
}
