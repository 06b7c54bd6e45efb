use std::{
    fs,
    fs::File,
    io::{self, BufReader, Write},
};

use anyhow::Context;
use srconv::{image::Image, spiflash};
use tracing::debug;

#[derive(argh::FromArgs)]
/// Convert a sigrok spiflash read log to a binary image on stdout.
struct Arguments {
    #[argh(option, short = 'm')]
    /// also write a mask image (0xff where data was read) to this file
    output_mask: Option<String>,

    #[argh(positional)]
    /// input spi log file, stdin if not given
    file: Option<String>,
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
            spiflash::parse_log(BufReader::new(file))?
        }
        None => spiflash::parse_log(io::stdin().lock())?,
    };
    debug!(transactions = txns.len(), "parsed log");

    let image = Image::assemble_with_mask(txns)?;
    if image.bytes.is_empty() {
        anyhow::bail!("No data found in the input file.");
    }

    io::stdout().write_all(&image.bytes)?;

    if let Some(path) = &args.output_mask {
        let mask = image.mask.as_deref().unwrap_or_default();
        fs::write(path, mask).with_context(|| format!("writing mask file {}", path))?;
        eprintln!("Mask image written to {}", path);
    }

    Ok(())
}
