use std::{fs, fs::File, io};

use anyhow::Context;
use srconv::{
    srzip::{self, ZipSink},
    waveforms,
};
use tracing::debug;

#[derive(argh::FromArgs)]
/// Repackage a WaveForms "Raw Data" CSV export as a sigrok srzip session.
struct Arguments {
    #[argh(positional)]
    /// the input CSV file (WaveForms "Raw Data" format)
    csv: String,

    #[argh(positional)]
    /// the sigrok srzip output file
    output: String,
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

    let text = fs::read_to_string(&args.csv).with_context(|| format!("reading {}", args.csv))?;
    let mtime = fs::metadata(&args.csv)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading mtime of {}", args.csv))?;

    let capture =
        waveforms::parse_capture(&text).with_context(|| format!("parsing {}", args.csv))?;
    debug!(
        samples = capture.sample_count(),
        rate = capture.sample_rate,
        "parsed capture"
    );

    let out = File::create(&args.output).with_context(|| format!("creating {}", args.output))?;
    let mut sink = ZipSink::new(out, mtime)?;
    srzip::write_session(&mut sink, &capture)?;
    sink.finish()?;

    Ok(())
}
