//! CLI front end for the AIRBIN generator.
//!
//! Reads a JSON fixture describing a device configuration and a buffer
//! allocation table, translates it, and writes the resulting AIRBIN to the
//! given output path.

use std::error::Error;
use std::fs::File;

use airbin_gen::ir::{BufferTable, DeviceOp};
use airbin_gen::{AirbinError, Translator};
use clap::Parser;
use serde::Deserialize;

/// A device configuration plus its buffer allocation table, as consumed by
/// this binary. The front-end dialect that would normally produce a
/// `DeviceOp` is out of scope; this fixture format stands in for it.
#[derive(Deserialize)]
struct Fixture {
    device: Option<DeviceOp>,
    #[serde(default)]
    buffers: BufferTable,
}

/// Translates a device configuration fixture into an AIRBIN.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input JSON fixture
    #[arg(short, long)]
    input: String,

    /// Path to write the resulting AIRBIN
    #[arg(short, long)]
    output: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let fixture_bytes = std::fs::read(&args.input)?;
    let fixture: Fixture = serde_json::from_slice(&fixture_bytes)?;
    let device = fixture.device.ok_or(AirbinError::MissingDeviceOp)?;

    let mut translator = Translator::new();
    let mut output = File::create(&args.output)?;
    translator.translate(&device, &fixture.buffers, &mut output)?;

    for diagnostic in translator.diagnostics() {
        log::warn!("{diagnostic}");
    }
    log::info!("wrote AIRBIN to {}", args.output);

    Ok(())
}
