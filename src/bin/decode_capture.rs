use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use uvdm_lib::UvdmMessage;
use uvdm_rs::logging::setup_logging;

/// Decode every PD vendor message found in a text capture.
///
/// Any run of at least six hex bytes (optionally separated by spaces or
/// colons) is treated as one message: 2 header bytes plus data objects.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Capture file (tshark/usbmon text dump, kernel log, ...).
    file: PathBuf,
    /// Only print messages that carry a Samsung UVDM.
    #[arg(short, long)]
    samsung_only: bool,
    /// Emit one JSON object per message instead of text.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(None, &cli.verbose)?;

    let text = std::fs::read_to_string(&cli.file).with_context(|| format!("Failed to read {:?}", cli.file))?;
    let hex_run = Regex::new(r"(?:[0-9A-Fa-f]{2}[ :]?){6,}").context("Invalid hex pattern")?;

    let mut decoded = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in text.lines().enumerate() {
        for found in hex_run.find_iter(line) {
            let clean: String = found.as_str().chars().filter(|c| c.is_ascii_hexdigit()).collect();
            let bytes = match hex::decode(&clean) {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    debug!("line {}: not hex ({})", line_no + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            let message = match UvdmMessage::try_from(bytes) {
                Ok(message) => message,
                Err(e) => {
                    warn!("line {}: {}", line_no + 1, e);
                    skipped += 1;
                    continue;
                }
            };
            if cli.samsung_only && !message.is_samsung_uvdm() {
                skipped += 1;
                continue;
            }

            decoded += 1;
            if cli.json {
                println!("{}", serde_json::to_string(&message.summary())?);
            } else {
                println!("--- line {} ---", line_no + 1);
                println!("{}", message);
            }
        }
    }

    info!("Decoded {} messages, skipped {}", decoded, skipped);
    Ok(())
}
