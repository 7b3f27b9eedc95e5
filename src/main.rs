use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

use uvdm_lib::accessory::{SimulatedAccessory, spawn_loopback};
use uvdm_lib::chunk::{chunk_count, chunk_plan};
use uvdm_lib::constants::MAX_UVDM_SETS;
use uvdm_lib::{LoopbackEngine, UvdmConfig, UvdmManager, UvdmMessage, UvdmPayload};
use uvdm_rs::logging::setup_logging;

/// Drive Samsung UVDM transfers against a simulated accessory and decode
/// PD vendor messages.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with product_id, wait_ms and channel_depth.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Product id for the Samsung sub-header (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u16)]
    pid: Option<u16>,
    /// Per-chunk handshake wait in milliseconds.
    #[arg(long)]
    wait_ms: Option<u64>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how a payload is split into UVDM sets.
    Plan { hex: String },
    /// Send a payload to the accessory and print what it reassembled.
    Send {
        hex: String,
        /// Have the accessory NAK this set.
        #[arg(long)]
        nak_set: Option<u8>,
    },
    /// Load the accessory with a payload and read it back.
    Receive {
        hex: String,
        /// Have the accessory corrupt the checksum of this set.
        #[arg(long)]
        corrupt_set: Option<u8>,
    },
    /// Decode one PD vendor message (header followed by data objects).
    Decode {
        hex: String,
        /// Print the decoded fields as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn parse_u16(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid product id '{}': {}", text, e))
}

fn load_config(cli: &Cli) -> Result<UvdmConfig> {
    let mut config = match cli.config {
        Some(ref path) => UvdmConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => UvdmConfig::default(),
    };
    if let Some(pid) = cli.pid {
        config = config.with_product_id(pid);
    }
    if let Some(wait_ms) = cli.wait_ms {
        config = config.with_wait_ms(wait_ms);
    }
    Ok(config)
}

struct Loopback {
    manager: Arc<UvdmManager<LoopbackEngine>>,
    accessory: Arc<Mutex<SimulatedAccessory>>,
}

impl Loopback {
    fn start(config: UvdmConfig, accessory: SimulatedAccessory) -> Self {
        let (engine, outbox) = LoopbackEngine::new();
        let manager = Arc::new(UvdmManager::with_engine(config, engine));
        let accessory = Arc::new(Mutex::new(accessory));
        spawn_loopback(manager.clone(), outbox, accessory.clone());
        manager.set_accessory_mode(true);
        Self { manager, accessory }
    }

    fn received(&self) -> Vec<UvdmPayload> {
        self.accessory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .received()
            .to_vec()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("Command failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(
        "Using UVDM config: pid {:#06x}, wait {} ms",
        config.product_id, config.wait_ms
    );

    match cli.command {
        Command::Plan { hex } => plan(&hex),
        Command::Send { hex, nak_set } => send(config, &hex, nak_set).await,
        Command::Receive { hex, corrupt_set } => receive(config, &hex, corrupt_set).await,
        Command::Decode { hex, json } => decode(&hex, json),
    }
}

fn plan(hex: &str) -> Result<()> {
    let payload = UvdmPayload::from_hex(hex)?;
    if payload.is_short() {
        println!("{} byte(s): one short message", payload.len());
        return Ok(());
    }

    let sets = chunk_count(payload.len());
    println!("{} bytes in {} sets: {:?}", payload.len(), sets, chunk_plan(payload.len()));
    if sets > MAX_UVDM_SETS {
        warn!("{} sets exceed the {} the set counter can hold; send would fail", sets, MAX_UVDM_SETS);
    }
    Ok(())
}

async fn send(config: UvdmConfig, hex: &str, nak_set: Option<u8>) -> Result<()> {
    let payload = UvdmPayload::from_hex(hex)?;
    let mut accessory = SimulatedAccessory::new(config.product_id);
    if let Some(seq) = nak_set {
        accessory = accessory.with_nak_set(seq);
    }
    let link = Loopback::start(config, accessory);

    let sent = link.manager.send(&payload).await.context("UVDM send failed")?;
    if payload.is_short() {
        // Short data is not acknowledged; give the accessory a moment
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    match link.received().last() {
        Some(received) => println!("sent {} bytes, accessory received {}", sent, received),
        None => bail!("accessory did not record the transfer"),
    }
    Ok(())
}

async fn receive(config: UvdmConfig, hex: &str, corrupt_set: Option<u8>) -> Result<()> {
    let payload = UvdmPayload::from_hex(hex)?;
    let mut accessory = SimulatedAccessory::new(config.product_id).with_outgoing(payload);
    if let Some(seq) = corrupt_set {
        accessory = accessory.with_corrupt_set(seq);
    }
    let link = Loopback::start(config, accessory);

    let received = link.manager.receive().await.context("UVDM receive failed")?;
    println!("received {} bytes: {}", received.len(), received);
    Ok(())
}

fn decode(hex: &str, json: bool) -> Result<()> {
    let clean: String = hex.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let bytes = hex::decode(&clean).with_context(|| format!("Invalid hex: {}", hex))?;
    let message = UvdmMessage::try_from(Bytes::from(bytes))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message.summary())?);
    } else {
        println!("{}", message);
    }
    Ok(())
}
