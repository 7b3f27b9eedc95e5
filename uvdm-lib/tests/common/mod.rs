//! Common test utilities and shared imports

// Shared across test files; not every helper is used by each of them
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use std::sync::{Arc, Mutex};
#[allow(unused_imports)]
pub use uvdm_lib::accessory::{SimulatedAccessory, spawn_loopback};
#[allow(unused_imports)]
pub use uvdm_lib::constants::*;
#[allow(unused_imports)]
pub use uvdm_lib::header::{CommandType, DataType, Direction, RxResult};
#[allow(unused_imports)]
pub use uvdm_lib::{LoopbackEngine, UvdmConfig, UvdmError, UvdmManager, UvdmMessage, UvdmPayload};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Captured first chunk of a 30-byte host transfer of bytes 0..30
#[allow(dead_code)]
pub const FIRST_CHUNK_30: &str = "2f700000e804008300a50c1e001003020100070605040b0a0908a4010000";

/// Route library logs to the test harness; `RUST_LOG=debug` shows wire dumps.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Counting payload of `size` bytes
#[allow(dead_code)]
pub fn counting(size: usize) -> Vec<u8> {
    (0..size).map(|i| i as u8).collect()
}

/// Manager wired to a simulated accessory through the loopback engine.
#[allow(dead_code)]
pub struct Harness {
    pub manager: Arc<UvdmManager<LoopbackEngine>>,
    pub accessory: Arc<Mutex<SimulatedAccessory>>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(accessory: SimulatedAccessory) -> Self {
        Self::with_config(UvdmConfig::default(), accessory)
    }

    pub fn with_config(config: UvdmConfig, accessory: SimulatedAccessory) -> Self {
        init_tracing();
        let (engine, outbox) = LoopbackEngine::new();
        let manager = Arc::new(UvdmManager::with_engine(config, engine));
        let accessory = Arc::new(Mutex::new(accessory));
        spawn_loopback(manager.clone(), outbox, accessory.clone());
        Self { manager, accessory }
    }

    pub fn received(&self) -> Vec<UvdmPayload> {
        self.accessory.lock().unwrap().received().to_vec()
    }

    pub fn host_messages(&self) -> Vec<UvdmMessage> {
        self.accessory.lock().unwrap().host_messages().to_vec()
    }
}

/// Manager bound to a loopback engine with nobody answering.
#[allow(dead_code)]
pub fn silent_manager() -> (
    Arc<UvdmManager<LoopbackEngine>>,
    tokio::sync::mpsc::UnboundedReceiver<UvdmMessage>,
) {
    let (engine, outbox) = LoopbackEngine::new();
    (Arc::new(UvdmManager::with_engine(UvdmConfig::default(), engine)), outbox)
}
