use crate::constants::{DEFAULT_CHANNEL_DEPTH, DEFAULT_PRODUCT_ID, SEC_UVDM_WAIT_MS};
use crate::error::UvdmError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-device settings of a [`crate::UvdmManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvdmConfig {
    /// Product id written into every Samsung sub-header
    pub product_id: u16,
    /// Wait for each chunk handshake, in milliseconds
    pub wait_ms: u64,
    /// Depth of the per-transfer receive channel
    pub channel_depth: usize,
}

impl Default for UvdmConfig {
    fn default() -> Self {
        Self {
            product_id: DEFAULT_PRODUCT_ID,
            wait_ms: SEC_UVDM_WAIT_MS,
            channel_depth: DEFAULT_CHANNEL_DEPTH,
        }
    }
}

impl UvdmConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn with_product_id(mut self, product_id: u16) -> Self {
        self.product_id = product_id;
        self
    }

    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = wait_ms;
        self
    }

    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, UvdmError> {
        let config: Self = serde_json::from_str(text)?;
        if config.channel_depth == 0 {
            return Err(UvdmError::InvalidConfig("channel_depth must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, UvdmError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
