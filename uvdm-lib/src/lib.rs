pub mod accessory;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod header;
pub mod manager;
pub mod message;
pub mod payload;
mod session;


// Re-export the main types for easy access
pub use config::UvdmConfig;
pub use engine::{LoopbackEngine, PolicyEngine};
pub use error::UvdmError;
pub use manager::UvdmManager;
pub use message::UvdmMessage;
pub use payload::UvdmPayload;
