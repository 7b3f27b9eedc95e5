use crate::error::UvdmError;
use crate::message::UvdmMessage;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

/// The PD policy engine that owns the vendor-message transmit queue.
///
/// `queue_vendor_message` must not block: it hands the message to the
/// protocol layer and returns. Replies come back through
/// [`crate::UvdmManager::dispatch_received`].
pub trait PolicyEngine: Send + Sync + 'static {
    fn queue_vendor_message(&self, message: &UvdmMessage) -> Result<(), UvdmError>;
}

/// In-process engine that forwards every queued message to a channel.
#[derive(Debug, Clone)]
pub struct LoopbackEngine {
    outbox: mpsc::UnboundedSender<UvdmMessage>,
}

impl LoopbackEngine {
    /// Create the engine and the receiving end of its outbox.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UvdmMessage>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        (Self { outbox }, rx)
    }
}

impl PolicyEngine for LoopbackEngine {
    fn queue_vendor_message(&self, message: &UvdmMessage) -> Result<(), UvdmError> {
        debug!(bytes = hex::encode(Bytes::from(*message)), "UVDM queued");
        self.outbox
            .send(*message)
            .map_err(|_| UvdmError::Engine("loopback outbox closed".to_string()))
    }
}
