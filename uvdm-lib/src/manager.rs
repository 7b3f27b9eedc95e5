use crate::chunk::{self, chunk_count, chunk_data_size};
use crate::config::UvdmConfig;
use crate::constants::*;
use crate::engine::PolicyEngine;
use crate::error::UvdmError;
use crate::header::{CommandType, DataType, Direction, RxResult};
use crate::message::{SecFields, UvdmMessage, tx_header};
use crate::payload::UvdmPayload;
use crate::session::{SessionSlot, SessionState};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// Host side of the Samsung UVDM transfer protocol for one PD port.
///
/// `send` and `receive` hold a transfer lock for their whole exchange, so
/// at most one transfer is in flight per manager. Messages coming up from
/// the policy engine enter through [`UvdmManager::dispatch_received`].
pub struct UvdmManager<E: PolicyEngine> {
    config: UvdmConfig,
    engine: RwLock<Option<Arc<E>>>,
    sessions: SessionSlot,
    transfer_lock: Mutex<()>,
    accessory_mode: AtomicBool,
}

impl<E: PolicyEngine> UvdmManager<E> {
    /// Create an unbound manager. Every entry point fails with
    /// [`UvdmError::NoDevice`] until [`UvdmManager::bind`] is called.
    pub fn new(config: UvdmConfig) -> Self {
        Self {
            config,
            engine: RwLock::new(None),
            sessions: SessionSlot::default(),
            transfer_lock: Mutex::new(()),
            accessory_mode: AtomicBool::new(false),
        }
    }

    /// Create a manager already bound to `engine`.
    pub fn with_engine(config: UvdmConfig, engine: E) -> Self {
        let manager = Self::new(config);
        manager.bind(Arc::new(engine));
        manager
    }

    pub fn config(&self) -> &UvdmConfig {
        &self.config
    }

    pub fn bind(&self, engine: Arc<E>) {
        *self.engine.write().unwrap_or_else(PoisonError::into_inner) = Some(engine);
        info!("UVDM manager bound to policy engine (pid {:#06x})", self.config.product_id);
    }

    /// Release the policy engine and abort any transfer in flight.
    pub fn unbind(&self) {
        self.engine.write().unwrap_or_else(PoisonError::into_inner).take();
        self.close();
        info!("UVDM manager unbound");
    }

    fn engine(&self) -> Result<Arc<E>, UvdmError> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                warn!("UVDM request without a bound policy engine");
                UvdmError::NoDevice
            })
    }

    /// Whether the attached accessory has entered Samsung mode.
    pub fn ready(&self) -> Result<bool, UvdmError> {
        self.engine()?;
        let ready = self.accessory_mode.load(Ordering::Acquire);
        info!("UVDM ready = {}", ready);
        Ok(ready)
    }

    pub fn set_accessory_mode(&self, entered: bool) {
        self.accessory_mode.store(entered, Ordering::Release);
    }

    /// Plug or accessory detach: leave Samsung mode and abort the transfer.
    pub fn detach(&self) {
        info!("UVDM accessory detached");
        self.accessory_mode.store(false, Ordering::Release);
        self.close();
    }

    /// Wake any blocked `send`/`receive`, which then fails with [`UvdmError::Closed`].
    pub fn close(&self) {
        if self.sessions.close() {
            info!("UVDM close: in-flight transfer released");
        } else {
            debug!("UVDM close: no transfer in flight");
        }
    }

    /// Convenience wrapper around [`UvdmManager::send`] for raw slices.
    pub async fn send_bytes(&self, data: &[u8]) -> Result<usize, UvdmError> {
        let payload = UvdmPayload::try_from(data)?;
        self.send(&payload).await
    }

    /// Send `payload` to the accessory and return its length once every
    /// chunk has been acknowledged.
    pub async fn send(&self, payload: &UvdmPayload) -> Result<usize, UvdmError> {
        let engine = self.engine()?;
        let _transfer = self.transfer_lock.lock().await;
        let size = payload.len();
        let pid = self.config.product_id;

        if payload.is_short() {
            info!("UVDM out: short data ({} byte)", size);
            let message = UvdmMessage::short_data(SecFields {
                pid,
                data_type: DataType::Short,
                cmd_type: CommandType::Initiator,
                direction: Direction::Out,
                total_set_num: 1,
                data: payload.first().copied().unwrap_or(0),
            });
            engine.queue_vendor_message(&message)?;
            return Ok(size);
        }

        let sets = chunk_count(size);
        if sets > MAX_UVDM_SETS {
            return Err(UvdmError::TooManySets {
                sets,
                max: MAX_UVDM_SETS,
            });
        }

        info!("UVDM out: long data, {} bytes in {} sets", size, sets);
        let staged = chunk::flip(payload);
        let mut session = self.sessions.open(Direction::Out, self.config.channel_depth);
        let mut offset = 0usize;
        let mut remaining = size;

        for seq in 1..=sets {
            let first = seq == 1;
            let cur = chunk_data_size(first, remaining);
            let span = if first { SEC_UVDM_MAXDATA_FIRST } else { SEC_UVDM_MAXDATA_NORMAL };
            let end = (offset + span).min(staged.len());
            let window = staged.get(offset..end).unwrap_or_default();

            let sec = first.then_some(SecFields {
                pid,
                data_type: DataType::Long,
                cmd_type: CommandType::Initiator,
                direction: Direction::Out,
                total_set_num: sets as u8,
                data: 0,
            });
            let message = UvdmMessage::data_chunk(sec, tx_header(seq as u8, cur as u8, size as u8), window);

            info!(
                "UVDM out: set {}/{} carries {} bytes ({} of {} remaining)",
                seq, sets, cur, remaining, size
            );
            debug!(bytes = hex::encode(Bytes::from(message)), "UVDM out chunk");
            engine.queue_vendor_message(&message)?;

            if let Err(e) = session.wait(self.config.wait()).await {
                error!("UVDM out: set {}/{} not acknowledged: {}", seq, sets, e);
                return Err(e);
            }

            offset += span;
            remaining -= cur;
            if first {
                session.state().clear_first_chunk();
            }
        }

        info!("UVDM out: {} bytes delivered", size);
        Ok(size)
    }

    /// Request data from the accessory and return the reassembled payload.
    pub async fn receive(&self) -> Result<UvdmPayload, UvdmError> {
        let engine = self.engine()?;
        let _transfer = self.transfer_lock.lock().await;

        let mut session = self.sessions.open(Direction::In, self.config.channel_depth);
        info!("UVDM in: requesting data");
        engine.queue_vendor_message(&UvdmMessage::in_request(self.config.product_id))?;

        let mut staged: Vec<u8> = Vec::with_capacity(MAX_INPUT_DATA + SEC_UVDM_MAXDATA_NORMAL);
        let mut total_size = 0usize;
        let mut total_sets = 1usize;
        let mut received = 0usize;
        let mut chunks = 0usize;

        loop {
            let message = match session.wait(self.config.wait()).await {
                Ok(message) => message,
                Err(e) => {
                    error!("UVDM in: no chunk after {} sets: {}", chunks, e);
                    return Err(e);
                }
            };
            debug!(bytes = hex::encode(Bytes::from(message)), "UVDM in chunk");

            chunks += 1;
            if chunks > MAX_UVDM_SETS {
                return Err(UvdmError::InvalidMessage(format!(
                    "accessory sent more than {} sets",
                    MAX_UVDM_SETS
                )));
            }

            let first = session.state().is_first_chunk();
            let tx = message.tx_header(first);
            if first {
                let sec = message.sec_header();
                if sec.data_kind() == DataType::Short {
                    info!("UVDM in: short data {:#04x}", sec.data());
                    return UvdmPayload::new(vec![sec.data()]);
                }
                total_size = tx.total_size() as usize;
                total_sets = sec.total_set_num() as usize;
                session.state().clear_first_chunk();
            }
            staged.extend_from_slice(message.payload(first));

            let seq = tx.order_cur_set();
            let cur = tx.cur_size();
            received += cur as usize;

            let result = if message.checksum_ok() {
                RxResult::Ack
            } else {
                warn!(
                    "UVDM in: checksum mismatch on set {} (got {:#06x}, computed {:#06x})",
                    seq,
                    message.tailer().checksum(),
                    message.checksum()
                );
                RxResult::Nak
            };
            info!(
                "UVDM in: set {}/{} with {} bytes ({}/{} received), {}",
                seq, total_sets, cur, received, total_size, result
            );
            engine.queue_vendor_message(&UvdmMessage::rx_ack(seq, cur, result))?;

            if seq as usize >= total_sets {
                break;
            }
        }

        if received != total_size {
            error!("UVDM in: transfer ended after {} of {} bytes", received, total_size);
            return Err(UvdmError::InvalidMessage(format!(
                "accessory sent {} of {} bytes in {} sets",
                received, total_size, chunks
            )));
        }

        let data = chunk::unflip(&staged, total_size);
        info!("UVDM in: {} bytes received", total_size);
        UvdmPayload::new(data)
    }

    /// Route a vendor message from the policy engine to the transfer in flight.
    ///
    /// Never blocks; safe to call from the engine's receive path.
    pub fn dispatch_received(&self, message: &UvdmMessage) {
        if !message.is_samsung_uvdm() {
            debug!("Ignoring non-Samsung vendor message");
            return;
        }
        let Some((state, tx)) = self.sessions.current() else {
            debug!("UVDM message with no transfer in flight");
            return;
        };

        match state.direction() {
            Direction::Out => {
                debug!("UVDM dispatch: out");
                check_out_response(&state, message);
                forward(&tx, message);
            }
            Direction::In => {
                debug!("UVDM dispatch: in");
                if state.is_first_chunk() && message.sec_header().command() != CommandType::Ack {
                    warn!("UVDM in: busy or NAK received in place of the first chunk");
                    return;
                }
                forward(&tx, message);
            }
            Direction::Unknown(v) => warn!("UVDM session with unknown direction {}", v),
        }
    }
}

/// Log the accessory's verdict on an outbound chunk. NAK and busy are
/// reported but do not fail the transfer.
fn check_out_response(state: &SessionState, message: &UvdmMessage) {
    if state.is_first_chunk() {
        let sec = message.sec_header();
        match (sec.data_kind(), sec.command()) {
            (DataType::Long, CommandType::Ack) => {
                let rx = message.rx_header(true);
                if rx.result() != RxResult::Ack {
                    warn!("UVDM out: busy or NAK received ({})", rx.result());
                }
            }
            (DataType::Long, other) => warn!("UVDM out: response type is wrong ({})", other),
            (_, CommandType::Ack) => info!("UVDM out: short packet ack received"),
            (_, other) => warn!("UVDM out: short packet response type is wrong ({})", other),
        }
    } else {
        let rx = message.rx_header(false);
        if rx.result() != RxResult::Ack {
            warn!("UVDM out: busy or NAK received on set {} ({})", rx.order_cur_set(), rx.result());
        }
    }
}

fn forward(tx: &mpsc::Sender<UvdmMessage>, message: &UvdmMessage) {
    if let Err(e) = tx.try_send(*message) {
        warn!("UVDM message dropped: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LoopbackEngine;
    use std::time::Duration;

    fn manager() -> UvdmManager<LoopbackEngine> {
        let (engine, _outbox) = LoopbackEngine::new();
        UvdmManager::with_engine(UvdmConfig::default(), engine)
    }

    fn out_ack() -> UvdmMessage {
        UvdmMessage::rx_ack(1, 12, RxResult::Ack)
    }

    fn in_first_chunk(cmd_type: CommandType) -> UvdmMessage {
        let sec = SecFields {
            pid: DEFAULT_PRODUCT_ID,
            data_type: DataType::Long,
            cmd_type,
            direction: Direction::In,
            total_set_num: 1,
            data: 0,
        };
        UvdmMessage::data_chunk(Some(sec), tx_header(1, 4, 4), &[1, 2, 3, 4])
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_reaches_only_the_active_direction() {
        let manager = manager();
        let mut inbound = manager.sessions.open(Direction::In, 4);
        let mut outbound = manager.sessions.open(Direction::Out, 4);

        manager.dispatch_received(&out_ack());

        assert!(outbound.wait(Duration::from_millis(10)).await.is_ok());
        assert!(
            matches!(inbound.wait(Duration::from_millis(10)).await, Err(UvdmError::Closed)),
            "a replaced inbound session must not see outbound traffic"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_skips_replaced_outbound_session() {
        let manager = manager();
        let mut outbound = manager.sessions.open(Direction::Out, 4);
        let mut inbound = manager.sessions.open(Direction::In, 4);

        manager.dispatch_received(&in_first_chunk(CommandType::Ack));

        assert!(inbound.wait(Duration::from_millis(10)).await.is_ok());
        assert!(
            matches!(outbound.wait(Duration::from_millis(10)).await, Err(UvdmError::Closed)),
            "a replaced outbound session must not see inbound traffic"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_rejects_transfer_missing_bytes() {
        let (engine, mut outbox) = LoopbackEngine::new();
        let manager = Arc::new(UvdmManager::with_engine(UvdmConfig::default(), engine));
        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.receive().await }
        });
        outbox.recv().await.unwrap();

        // A wrapped set counter announces one set for a 240-byte transfer
        let sec = SecFields {
            pid: DEFAULT_PRODUCT_ID,
            data_type: DataType::Long,
            cmd_type: CommandType::Ack,
            direction: Direction::In,
            total_set_num: 16,
            data: 0,
        };
        manager.dispatch_received(&UvdmMessage::data_chunk(Some(sec), tx_header(1, 12, 240), &[0xAA; 12]));

        let result = task.await.unwrap();
        assert!(matches!(result, Err(UvdmError::InvalidMessage(_))), "got {:?}", result);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_first_chunk_must_be_ack() {
        let manager = manager();
        let mut inbound = manager.sessions.open(Direction::In, 4);

        manager.dispatch_received(&in_first_chunk(CommandType::Nak));
        assert!(matches!(
            inbound.wait(Duration::from_millis(10)).await,
            Err(UvdmError::Timeout(_))
        ));

        manager.dispatch_received(&in_first_chunk(CommandType::Ack));
        let message = inbound.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(message.sec_header().command(), CommandType::Ack);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_nak_still_completes_wait() {
        let manager = manager();
        let mut outbound = manager.sessions.open(Direction::Out, 4);
        outbound.state().clear_first_chunk();

        manager.dispatch_received(&UvdmMessage::rx_ack(2, 16, RxResult::Nak));
        let message = outbound.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(message.rx_header(false).result(), RxResult::Nak);
    }

    #[tokio::test]
    async fn test_dispatch_without_session_is_dropped() {
        let manager = manager();
        manager.dispatch_received(&out_ack());
        assert!(manager.sessions.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_released_after_drop() {
        let manager = manager();
        {
            let _session = manager.sessions.open(Direction::Out, 4);
            assert!(manager.sessions.current().is_some());
        }
        assert!(manager.sessions.current().is_none());
    }
}
