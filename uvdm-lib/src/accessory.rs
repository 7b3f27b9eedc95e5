//! Accessory (responder) side of the UVDM protocol.
//!
//! [`SimulatedAccessory`] answers host messages the way a Samsung accessory
//! does, which lets the host side run end to end without a PD PHY.
//! [`spawn_loopback`] wires it to a manager through a [`LoopbackEngine`] outbox.
//!
//! [`LoopbackEngine`]: crate::engine::LoopbackEngine

use crate::chunk::{self, chunk_count, chunk_data_size};
use crate::constants::*;
use crate::engine::PolicyEngine;
use crate::header::{CommandType, DataType, Direction, RxResult};
use crate::manager::UvdmManager;
use crate::message::{SecFields, UvdmMessage, tx_header};
use crate::payload::UvdmPayload;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Reassembly {
    total_size: usize,
    total_sets: usize,
    next_seq: u8,
    staged: Vec<u8>,
}

#[derive(Debug)]
struct Outgoing {
    staged: Vec<u8>,
    size: usize,
    sets: usize,
    sent_seq: usize,
    remaining: usize,
    offset: usize,
}

#[derive(Debug)]
pub struct SimulatedAccessory {
    pid: u16,
    outgoing: UvdmPayload,
    inbound: Option<Reassembly>,
    outbound: Option<Outgoing>,
    received: Vec<UvdmPayload>,
    host_messages: Vec<UvdmMessage>,
    nak_set: Option<u8>,
    corrupt_set: Option<u8>,
}

impl SimulatedAccessory {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            outgoing: UvdmPayload::default(),
            inbound: None,
            outbound: None,
            received: Vec::new(),
            host_messages: Vec::new(),
            nak_set: None,
            corrupt_set: None,
        }
    }

    /// Data handed to the host on its next inbound request.
    pub fn with_outgoing(mut self, payload: UvdmPayload) -> Self {
        self.outgoing = payload;
        self
    }

    /// Answer host set `seq` with a NAK instead of an ACK.
    pub fn with_nak_set(mut self, seq: u8) -> Self {
        self.nak_set = Some(seq);
        self
    }

    /// Send set `seq` to the host with a broken checksum.
    pub fn with_corrupt_set(mut self, seq: u8) -> Self {
        self.corrupt_set = Some(seq);
        self
    }

    /// Completed host-to-accessory transfers, oldest first.
    pub fn received(&self) -> &[UvdmPayload] {
        &self.received
    }

    /// Every message the host queued, in order.
    pub fn host_messages(&self) -> &[UvdmMessage] {
        &self.host_messages
    }

    /// Process one host message and return the replies to dispatch.
    ///
    /// Two-object messages are rx acknowledgements while an accessory to
    /// host transfer is running and requests otherwise. Seven-object
    /// messages continue the running host transfer when their sequence
    /// number is the expected one and start a new one otherwise.
    pub fn handle(&mut self, message: &UvdmMessage) -> Vec<UvdmMessage> {
        self.host_messages.push(*message);
        if !message.is_samsung_uvdm() {
            return Vec::new();
        }

        if message.num_data_objects() == USBPD_MAX_COUNT_MSG_OBJECT {
            let continues = self
                .inbound
                .as_ref()
                .is_some_and(|r| message.tx_header(false).order_cur_set() == r.next_seq);
            return if continues {
                self.next_chunk(message)
            } else {
                self.first_chunk(message)
            };
        }

        if self.outbound.is_some() {
            return self.on_rx_ack(message);
        }

        let sec = message.sec_header();
        match (sec.data_kind(), sec.transfer_direction()) {
            // The host does not wait on short data, so it is not answered.
            (DataType::Short, Direction::Out) => {
                info!("Accessory: short data {:#04x}", sec.data());
                self.received.push(UvdmPayload::new(vec![sec.data()]).unwrap_or_default());
                Vec::new()
            }
            (_, Direction::In) => self.start_outgoing(),
            (kind, dir) => {
                warn!("Accessory: unexpected request ({} / {})", kind, dir);
                Vec::new()
            }
        }
    }

    fn sec(&self, data_type: DataType, direction: Direction, total_set_num: u8, data: u8) -> SecFields {
        SecFields {
            pid: self.pid,
            data_type,
            cmd_type: CommandType::Ack,
            direction,
            total_set_num,
            data,
        }
    }

    fn verdict(&self, message: &UvdmMessage, seq: u8) -> RxResult {
        if self.nak_set == Some(seq) || !message.checksum_ok() {
            RxResult::Nak
        } else {
            RxResult::Ack
        }
    }

    fn first_chunk(&mut self, message: &UvdmMessage) -> Vec<UvdmMessage> {
        let sec = message.sec_header();
        let tx = message.tx_header(true);
        let seq = tx.order_cur_set();
        let mut reassembly = Reassembly {
            total_size: tx.total_size() as usize,
            total_sets: sec.total_set_num() as usize,
            next_seq: seq.wrapping_add(1),
            staged: Vec::with_capacity(MAX_INPUT_DATA + SEC_UVDM_MAXDATA_NORMAL),
        };
        reassembly.staged.extend_from_slice(message.payload(true));
        debug!(
            "Accessory: transfer of {} bytes in {} sets started",
            reassembly.total_size, reassembly.total_sets
        );

        let result = self.verdict(message, seq);
        let first = self.sec(DataType::Long, Direction::Out, sec.total_set_num(), 0);
        let reply = UvdmMessage::chunk_ack(Some(first), seq, tx.cur_size(), result);
        self.inbound = Some(reassembly);
        self.finish_if_complete(seq);
        vec![reply]
    }

    fn next_chunk(&mut self, message: &UvdmMessage) -> Vec<UvdmMessage> {
        let tx = message.tx_header(false);
        let seq = tx.order_cur_set();
        let result = self.verdict(message, seq);
        if let Some(reassembly) = self.inbound.as_mut() {
            reassembly.staged.extend_from_slice(message.payload(false));
            reassembly.next_seq = seq.wrapping_add(1);
        }
        let reply = UvdmMessage::chunk_ack(None, seq, tx.cur_size(), result);
        self.finish_if_complete(seq);
        vec![reply]
    }

    fn finish_if_complete(&mut self, seq: u8) {
        let done = self.inbound.as_ref().is_some_and(|r| seq as usize >= r.total_sets);
        if !done {
            return;
        }
        if let Some(reassembly) = self.inbound.take() {
            let data = chunk::unflip(&reassembly.staged, reassembly.total_size);
            info!("Accessory: received {} bytes", data.len());
            match UvdmPayload::new(data) {
                Ok(payload) => self.received.push(payload),
                Err(e) => warn!("Accessory: dropping transfer: {}", e),
            }
        }
    }

    fn start_outgoing(&mut self) -> Vec<UvdmMessage> {
        if self.outgoing.is_short() {
            let byte = self.outgoing.first().copied().unwrap_or(0);
            return vec![UvdmMessage::short_data(self.sec(DataType::Short, Direction::In, 1, byte))];
        }
        let size = self.outgoing.len();
        let sets = chunk_count(size);
        if sets > MAX_UVDM_SETS {
            warn!(
                "Accessory: {} bytes need {} sets, the set counter holds {}; not answering",
                size, sets, MAX_UVDM_SETS
            );
            return Vec::new();
        }
        self.outbound = Some(Outgoing {
            staged: chunk::flip(&self.outgoing),
            size,
            sets,
            sent_seq: 0,
            remaining: size,
            offset: 0,
        });
        self.emit_next().into_iter().collect()
    }

    fn on_rx_ack(&mut self, message: &UvdmMessage) -> Vec<UvdmMessage> {
        let rx = message.rx_header(false);
        if rx.result() != RxResult::Ack {
            warn!("Accessory: host reported {} for set {}", rx.result(), rx.order_cur_set());
        }
        let finished = self.outbound.as_ref().is_some_and(|o| o.sent_seq >= o.sets);
        if finished {
            self.outbound = None;
            return Vec::new();
        }
        self.emit_next().into_iter().collect()
    }

    fn emit_next(&mut self) -> Option<UvdmMessage> {
        let pid = self.pid;
        let corrupt_set = self.corrupt_set;
        let out = self.outbound.as_mut()?;

        let seq = out.sent_seq + 1;
        let first = seq == 1;
        let cur = chunk_data_size(first, out.remaining);
        let span = if first { SEC_UVDM_MAXDATA_FIRST } else { SEC_UVDM_MAXDATA_NORMAL };
        let end = (out.offset + span).min(out.staged.len());
        let window = out.staged.get(out.offset..end).unwrap_or_default();

        let sec = first.then_some(SecFields {
            pid,
            data_type: DataType::Long,
            cmd_type: CommandType::Ack,
            direction: Direction::In,
            total_set_num: out.sets as u8,
            data: 0,
        });
        let mut message = UvdmMessage::data_chunk(sec, tx_header(seq as u8, cur as u8, out.size as u8), window);
        if corrupt_set == Some(seq as u8) {
            message.set_object(OBJ_TAILER, message.object(OBJ_TAILER) ^ 0x1);
        }

        out.sent_seq = seq;
        out.offset += span;
        out.remaining -= cur;
        Some(message)
    }
}

/// Run `accessory` against `manager`: every message the manager queues on
/// `outbox` is answered and the replies are dispatched back.
pub fn spawn_loopback<E: PolicyEngine>(
    manager: Arc<UvdmManager<E>>,
    mut outbox: mpsc::UnboundedReceiver<UvdmMessage>,
    accessory: Arc<Mutex<SimulatedAccessory>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let replies = accessory
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .handle(&message);
            for reply in replies {
                manager.dispatch_received(&reply);
            }
        }
        debug!("Accessory loopback stopped");
    })
}
