use crate::chunk;
use crate::constants::*;
use crate::error::UvdmError;
use crate::header::{
    CommandType, DataType, Direction, MsgHeader, RxHeader, RxResult, SecUvdmHeader, TxHeader, TxTailer, VdmHeader,
};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::fmt;
use zerocopy::IntoBytes;
use zerocopy::byteorder::little_endian::U32;

/// One PD vendor-defined message carrying a Samsung UVDM.
///
/// The seven data objects are kept as little-endian words so that
/// [`UvdmMessage::image`] is the exact byte layout the checksum covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvdmMessage {
    pub header: MsgHeader,
    objects: [U32; USBPD_MAX_COUNT_MSG_OBJECT],
}

/// Fields of a Samsung sub-header, in builder form.
#[derive(Debug, Clone, Copy)]
pub struct SecFields {
    pub pid: u16,
    pub data_type: DataType,
    pub cmd_type: CommandType,
    pub direction: Direction,
    pub total_set_num: u8,
    pub data: u8,
}

impl SecFields {
    fn into_header(self) -> SecUvdmHeader {
        SecUvdmHeader::new()
            .with_pid(self.pid)
            .with_data_type(u8::from(self.data_type) & 0x01)
            .with_cmd_type(u8::from(self.cmd_type) & 0x03)
            .with_direction(u8::from(self.direction) & 0x01)
            .with_total_set_num(self.total_set_num & 0x0F)
            .with_data(self.data)
    }
}

impl UvdmMessage {
    /// Empty Samsung UVDM with the message and VDM headers filled in.
    pub fn new(num_data_objs: u8) -> Self {
        let header = MsgHeader::new()
            .with_msg_type(USBPD_VENDOR_DEFINED)
            .with_port_data_role(USBPD_DFP)
            .with_num_data_objs(num_data_objs.min(USBPD_MAX_COUNT_MSG_OBJECT as u8));
        let vdm = VdmHeader::new()
            .with_vendor_id(SAMSUNG_VENDOR_ID)
            .with_vdm_type(0)
            .with_vendor_defined(SEC_UVDM_UNSTRUCTURED_VDM);

        let mut message = Self {
            header,
            objects: [U32::new(0); USBPD_MAX_COUNT_MSG_OBJECT],
        };
        message.set_object(OBJ_VDM_HEADER, vdm.into());
        message
    }

    pub fn num_data_objects(&self) -> usize {
        self.header.num_data_objs() as usize
    }

    pub fn object(&self, index: usize) -> u32 {
        self.objects[index].get()
    }

    pub fn set_object(&mut self, index: usize, word: u32) {
        self.objects[index] = U32::new(word);
    }

    /// Byte image of all seven data objects.
    pub fn image(&self) -> &[u8] {
        self.objects.as_bytes()
    }

    pub fn vdm_header(&self) -> VdmHeader {
        VdmHeader::from(self.object(OBJ_VDM_HEADER))
    }

    /// Samsung sub-header (object 1 of first chunks, requests and short messages).
    pub fn sec_header(&self) -> SecUvdmHeader {
        SecUvdmHeader::from(self.object(OBJ_SEC_HEADER))
    }

    /// Transfer header, whose position depends on whether this is the first chunk.
    pub fn tx_header(&self, first: bool) -> TxHeader {
        let index = if first { OBJ_FIRST_TX_HEADER } else { OBJ_NEXT_TX_HEADER };
        TxHeader::from(self.object(index))
    }

    /// Rx acknowledgement header; follows the sub-header on a first-chunk ack.
    pub fn rx_header(&self, first: bool) -> RxHeader {
        let index = if first { OBJ_FIRST_TX_HEADER } else { OBJ_NEXT_TX_HEADER };
        RxHeader::from(self.object(index))
    }

    pub fn tailer(&self) -> TxTailer {
        TxTailer::from(self.object(OBJ_TAILER))
    }

    /// Payload area: 12 bytes from object 3 on the first chunk, 16 bytes
    /// from object 2 otherwise.
    pub fn payload(&self, first: bool) -> &[u8] {
        let (start, len) = payload_window(first);
        &self.image()[start..start + len]
    }

    fn payload_mut(&mut self, first: bool) -> &mut [u8] {
        let (start, len) = payload_window(first);
        &mut self.objects.as_mut_bytes()[start..start + len]
    }

    /// Checksum computed over the current image.
    pub fn checksum(&self) -> u16 {
        chunk::checksum(self.image())
    }

    pub fn checksum_ok(&self) -> bool {
        self.tailer().checksum() == self.checksum()
    }

    fn stamp_checksum(&mut self) {
        let tailer = TxTailer::new().with_checksum(self.checksum());
        self.set_object(OBJ_TAILER, tailer.into());
    }

    /// Vendor_Defined, Samsung VID, unstructured.
    pub fn is_samsung_uvdm(&self) -> bool {
        let vdm = self.vdm_header();
        self.header.msg_type() == USBPD_VENDOR_DEFINED
            && self.num_data_objects() >= SHORT_MSG_OBJECTS as usize
            && vdm.vendor_id() == SAMSUNG_VENDOR_ID
            && vdm.vdm_type() == 0
    }

    /// Short message carrying one inline byte.
    pub fn short_data(sec: SecFields) -> Self {
        let mut message = Self::new(SHORT_MSG_OBJECTS);
        message.set_object(OBJ_SEC_HEADER, sec.into_header().into());
        message
    }

    /// Host request that starts an inbound transfer.
    pub fn in_request(pid: u16) -> Self {
        Self::short_data(SecFields {
            pid,
            data_type: DataType::Long,
            cmd_type: CommandType::Initiator,
            direction: Direction::In,
            total_set_num: 0,
            data: 0,
        })
    }

    /// One chunk of a long transfer.
    ///
    /// `first` carries the sub-header for the first chunk and selects the
    /// first-chunk layout. `window` is copied into the payload area and
    /// truncated to its size; the checksum is stamped last.
    pub fn data_chunk(first: Option<SecFields>, tx: TxHeader, window: &[u8]) -> Self {
        let mut message = Self::new(USBPD_MAX_COUNT_MSG_OBJECT as u8);
        let is_first = first.is_some();
        if let Some(sec) = first {
            message.set_object(OBJ_SEC_HEADER, sec.into_header().into());
            message.set_object(OBJ_FIRST_TX_HEADER, tx.into());
        } else {
            message.set_object(OBJ_NEXT_TX_HEADER, tx.into());
        }

        let area = message.payload_mut(is_first);
        let len = window.len().min(area.len());
        area[..len].copy_from_slice(&window[..len]);

        message.stamp_checksum();
        message
    }

    /// Per-chunk receive acknowledgement sent by the host.
    pub fn rx_ack(seq: u8, rcv_data_size: u8, result: RxResult) -> Self {
        let mut message = Self::new(SHORT_MSG_OBJECTS);
        let rx = rx_header(seq, rcv_data_size, result);
        message.set_object(OBJ_NEXT_TX_HEADER, rx.into());
        message
    }

    /// Accessory acknowledgement of an outbound chunk. The first one leads
    /// with a sub-header echoing the transfer.
    pub fn chunk_ack(first: Option<SecFields>, seq: u8, rcv_data_size: u8, result: RxResult) -> Self {
        let rx = rx_header(seq, rcv_data_size, result);
        match first {
            Some(sec) => {
                let mut message = Self::new(SHORT_MSG_OBJECTS + 1);
                message.set_object(OBJ_SEC_HEADER, sec.into_header().into());
                message.set_object(OBJ_FIRST_TX_HEADER, rx.into());
                message
            }
            None => {
                let mut message = Self::new(SHORT_MSG_OBJECTS);
                message.set_object(OBJ_NEXT_TX_HEADER, rx.into());
                message
            }
        }
    }

    pub fn summary(&self) -> MessageSummary {
        let vdm = self.vdm_header();
        let sec = self.sec_header();
        MessageSummary {
            msg_type: self.header.msg_type(),
            num_data_objs: self.header.num_data_objs(),
            vendor_id: vdm.vendor_id(),
            samsung_uvdm: self.is_samsung_uvdm(),
            pid: sec.pid(),
            data_type: sec.data_kind().to_string(),
            cmd_type: sec.command().to_string(),
            direction: sec.transfer_direction().to_string(),
            objects: (0..self.num_data_objects())
                .map(|i| format!("{:08x}", self.object(i)))
                .collect(),
            checksum: self.tailer().checksum(),
            checksum_ok: self.num_data_objects() == USBPD_MAX_COUNT_MSG_OBJECT && self.checksum_ok(),
        }
    }
}

fn payload_window(first: bool) -> (usize, usize) {
    if first {
        (OBJ_FIRST_DATA * DATA_OBJECT_SIZE, SEC_UVDM_MAXDATA_FIRST)
    } else {
        (OBJ_NEXT_DATA * DATA_OBJECT_SIZE, SEC_UVDM_MAXDATA_NORMAL)
    }
}

fn rx_header(seq: u8, rcv_data_size: u8, result: RxResult) -> RxHeader {
    RxHeader::new()
        .with_order_cur_set(seq & 0x0F)
        .with_rcv_data_size(rcv_data_size)
        .with_result_value(u8::from(result) & 0x03)
}

/// Transfer header for chunk `seq` of a `total_size` byte transfer.
pub fn tx_header(seq: u8, cur_size: u8, total_size: u8) -> TxHeader {
    TxHeader::new()
        .with_cur_size(cur_size)
        .with_total_size(total_size)
        .with_order_cur_set(seq & 0x0F)
}

/// Decoded view of a message, used for capture dumps.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub msg_type: u8,
    pub num_data_objs: u8,
    pub vendor_id: u16,
    pub samsung_uvdm: bool,
    pub pid: u16,
    pub data_type: String,
    pub cmd_type: String,
    pub direction: String,
    pub objects: Vec<String>,
    pub checksum: u16,
    pub checksum_ok: bool,
}

impl From<UvdmMessage> for Bytes {
    fn from(message: UvdmMessage) -> Self {
        let count = message.num_data_objects();
        let mut buf = BytesMut::with_capacity(MSG_HEADER_SIZE + count * DATA_OBJECT_SIZE);
        buf.extend_from_slice(&message.header.into_bytes());
        buf.extend_from_slice(&message.image()[..count * DATA_OBJECT_SIZE]);
        buf.freeze()
    }
}

impl TryFrom<Bytes> for UvdmMessage {
    type Error = UvdmError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < MSG_HEADER_SIZE {
            return Err(UvdmError::InsufficientData {
                expected: MSG_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let header_bytes: [u8; MSG_HEADER_SIZE] = bytes[..MSG_HEADER_SIZE].try_into()?;
        let header = MsgHeader::from_bytes(header_bytes);

        let count = header.num_data_objs() as usize;
        let expected = MSG_HEADER_SIZE + count * DATA_OBJECT_SIZE;
        if bytes.len() < expected {
            return Err(UvdmError::InsufficientData {
                expected,
                actual: bytes.len(),
            });
        }
        if count == 0 {
            return Err(UvdmError::InvalidMessage(
                "control message carries no data objects".to_string(),
            ));
        }

        let mut message = Self {
            header,
            objects: [U32::new(0); USBPD_MAX_COUNT_MSG_OBJECT],
        };
        for (i, word) in bytes[MSG_HEADER_SIZE..expected].chunks_exact(DATA_OBJECT_SIZE).enumerate() {
            let word: [u8; DATA_OBJECT_SIZE] = word.try_into()?;
            message.set_object(i, u32::from_le_bytes(word));
        }
        Ok(message)
    }
}

impl fmt::Display for UvdmMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        writeln!(
            f,
            "PD msg_type={:#x} objs={} vid={:#06x} samsung_uvdm={}",
            summary.msg_type, summary.num_data_objs, summary.vendor_id, summary.samsung_uvdm
        )?;
        writeln!(
            f,
            "  sec: pid={:#06x} data={} cmd={} dir={}",
            summary.pid, summary.data_type, summary.cmd_type, summary.direction
        )?;
        for (i, word) in summary.objects.iter().enumerate() {
            writeln!(f, "  obj[{}] = {}", i, word)?;
        }
        if self.num_data_objects() == USBPD_MAX_COUNT_MSG_OBJECT {
            write!(
                f,
                "  checksum {:#06x} ({})",
                summary.checksum,
                if summary.checksum_ok { "ok" } else { "mismatch" }
            )?;
        }
        Ok(())
    }
}
