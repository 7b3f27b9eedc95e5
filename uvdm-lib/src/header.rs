//! Bit layouts of the PD message header and the Samsung UVDM sub-headers.
//!
//! Every 32-bit header is one PD data object; fields are packed LSB first and
//! objects travel little endian, so `from_bytes(word.to_le_bytes())` recovers
//! a header from a received word.

use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

/// 16-bit USB-PD message header.
#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MsgHeader {
    pub msg_type: B4,
    #[skip]
    unused: B1,
    pub port_data_role: B1,
    pub spec_revision: B2,
    pub port_power_role: B1,
    pub msg_id: B3,
    pub num_data_objs: B3,
    pub extended: bool,
}

/// Object 0: the unstructured VDM header.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VdmHeader {
    pub vendor_defined: B15,
    pub vdm_type: B1,
    pub vendor_id: u16,
}

/// Samsung sub-header: product id, data/command type, direction and either
/// the total set count or a one-byte inline payload.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecUvdmHeader {
    pub data: u8,
    pub total_set_num: B4,
    pub direction: B1,
    pub cmd_type: B2,
    pub data_type: B1,
    pub pid: u16,
}

/// Per-chunk transfer header of a long transfer.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TxHeader {
    pub cur_size: u8,
    pub total_size: u8,
    #[skip]
    unused: B12,
    pub order_cur_set: B4,
}

/// Receive acknowledgement sent back for each chunk.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RxHeader {
    #[skip]
    unused: B18,
    pub result_value: B2,
    pub rcv_data_size: u8,
    pub order_cur_set: B4,
}

/// Trailing checksum object.
#[bitfield(bytes = 4)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TxTailer {
    pub checksum: u16,
    #[skip]
    unused: u16,
}

macro_rules! impl_word_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<u32> for $ty {
                fn from(word: u32) -> Self {
                    <$ty>::from_bytes(word.to_le_bytes())
                }
            }

            impl From<$ty> for u32 {
                fn from(header: $ty) -> Self {
                    u32::from_le_bytes(header.into_bytes())
                }
            }
        )*
    };
}

impl_word_conversions!(VdmHeader, SecUvdmHeader, TxHeader, RxHeader, TxTailer);

/// Short (single inline byte) or long (chunked) payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum DataType {
    Short = 0,
    Long = 1,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Command type of the Samsung sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum CommandType {
    Initiator = 0,
    Ack = 1,
    Nak = 2,
    Busy = 3,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Transfer direction as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum Direction {
    /// Host to accessory
    Out = 0,
    /// Accessory to host
    In = 1,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Result code of an rx acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum RxResult {
    Ack = 0,
    Nak = 1,
    Busy = 2,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl SecUvdmHeader {
    pub fn data_kind(&self) -> DataType {
        DataType::from_primitive(self.data_type())
    }

    pub fn command(&self) -> CommandType {
        CommandType::from_primitive(self.cmd_type())
    }

    pub fn transfer_direction(&self) -> Direction {
        Direction::from_primitive(self.direction())
    }
}

impl RxHeader {
    pub fn result(&self) -> RxResult {
        RxResult::from_primitive(self.result_value())
    }
}
