// Protocol constants for Samsung UVDM over USB-PD

/// USB-IF vendor id assigned to Samsung
pub const SAMSUNG_VENDOR_ID: u16 = 0x04E8;

/// `vendor_defined` field value marking a Samsung unstructured VDM
pub const SEC_UVDM_UNSTRUCTURED_VDM: u16 = 0x0000;

/// PD data message type for Vendor_Defined
pub const USBPD_VENDOR_DEFINED: u8 = 0x0F;

/// Port data role written into outgoing message headers (DFP)
pub const USBPD_DFP: u8 = 1;

/// Largest payload the host side accepts for one transfer
pub const MAX_INPUT_DATA: usize = 255;

/// Block width of the endian flip (4 bytes)
pub const SEC_UVDM_ALIGN: usize = 4;

/// Payload bytes carried by the first chunk of a long transfer
pub const SEC_UVDM_MAXDATA_FIRST: usize = 12;

/// Payload bytes carried by every later chunk
pub const SEC_UVDM_MAXDATA_NORMAL: usize = 16;

/// Length of the checksum window
pub const SEC_UVDM_CHECKSUM_COUNT: usize = 20;

/// Offset of the checksum window into the data-object image
pub const SEC_UVDM_CHECKSUM_OFFSET: usize = 4;

/// Default wait for each chunk handshake, in milliseconds
pub const SEC_UVDM_WAIT_MS: u64 = 5000;

/// Number of data objects in a full UVDM message (VDM header + 6 VDOs)
pub const USBPD_MAX_COUNT_MSG_OBJECT: usize = 7;

/// Size of the PD message header on the wire (2 bytes)
pub const MSG_HEADER_SIZE: usize = 2;

/// Size of one data object (4 bytes)
pub const DATA_OBJECT_SIZE: usize = 4;

/// Data objects used by short messages, requests and rx acknowledgements
pub const SHORT_MSG_OBJECTS: u8 = 2;

/// Largest value of the 4-bit set counter / sequence field
pub const MAX_UVDM_SETS: usize = 15;

/// Default Samsung accessory product id
pub const DEFAULT_PRODUCT_ID: u16 = 0xA500;

/// Default depth of each per-transfer channel
pub const DEFAULT_CHANNEL_DEPTH: usize = 4;

// Word indices inside the data-object array
pub(crate) const OBJ_VDM_HEADER: usize = 0;
pub(crate) const OBJ_SEC_HEADER: usize = 1;
pub(crate) const OBJ_FIRST_TX_HEADER: usize = 2;
pub(crate) const OBJ_FIRST_DATA: usize = 3;
pub(crate) const OBJ_NEXT_TX_HEADER: usize = 1;
pub(crate) const OBJ_NEXT_DATA: usize = 2;
pub(crate) const OBJ_TAILER: usize = 6;
