use crate::constants::MAX_INPUT_DATA;
use crate::error::UvdmError;
use bytes::Bytes;
use std::fmt;
use std::ops::Deref;

/// Opaque transfer payload of at most [`MAX_INPUT_DATA`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UvdmPayload(Bytes);

impl UvdmPayload {
    /// Wrap `data`, rejecting anything longer than [`MAX_INPUT_DATA`].
    pub fn new(data: impl Into<Bytes>) -> Result<Self, UvdmError> {
        let data = data.into();
        if data.len() > MAX_INPUT_DATA {
            return Err(UvdmError::Capacity {
                max: MAX_INPUT_DATA,
                actual: data.len(),
            });
        }
        Ok(Self(data))
    }

    /// Parse a hex string (whitespace and `:` separators allowed).
    pub fn from_hex(text: &str) -> Result<Self, UvdmError> {
        let clean: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
        let data = hex::decode(clean).map_err(|e| UvdmError::InvalidMessage(format!("bad hex payload: {e}")))?;
        Self::new(data)
    }

    /// Single-byte or empty payloads go out as one short message.
    pub fn is_short(&self) -> bool {
        self.0.len() <= 1
    }

    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl Deref for UvdmPayload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for UvdmPayload {
    type Error = UvdmError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::new(Bytes::copy_from_slice(data))
    }
}

impl TryFrom<Vec<u8>> for UvdmPayload {
    type Error = UvdmError;

    fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl From<UvdmPayload> for Bytes {
    fn from(payload: UvdmPayload) -> Self {
        payload.0
    }
}

impl fmt::Display for UvdmPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}
