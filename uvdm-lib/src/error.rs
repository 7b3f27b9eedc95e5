use std::array::TryFromSliceError;
use std::io;
use thiserror::Error;

/// The primary error type for the `uvdm-lib` library.
#[derive(Error, Debug)]
pub enum UvdmError {
    #[error("No PD policy engine bound to the UVDM manager")]
    NoDevice,

    #[error("Timeout waiting for UVDM handshake: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("UVDM transfer aborted: device closed")]
    Closed,

    #[error("Payload of {actual} bytes exceeds the {max} byte limit")]
    Capacity { max: usize, actual: usize },

    #[error("Payload needs {sets} UVDM sets, the set counter holds at most {max}")]
    TooManySets { sets: usize, max: usize },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Policy engine error: {0}")]
    Engine(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl UvdmError {
    /// Negative kernel status code for this error, as returned by the
    /// ioctl-facing entry points.
    pub fn errno(&self) -> i32 {
        const EIO: i32 = 5;
        const ENXIO: i32 = 6;
        const EINVAL: i32 = 22;
        const EPIPE: i32 = 32;
        const ETIME: i32 = 62;
        const EMSGSIZE: i32 = 90;

        match self {
            UvdmError::NoDevice => -ENXIO,
            UvdmError::Timeout(_) => -ETIME,
            UvdmError::Closed => -EPIPE,
            UvdmError::Capacity { .. } | UvdmError::TooManySets { .. } => -EMSGSIZE,
            UvdmError::InvalidMessage(_)
            | UvdmError::InsufficientData { .. }
            | UvdmError::Config(_)
            | UvdmError::InvalidConfig(_) => -EINVAL,
            UvdmError::Engine(_) | UvdmError::Io(_) => -EIO,
        }
    }
}

impl From<TryFromSliceError> for UvdmError {
    fn from(_: TryFromSliceError) -> Self {
        UvdmError::InvalidMessage("Failed to convert slice to array".to_string())
    }
}
