//! Error implementations

use serde::{de, ser};

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ForyError>;

/// Every failure a serialize or deserialize call can report.
///
/// Errors are local to the message being processed. Session registries
/// are discarded with the failed call, shared registries are never touched.
#[derive(Debug, thiserror::Error)]
pub enum ForyError {
    /// Header or framing does not match the local configuration.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A character has no code in the selected meta-string alphabet.
    #[error("character {ch:?} cannot be encoded with {encoding}")]
    UnsupportedCharacter { ch: char, encoding: &'static str },

    /// Encoding flag that no decoder understands.
    #[error("unsupported meta-string encoding flag {0}")]
    UnsupportedEncoding(u8),

    /// Value does not fit the codec's bit budget on encode.
    #[error("value {value} exceeds the {bits}-bit range")]
    Range { value: u64, bits: u32 },

    /// Encoded integer runs past the codec's byte budget on decode.
    #[error("varint overflows {bits} bits")]
    Overflow { bits: u32 },

    /// The runtime type has no type specification.
    #[error("type `{0}` is not registered")]
    UnregisteredType(String),

    #[error("unexpected end of input: needed {needed} more byte(s)")]
    UnexpectedEof { needed: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Null written to, or read for, a non-nullable position.
    #[error("null value for non-nullable `{0}`")]
    NullValue(String),

    /// Serde visited a field out of descriptor order or not at all.
    #[error("field mismatch: expected `{expected}`, found `{found}`")]
    FieldMismatch { expected: String, found: String },

    /// Schema blob fingerprint disagrees with its body.
    #[error("type meta hash mismatch: header {expected:#x}, computed {actual:#x}")]
    MetaHashMismatch { expected: u64, actual: u64 },

    #[error("nesting depth exceeds the configured maximum of {0}")]
    DepthExceeded(usize),

    /// Wire feature outside what this engine decodes.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid string payload: {0}")]
    InvalidString(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Custom error raised by a serde impl.
    #[error("{0}")]
    Message(String),
}

impl ForyError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub(crate) fn mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl ser::Error for ForyError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Message(msg.to_string())
    }
}

impl de::Error for ForyError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self::Message(msg.to_string())
    }
}
