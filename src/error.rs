/// Error types for the coordination core.
///
/// Every failure is reported by value; nothing here unwinds.
use thiserror::Error;

/// Why a single configuration field was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FieldFault {
    #[error("unknown parameter name")]
    UnknownName,
    #[error("value is not a number")]
    NotANumber,
    #[error("value out of range")]
    OutOfRange,
    #[error("value is not an accepted token")]
    BadToken,
    #[error("engine reported a non-positive bin length")]
    BinLength,
}

/// A rejected field. `field` is `None` when the name itself was unknown.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{}: {fault}", .field.unwrap_or("<unknown>"))]
pub struct FieldError {
    pub field: Option<&'static str>,
    pub fault: FieldFault,
}

/// The payload could not be split into fields.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("malformed json")]
    Malformed,
}

/// Outcome of one rejected configuration payload. Each variant maps to
/// exactly one status reply.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid json message")]
    InvalidJson,
    #[error("invalid field {0}")]
    InvalidField(FieldError),
    #[error("could not read current presence configuration")]
    Snapshot,
    #[error("presence configuration could not be updated")]
    Apply,
}

/// The router could not hand a payload to the configuration consumer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("payload of {0} bytes exceeds the shared buffer")]
    PayloadTooLarge(usize),
    #[error("configuration queue is full")]
    QueueFull,
}
