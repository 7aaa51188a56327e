/// Message shapes exchanged between the pipeline tasks and the broker.
///
/// Outbound payloads are fixed literals reproduced byte-for-byte; the
/// broker-side consumers match on them verbatim. Uses `heapless` types for
/// no_std/no-alloc operation.
use heapless::Vec;

/// Maximum length of one publish payload (two 128-byte MQTT frames).
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Payload carried by value inside a [`PublishCommand`].
pub type PayloadBytes = Vec<u8, MAX_PAYLOAD_LEN>;

// ── Outbound literals ────────────────────────────────────────────────

pub const EVENT_MACRO_PRESENCE: &str = r#"{"PRESENCE": "IN macro"}"#;
pub const EVENT_MICRO_PRESENCE: &str = r#"{"PRESENCE": "IN micro"}"#;
pub const EVENT_ABSENCE: &str = r#"{"PRESENCE": "OUT"}"#;

pub const STATUS_INVALID_JSON: &str = r#"{"json parser error: invalid json message!"}"#;
pub const STATUS_INVALID_FIELD: &str =
    r#"{"error in configuration parameter name or invalid value/range!"}"#;
pub const STATUS_APPLY_FAILED: &str = r#"{"presence configuration could not be updated"}"#;
pub const STATUS_APPLIED: &str = r#"{"presence configuration updated and application resumed"}"#;

/// What the publisher task should do with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherCmd {
    Init,
    Deinit,
    Publish,
}

/// Outbound topics. The discriminant indexes the publisher's descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Status = 0,
    Events = 1,
}

impl Topic {
    pub const COUNT: usize = 2;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Command placed on the publish queue. Copied in, so the producer may
/// reuse its own buffers as soon as the enqueue returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCommand {
    pub cmd: PublisherCmd,
    pub topic: Topic,
    pub payload: PayloadBytes,
}

impl PublishCommand {
    /// Build a publish command. Payloads longer than [`MAX_PAYLOAD_LEN`]
    /// are truncated.
    pub fn publish(topic: Topic, payload: &str) -> Self {
        let bytes = payload.as_bytes();
        let len = bytes.len().min(MAX_PAYLOAD_LEN);
        let mut buf = PayloadBytes::new();
        let _ = buf.extend_from_slice(&bytes[..len]);
        Self {
            cmd: PublisherCmd::Publish,
            topic,
            payload: buf,
        }
    }

    pub fn init() -> Self {
        Self {
            cmd: PublisherCmd::Init,
            topic: Topic::Status,
            payload: PayloadBytes::new(),
        }
    }

    pub fn deinit() -> Self {
        Self {
            cmd: PublisherCmd::Deinit,
            topic: Topic::Status,
            payload: PayloadBytes::new(),
        }
    }

    /// Payload as text, or `""` if it is not UTF-8.
    pub fn payload_str(&self) -> &str {
        core::str::from_utf8(&self.payload).unwrap_or("")
    }
}

/// Detection state reported by the presence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Absence,
    MacroPresence,
    MicroPresence,
}

impl PresenceState {
    /// Literal published on the events topic for this state.
    pub fn payload(&self) -> &'static str {
        match self {
            PresenceState::Absence => EVENT_ABSENCE,
            PresenceState::MacroPresence => EVENT_MACRO_PRESENCE,
            PresenceState::MicroPresence => EVENT_MICRO_PRESENCE,
        }
    }
}

/// A state transition emitted by the engine during `process_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    pub state: PresenceState,
    pub range_bin: i32,
    /// Milliseconds since boot when the frame was processed.
    pub timestamp: u32,
}

impl PresenceEvent {
    pub fn to_command(&self) -> PublishCommand {
        PublishCommand::publish(Topic::Events, self.state.payload())
    }
}

/// Notifications for the MQTT client task, which owns reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttTaskCmd {
    HandlePublishFailure,
}
