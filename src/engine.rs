/// Capabilities the coordination core drives but does not implement.
///
/// The firmware binary supplies concrete types: the presence algorithm
/// library, the radar FIFO driver, the MQTT client and a tick source.
use core::fmt::Debug;

use crate::config::PresenceConfig;
use crate::protocol::PresenceEvent;

/// The presence-detection algorithm and its internal temporal state.
///
/// Always accessed through the engine lock in
/// [`PresenceContext`](crate::context::PresenceContext).
pub trait PresenceEngine {
    type Error: Debug;

    /// Current configuration.
    fn config(&self) -> Result<PresenceConfig, Self::Error>;

    /// Replace the configuration as a whole.
    fn set_config(&mut self, config: &PresenceConfig) -> Result<(), Self::Error>;

    /// Physical length of one range bin in meters.
    fn bin_length(&self) -> f32;

    /// Clear accumulated history so a new configuration starts clean.
    fn reset(&mut self);

    /// Run detection over one waveform. State transitions are reported
    /// synchronously through `on_event` before this returns.
    fn process_frame(
        &mut self,
        samples: &[f32],
        timestamp_ms: u32,
        on_event: &mut dyn FnMut(PresenceEvent),
    ) -> Result<(), Self::Error>;
}

/// Radar FIFO access. Owned by the detection loop.
pub trait FrameSource {
    type Error: Debug;

    /// Fill `buf` with one complete frame of raw ADC samples.
    fn acquire_frame(&mut self, buf: &mut [u16]) -> Result<(), Self::Error>;
}

/// One outbound message as handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundMessage<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: u8,
    pub retain: bool,
    pub dup: bool,
}

/// Broker client used by the publisher task.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: Debug;

    /// Single delivery attempt. Retries belong to the MQTT client task.
    async fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), Self::Error>;
}

/// Monotonic millisecond tick source used to timestamp frames.
pub trait Clock {
    fn now_ms(&self) -> u32;
}
