//! Host-side stand-ins for the external capabilities.

use core::cell::Cell;

use heapless::Vec;

use crate::board::{CHIRPS_PER_FRAME, SAMPLES_PER_SUBFRAME};
use crate::config::{PresenceConfig, PresenceMode};
use crate::engine::{Clock, FrameSource, OutboundMessage, PresenceEngine, Transport};
use crate::protocol::{PayloadBytes, PresenceEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Presence engine that records every call and replays queued events.
pub struct MockEngine {
    pub config: PresenceConfig,
    pub bin_length: f32,
    pub resets: u32,
    pub set_calls: u32,
    pub frames: u32,
    pub last_len: usize,
    pub last_first_sample: f32,
    pub last_timestamp: u32,
    /// Emitted on the next `process_frame`, then cleared.
    pub pending: Vec<PresenceEvent, 8>,
    /// `(macro_threshold, mode)` as seen by each `process_frame`.
    pub observed: Vec<(f32, PresenceMode), 16>,
    pub fail_config: bool,
    pub fail_set: bool,
    pub fail_process: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            config: PresenceConfig::new(),
            bin_length: 0.5,
            resets: 0,
            set_calls: 0,
            frames: 0,
            last_len: 0,
            last_first_sample: 0.0,
            last_timestamp: 0,
            pending: Vec::new(),
            observed: Vec::new(),
            fail_config: false,
            fail_set: false,
            fail_process: false,
        }
    }
}

impl PresenceEngine for MockEngine {
    type Error = MockError;

    fn config(&self) -> Result<PresenceConfig, MockError> {
        if self.fail_config {
            return Err(MockError);
        }
        Ok(self.config)
    }

    fn set_config(&mut self, config: &PresenceConfig) -> Result<(), MockError> {
        self.set_calls += 1;
        if self.fail_set {
            return Err(MockError);
        }
        self.config = *config;
        Ok(())
    }

    fn bin_length(&self) -> f32 {
        self.bin_length
    }

    fn reset(&mut self) {
        self.resets += 1;
    }

    fn process_frame(
        &mut self,
        samples: &[f32],
        timestamp_ms: u32,
        on_event: &mut dyn FnMut(PresenceEvent),
    ) -> Result<(), MockError> {
        self.frames += 1;
        self.last_len = samples.len();
        self.last_first_sample = samples.first().copied().unwrap_or(0.0);
        self.last_timestamp = timestamp_ms;
        let _ = self.observed.push((self.config.macro_threshold, self.config.mode));
        for event in self.pending.iter() {
            on_event(*event);
        }
        self.pending.clear();
        if self.fail_process {
            return Err(MockError);
        }
        Ok(())
    }
}

/// Frame source producing a fixed ramp: sample `s` of chirp `c` reads
/// `c * 100 + s % 8`.
pub struct RampFrames {
    pub unavailable: bool,
    pub calls: u32,
}

impl RampFrames {
    pub fn new() -> Self {
        Self {
            unavailable: false,
            calls: 0,
        }
    }

    /// Raw value at `index` in the frame.
    pub fn sample(index: usize) -> u16 {
        let chirp = index / SAMPLES_PER_SUBFRAME;
        (chirp * 100 + (index % SAMPLES_PER_SUBFRAME) % 8) as u16
    }

    /// Mean over all chirps of sample `s`, before normalization.
    pub fn chirp_mean(s: usize) -> f32 {
        let sum: usize = (0..CHIRPS_PER_FRAME).map(|c| c * 100 + s % 8).sum();
        sum as f32 / CHIRPS_PER_FRAME as f32
    }
}

impl FrameSource for RampFrames {
    type Error = MockError;

    fn acquire_frame(&mut self, buf: &mut [u16]) -> Result<(), MockError> {
        self.calls += 1;
        if self.unavailable {
            return Err(MockError);
        }
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Self::sample(i);
        }
        Ok(())
    }
}

/// Clock that advances 10 ms on every read.
pub struct StepClock(pub Cell<u32>);

impl StepClock {
    pub fn new() -> Self {
        Self(Cell::new(0))
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u32 {
        let now = self.0.get() + 10;
        self.0.set(now);
        now
    }
}

/// A message captured by [`RecordingTransport`].
pub struct Sent {
    pub topic: heapless::String<32>,
    pub payload: PayloadBytes,
    pub qos: u8,
}

pub struct RecordingTransport {
    pub sent: Vec<Sent, 8>,
    pub attempts: u32,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            attempts: 0,
            fail: false,
        }
    }
}

impl Transport for RecordingTransport {
    type Error = MockError;

    async fn publish(&mut self, message: &OutboundMessage<'_>) -> Result<(), MockError> {
        self.attempts += 1;
        if self.fail {
            return Err(MockError);
        }
        let mut topic = heapless::String::new();
        let _ = topic.push_str(message.topic);
        let mut payload = PayloadBytes::new();
        let _ = payload.extend_from_slice(message.payload);
        let _ = self.sent.push(Sent {
            topic,
            payload,
            qos: message.qos,
        });
        Ok(())
    }
}
