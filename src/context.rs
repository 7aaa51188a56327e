/// Shared state for the pipeline tasks.
///
/// One [`PresenceContext`] is built at startup (typically in a `static` or a
/// `StaticCell`) and every task entry point borrows it. It owns:
///
/// - the **engine lock**: the presence engine and its live configuration
/// - the **payload lock**: the inbound configuration text buffer and whether
///   it still holds a payload the consumer has not taken
/// - the frame-ready wake signal raised from the sensor interrupt
/// - the configuration, publish and MQTT-lifecycle queues
///
/// Lock order is payload → engine. The detection loop only ever takes the
/// engine lock; the configuration consumer takes both, always in that order.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::config::PresenceConfig;
use crate::engine::PresenceEngine;
use crate::error::SubmitError;
use crate::protocol::{MqttTaskCmd, PublishCommand};

/// Publish queue depth. Small on purpose: presence events are best effort.
pub const PUBLISH_QUEUE_LEN: usize = 3;
/// At most one payload is pending in the shared buffer, so one notice slot.
pub const CONFIG_QUEUE_LEN: usize = 1;
pub const LIFECYCLE_QUEUE_LEN: usize = 4;

/// Capacity of the shared inbound configuration buffer in bytes.
pub const MAX_CONFIG_PAYLOAD: usize = 256;

pub type PayloadBuffer = heapless::String<MAX_CONFIG_PAYLOAD>;

pub type PublishChannel = Channel<CriticalSectionRawMutex, PublishCommand, PUBLISH_QUEUE_LEN>;
pub type ConfigChannel = Channel<CriticalSectionRawMutex, PayloadReady, CONFIG_QUEUE_LEN>;
pub type LifecycleChannel = Channel<CriticalSectionRawMutex, MqttTaskCmd, LIFECYCLE_QUEUE_LEN>;
pub type LifecycleReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, MqttTaskCmd, LIFECYCLE_QUEUE_LEN>;

/// Queued by the router after it has written the shared payload buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadReady;

/// The shared inbound buffer. `pending` is set by the router when it writes
/// `text` and cleared by the consumer once the payload is decoded and
/// applied; the router never overwrites a pending payload.
#[derive(Debug)]
pub struct PayloadSlot {
    pub(crate) text: PayloadBuffer,
    pub(crate) pending: bool,
}

impl PayloadSlot {
    const fn new() -> Self {
        Self {
            text: PayloadBuffer::new(),
            pending: false,
        }
    }
}

/// Which waveform the detection loop hands to `process_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformSource {
    /// Every normalized sample of the frame, all chirps.
    FullFrame,
    /// One chirp: the mean across all chirps of the frame.
    AveragedChirp,
}

/// What a producer does when its consumer has not caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait for space.
    Block,
    /// Fail immediately and let the producer report it.
    Reject,
}

/// Runtime knobs for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub waveform: WaveformSource,
    /// Router, while the previous payload is still pending.
    pub config_queue: Backpressure,
    /// Publisher → MQTT client task.
    pub lifecycle_queue: Backpressure,
    pub status_topic: &'static str,
    pub events_topic: &'static str,
    pub qos: u8,
}

impl PipelineSettings {
    pub const fn new() -> Self {
        Self {
            waveform: WaveformSource::FullFrame,
            config_queue: Backpressure::Block,
            lifecycle_queue: Backpressure::Block,
            status_topic: "presence/status",
            events_topic: "presence/events",
            qos: 1,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Arena for every lock, queue and signal the tasks share.
pub struct PresenceContext<E> {
    pub(crate) engine: Mutex<CriticalSectionRawMutex, E>,
    pub(crate) payload: Mutex<CriticalSectionRawMutex, PayloadSlot>,
    pub(crate) payload_taken: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) frame_ready: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) teardown: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) config_queue: ConfigChannel,
    pub(crate) publish_queue: PublishChannel,
    pub(crate) lifecycle_queue: LifecycleChannel,
    settings: PipelineSettings,
}

impl<E> PresenceContext<E> {
    pub const fn new(engine: E, settings: PipelineSettings) -> Self {
        Self {
            engine: Mutex::new(engine),
            payload: Mutex::new(PayloadSlot::new()),
            payload_taken: Signal::new(),
            frame_ready: Signal::new(),
            teardown: Signal::new(),
            config_queue: Channel::new(),
            publish_queue: Channel::new(),
            lifecycle_queue: Channel::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Wake the detection loop. Interrupt-safe: never blocks, never
    /// allocates, copies no data. Repeated calls before the loop wakes
    /// collapse into one pending wake-up.
    pub fn notify_frame_ready(&self) {
        self.frame_ready.signal(());
    }

    /// Hand a configuration payload to the consumer.
    ///
    /// The buffer is written only once the consumer has finished with the
    /// previous payload. Until then the call waits or, under
    /// [`Backpressure::Reject`], fails with [`SubmitError::QueueFull`].
    pub async fn submit_config(&self, payload: &str) -> Result<(), SubmitError> {
        if payload.len() > MAX_CONFIG_PAYLOAD {
            log::warn!("configuration payload of {} bytes dropped", payload.len());
            return Err(SubmitError::PayloadTooLarge(payload.len()));
        }

        loop {
            {
                let mut slot = self.payload.lock().await;
                if !slot.pending {
                    slot.text.clear();
                    // Length checked above.
                    let _ = slot.text.push_str(payload);
                    slot.pending = true;
                    break;
                }
            }
            match self.settings.config_queue {
                Backpressure::Block => self.payload_taken.wait().await,
                Backpressure::Reject => {
                    log::warn!("previous configuration still pending, payload not delivered");
                    return Err(SubmitError::QueueFull);
                }
            }
        }

        // Only one payload is ever pending, so the notice always has room.
        self.config_queue.send(PayloadReady).await;
        Ok(())
    }

    /// Queue the publisher's INIT hook.
    pub async fn publisher_init(&self) {
        self.publish_queue.send(PublishCommand::init()).await;
    }

    /// Queue the publisher's DEINIT hook.
    pub async fn publisher_deinit(&self) {
        self.publish_queue.send(PublishCommand::deinit()).await;
    }

    /// Receiver for the MQTT client task.
    pub fn lifecycle_events(&self) -> LifecycleReceiver<'_> {
        self.lifecycle_queue.receiver()
    }

    /// Stop the configuration consumer that the detection loop raised.
    pub fn dismantle(&self) {
        self.teardown.signal(());
    }

    /// Mark the pending payload as consumed and wake a waiting router.
    pub(crate) fn release_payload(&self, slot: &mut PayloadSlot) {
        slot.pending = false;
        self.payload_taken.signal(());
    }

    /// Best-effort enqueue for presence events. Returns `false` if the
    /// publish queue was full and the command was dropped.
    pub(crate) fn try_publish(&self, command: PublishCommand) -> bool {
        self.publish_queue.try_send(command).is_ok()
    }

    /// Must-deliver enqueue for status replies; waits for space.
    pub(crate) async fn publish_status(&self, command: PublishCommand) {
        self.publish_queue.send(command).await;
    }

    /// Tell the MQTT client task that a publish failed.
    pub(crate) async fn report_publish_failure(&self) {
        let cmd = MqttTaskCmd::HandlePublishFailure;
        match self.settings.lifecycle_queue {
            Backpressure::Block => self.lifecycle_queue.send(cmd).await,
            Backpressure::Reject => {
                if self.lifecycle_queue.try_send(cmd).is_err() {
                    log::error!("MQTT task queue full, publish failure not reported");
                }
            }
        }
    }
}

impl<E: PresenceEngine> PresenceContext<E> {
    /// Copy of the live configuration, read under the engine lock.
    pub async fn live_config(&self) -> Result<PresenceConfig, E::Error> {
        self.engine.lock().await.config()
    }
}
