/// Publisher task: drains the publish queue into the broker transport.
///
/// One attempt per command. A failed publish is reported to the MQTT
/// client task, which owns reconnect and retry policy.
use crate::context::{PipelineSettings, PresenceContext};
use crate::engine::{OutboundMessage, Transport};
use crate::protocol::{PublishCommand, PublisherCmd, Topic};

/// Static per-topic publish parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicDescriptor {
    pub topic: &'static str,
    pub qos: u8,
    pub retain: bool,
    pub dup: bool,
}

/// What the publisher did with one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// INIT or DEINIT; logged only.
    Lifecycle,
    Published,
    /// The transport refused the message and the failure was reported.
    Failed,
}

pub struct Publisher<T> {
    transport: T,
    descriptors: [TopicDescriptor; Topic::COUNT],
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, settings: &PipelineSettings) -> Self {
        let descriptor = |topic| TopicDescriptor {
            topic,
            qos: settings.qos,
            retain: false,
            dup: false,
        };
        // Indexed by `Topic::index()`.
        Self {
            transport,
            descriptors: [
                descriptor(settings.status_topic),
                descriptor(settings.events_topic),
            ],
        }
    }

    pub fn descriptor(&self, topic: Topic) -> &TopicDescriptor {
        &self.descriptors[topic.index()]
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle one command taken off the publish queue.
    pub async fn dispatch<E>(
        &mut self,
        ctx: &PresenceContext<E>,
        command: &PublishCommand,
    ) -> Dispatch {
        match command.cmd {
            PublisherCmd::Init => {
                log::info!("Publisher: init event occurred");
                Dispatch::Lifecycle
            }
            PublisherCmd::Deinit => {
                log::info!("Publisher: deinit event occurred");
                Dispatch::Lifecycle
            }
            PublisherCmd::Publish => {
                let descriptor = self.descriptors[command.topic.index()];
                let message = OutboundMessage {
                    topic: descriptor.topic,
                    payload: &command.payload,
                    qos: descriptor.qos,
                    retain: descriptor.retain,
                    dup: descriptor.dup,
                };

                log::info!(
                    "Publisher: Publishing '{}' on the topic '{}'",
                    command.payload_str(),
                    descriptor.topic
                );

                match self.transport.publish(&message).await {
                    Ok(()) => Dispatch::Published,
                    Err(e) => {
                        log::error!("Publisher: MQTT Publish failed with error {:?}", e);
                        ctx.report_publish_failure().await;
                        Dispatch::Failed
                    }
                }
            }
        }
    }

    /// Drain the publish queue forever.
    pub async fn run<E>(&mut self, ctx: &PresenceContext<E>) {
        log::info!("Publisher task started");
        loop {
            let command = ctx.publish_queue.receive().await;
            self.dispatch(ctx, &command).await;
        }
    }
}
