/// Detection loop: frame acquisition, preprocessing and presence detection.
///
/// Each cycle waits for the frame-ready signal raised by the sensor
/// interrupt, pulls one frame from the FIFO, normalizes it and runs the
/// presence engine under the engine lock. Engine events are turned into
/// publish commands on the spot and pushed without waiting; a full publish
/// queue drops the event, since the next stable cycle re-asserts the state.
use embassy_futures::select::{select3, Either3};

use crate::board::{ADC_FULL_SCALE, SAMPLES_PER_FRAME, SAMPLES_PER_SUBFRAME};
use crate::configurator;
use crate::context::{PresenceContext, WaveformSource};
use crate::decode::FieldTokenizer;
use crate::engine::{Clock, FrameSource, PresenceEngine};
use crate::protocol::{PresenceEvent, PresenceState};

/// Result of one detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The engine ran. `queued` events reached the publish queue, `dropped`
    /// found it full.
    Processed { queued: u8, dropped: u8 },
    /// The FIFO read failed; nothing was processed.
    FrameUnavailable,
    /// The engine returned an error. Events it emitted before failing are
    /// still counted in the log but the cycle is reported as failed.
    ProcessingFailed,
}

/// Scale raw ADC samples into `[0, 1)`.
pub fn normalize(raw: &[u16], out: &mut [f32]) {
    for (dst, &src) in out.iter_mut().zip(raw) {
        *dst = src as f32 / ADC_FULL_SCALE;
    }
}

/// Mean across all sub-frames of `frame`, written to `out`. The sub-frame
/// length is `out.len()`; a trailing partial sub-frame is ignored.
pub fn average_subframes(frame: &[f32], out: &mut [f32]) {
    out.fill(0.0);
    if out.is_empty() {
        return;
    }
    let mut count = 0usize;
    for subframe in frame.chunks_exact(out.len()) {
        for (acc, &s) in out.iter_mut().zip(subframe) {
            *acc += s;
        }
        count += 1;
    }
    if count > 0 {
        let scale = 1.0 / count as f32;
        for acc in out.iter_mut() {
            *acc *= scale;
        }
    }
}

fn log_event(event: &PresenceEvent) {
    match event.state {
        PresenceState::MacroPresence => {
            log::info!("macro presence {} {}", event.range_bin, event.timestamp)
        }
        PresenceState::MicroPresence => {
            log::info!("micro presence {} {}", event.range_bin, event.timestamp)
        }
        PresenceState::Absence => log::info!("absence {}", event.timestamp),
    }
}

/// Owns the frame buffers and the FIFO. Never shared with other tasks.
pub struct DetectionLoop<F, C> {
    frames: F,
    clock: C,
    raw: [u16; SAMPLES_PER_FRAME],
    frame: [f32; SAMPLES_PER_FRAME],
    avg_chirp: [f32; SAMPLES_PER_SUBFRAME],
}

impl<F: FrameSource, C: Clock> DetectionLoop<F, C> {
    pub fn new(frames: F, clock: C) -> Self {
        Self {
            frames,
            clock,
            raw: [0; SAMPLES_PER_FRAME],
            frame: [0.0; SAMPLES_PER_FRAME],
            avg_chirp: [0.0; SAMPLES_PER_SUBFRAME],
        }
    }

    /// Wait for the next frame-ready notification, then process one frame.
    pub async fn run_cycle<E: PresenceEngine>(
        &mut self,
        ctx: &PresenceContext<E>,
    ) -> CycleOutcome {
        ctx.frame_ready.wait().await;
        self.process_frame(ctx).await
    }

    /// Acquire and process one frame without waiting for a notification.
    pub async fn process_frame<E: PresenceEngine>(
        &mut self,
        ctx: &PresenceContext<E>,
    ) -> CycleOutcome {
        if let Err(e) = self.frames.acquire_frame(&mut self.raw) {
            log::warn!("frame unavailable: {:?}", e);
            return CycleOutcome::FrameUnavailable;
        }

        normalize(&self.raw, &mut self.frame);

        let samples: &[f32] = match ctx.settings().waveform {
            WaveformSource::FullFrame => &self.frame,
            WaveformSource::AveragedChirp => {
                average_subframes(&self.frame, &mut self.avg_chirp);
                &self.avg_chirp
            }
        };

        let timestamp = self.clock.now_ms();
        let mut queued = 0u8;
        let mut dropped = 0u8;

        let result = {
            let mut engine = ctx.engine.lock().await;
            engine.process_frame(samples, timestamp, &mut |event| {
                log_event(&event);
                if ctx.try_publish(event.to_command()) {
                    queued = queued.saturating_add(1);
                } else {
                    log::warn!("publish queue full, presence event dropped");
                    dropped = dropped.saturating_add(1);
                }
            })
        };

        match result {
            Ok(()) => CycleOutcome::Processed { queued, dropped },
            Err(e) => {
                log::error!("Failed during frame processing: {:?}", e);
                CycleOutcome::ProcessingFailed
            }
        }
    }

    /// Process frames forever.
    pub async fn run<E: PresenceEngine>(&mut self, ctx: &PresenceContext<E>) {
        log::info!("Presence application running");
        loop {
            let outcome = self.run_cycle(ctx).await;
            log::debug!("detection cycle: {:?}", outcome);
        }
    }

    /// Run the detection loop with the configuration consumer as a dependent
    /// task. Returns once [`PresenceContext::dismantle`] is called; the
    /// consumer is dropped with it.
    ///
    /// The consumer runs at whatever priority polls this future. To give it
    /// [`priority::CONFIGURATION`](crate::board::priority::CONFIGURATION),
    /// spawn [`configurator::run`] on its own executor and call [`Self::run`]
    /// here instead.
    pub async fn run_with_configurator<E: PresenceEngine>(
        &mut self,
        ctx: &PresenceContext<E>,
        tokenizer: &dyn FieldTokenizer,
    ) {
        let outcome = select3(
            self.run(ctx),
            configurator::run(ctx, tokenizer),
            ctx.teardown.wait(),
        )
        .await;
        if let Either3::Third(()) = outcome {
            log::info!("detection dismantled, configuration consumer stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PipelineSettings, PUBLISH_QUEUE_LEN};
    use crate::decode::JsonTokenizer;
    use crate::protocol::{PublishCommand, PublisherCmd, Topic, STATUS_APPLIED};
    use crate::testing::{MockEngine, RampFrames, StepClock};
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::select::{select, Either};

    type Detector = DetectionLoop<RampFrames, StepClock>;

    fn detector() -> Detector {
        DetectionLoop::new(RampFrames::new(), StepClock::new())
    }

    fn context(settings: PipelineSettings) -> PresenceContext<MockEngine> {
        PresenceContext::new(MockEngine::new(), settings)
    }

    fn queue_event(ctx: &PresenceContext<MockEngine>, state: PresenceState, range_bin: i32) {
        let mut engine = block_on(ctx.engine.lock());
        engine
            .pending
            .push(PresenceEvent {
                state,
                range_bin,
                timestamp: 0,
            })
            .unwrap();
    }

    // ── Preprocessing ───────────────────────────────────────────────

    #[test]
    fn normalize_scales_by_adc_full_scale() {
        let raw = [0u16, 2048, 4095];
        let mut out = [1.0f32; 3];
        normalize(&raw, &mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.5);
        assert!(out[2] < 1.0);
    }

    #[test]
    fn average_subframes_is_mean_across_chirps() {
        let frame = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut out = [9.0f32; 2];
        average_subframes(&frame, &mut out);
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn average_subframes_ignores_trailing_partial() {
        let frame = [2.0f32, 4.0, 100.0];
        let mut out = [0.0f32; 2];
        average_subframes(&frame, &mut out);
        assert_eq!(out, [2.0, 4.0]);
    }

    // ── Cycles ──────────────────────────────────────────────────────

    #[test]
    fn full_frame_is_fed_by_default() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        ctx.notify_frame_ready();
        let outcome = block_on(det.run_cycle(&ctx));
        assert_eq!(outcome, CycleOutcome::Processed { queued: 0, dropped: 0 });

        let engine = block_on(ctx.engine.lock());
        assert_eq!(engine.frames, 1);
        assert_eq!(engine.last_len, SAMPLES_PER_FRAME);
        assert_eq!(engine.last_timestamp, 10);
    }

    #[test]
    fn averaged_chirp_is_fed_when_selected() {
        let settings = PipelineSettings {
            waveform: WaveformSource::AveragedChirp,
            ..PipelineSettings::new()
        };
        let ctx = context(settings);
        let mut det = detector();
        block_on(det.process_frame(&ctx));

        let engine = block_on(ctx.engine.lock());
        assert_eq!(engine.last_len, SAMPLES_PER_SUBFRAME);
        let expected = RampFrames::chirp_mean(0) / ADC_FULL_SCALE;
        assert!((engine.last_first_sample - expected).abs() < 1e-6);
    }

    #[test]
    fn unavailable_frame_skips_processing() {
        let ctx = context(PipelineSettings::new());
        let mut det = DetectionLoop::new(
            RampFrames {
                unavailable: true,
                calls: 0,
            },
            StepClock::new(),
        );
        queue_event(&ctx, PresenceState::MacroPresence, 3);
        assert_eq!(block_on(det.process_frame(&ctx)), CycleOutcome::FrameUnavailable);

        let engine = block_on(ctx.engine.lock());
        assert_eq!(engine.frames, 0);
        assert_eq!(engine.pending.len(), 1);
        assert!(ctx.publish_queue.is_empty());
    }

    #[test]
    fn macro_transition_publishes_one_event() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        queue_event(&ctx, PresenceState::MacroPresence, 3);

        let outcome = block_on(det.process_frame(&ctx));
        assert_eq!(outcome, CycleOutcome::Processed { queued: 1, dropped: 0 });

        let cmd = ctx.publish_queue.try_receive().unwrap();
        assert_eq!(cmd.cmd, PublisherCmd::Publish);
        assert_eq!(cmd.topic, Topic::Events);
        assert_eq!(cmd.payload_str(), "{\"PRESENCE\": \"IN macro\"}");
        assert!(ctx.publish_queue.is_empty());
    }

    #[test]
    fn full_publish_queue_drops_event_and_continues() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        for _ in 0..PUBLISH_QUEUE_LEN {
            assert!(ctx.try_publish(PublishCommand::init()));
        }
        queue_event(&ctx, PresenceState::Absence, 0);

        let outcome = block_on(det.process_frame(&ctx));
        assert_eq!(outcome, CycleOutcome::Processed { queued: 0, dropped: 1 });
        assert_eq!(ctx.publish_queue.len(), PUBLISH_QUEUE_LEN);

        // Next cycle proceeds normally once space frees up.
        let _ = ctx.publish_queue.try_receive();
        queue_event(&ctx, PresenceState::MicroPresence, 2);
        let outcome = block_on(det.process_frame(&ctx));
        assert_eq!(outcome, CycleOutcome::Processed { queued: 1, dropped: 0 });
    }

    #[test]
    fn processing_error_does_not_stop_the_loop() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        block_on(ctx.engine.lock()).fail_process = true;
        assert_eq!(block_on(det.process_frame(&ctx)), CycleOutcome::ProcessingFailed);

        block_on(ctx.engine.lock()).fail_process = false;
        ctx.notify_frame_ready();
        assert!(matches!(
            block_on(det.run_cycle(&ctx)),
            CycleOutcome::Processed { .. }
        ));
        assert_eq!(block_on(ctx.engine.lock()).frames, 2);
    }

    #[test]
    fn pending_notification_is_consumed_once() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        ctx.notify_frame_ready();
        ctx.notify_frame_ready();
        block_on(det.run_cycle(&ctx));

        let second = block_on(select(det.run_cycle(&ctx), async {}));
        assert!(matches!(second, Either::Second(())));
        assert_eq!(block_on(ctx.engine.lock()).frames, 1);
    }

    #[test]
    fn cycle_waits_while_engine_is_locked() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        block_on(async {
            let _guard = ctx.engine.lock().await;
            let outcome = select(det.process_frame(&ctx), async {}).await;
            assert!(matches!(outcome, Either::Second(())));
        });
    }

    // ── Dependent configuration consumer ────────────────────────────

    #[test]
    fn dismantle_stops_detection_and_consumer() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        ctx.dismantle();
        block_on(det.run_with_configurator(&ctx, &JsonTokenizer));
        assert_eq!(block_on(ctx.engine.lock()).frames, 0);
    }

    #[test]
    fn consumer_can_run_as_its_own_task() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        let tasks = join(det.run(&ctx), configurator::run(&ctx, &JsonTokenizer));
        let driver = async {
            ctx.notify_frame_ready();
            ctx.submit_config(r#"{"mode":"macro_only"}"#).await.unwrap();
            ctx.publish_queue.receive().await
        };
        match block_on(select(tasks, driver)) {
            Either::Second(status) => assert_eq!(status.payload_str(), STATUS_APPLIED),
            Either::First(_) => unreachable!("tasks never return"),
        }

        let engine = block_on(ctx.engine.lock());
        assert_eq!(engine.config.mode, crate::config::PresenceMode::MacroOnly);
        assert_eq!(engine.frames, 1);
    }

    #[test]
    fn consumer_runs_alongside_detection_until_dismantled() {
        let ctx = context(PipelineSettings::new());
        let mut det = detector();
        block_on(join(det.run_with_configurator(&ctx, &JsonTokenizer), async {
            ctx.notify_frame_ready();
            ctx.submit_config(r#"{"macro_threshold":"1.5","mode":"micro_only"}"#)
                .await
                .unwrap();
            let status = ctx.publish_queue.receive().await;
            assert_eq!(status.payload_str(), STATUS_APPLIED);
            ctx.notify_frame_ready();
            ctx.dismantle();
        }));

        let engine = block_on(ctx.engine.lock());
        assert_eq!(engine.config.macro_threshold, 1.5);
        assert_eq!(engine.resets, 1);
        // Every frame saw either the old or the new configuration as a whole.
        for &(threshold, mode) in engine.observed.iter() {
            let old = threshold == 0.5 && mode == crate::config::PresenceMode::MicroIfMacro;
            let new = threshold == 1.5 && mode == crate::config::PresenceMode::MicroOnly;
            assert!(old || new, "torn configuration observed: {threshold} {mode:?}");
        }
    }
}
