/// Configuration consumer: applies remote configuration payloads.
///
/// For each notice on the configuration queue the consumer holds the
/// payload lock for the whole decode + apply, then hands the buffer back to
/// the router. Fields are decoded into a snapshot of the engine
/// configuration; only a fully valid snapshot is committed, followed by an
/// engine reset. Exactly one status reply is queued per payload, waiting for
/// publish-queue space if needed.
use crate::context::PresenceContext;
use crate::decode::{decode_into, FieldTokenizer};
use crate::engine::PresenceEngine;
use crate::error::ConfigError;
use crate::protocol::{
    PublishCommand, Topic, STATUS_APPLIED, STATUS_APPLY_FAILED, STATUS_INVALID_FIELD,
    STATUS_INVALID_JSON,
};

/// Status literal reported for a payload outcome.
pub fn status_message(outcome: &Result<(), ConfigError>) -> &'static str {
    match outcome {
        Ok(()) => STATUS_APPLIED,
        Err(ConfigError::InvalidJson) => STATUS_INVALID_JSON,
        Err(ConfigError::InvalidField(_)) => STATUS_INVALID_FIELD,
        Err(ConfigError::Snapshot | ConfigError::Apply) => STATUS_APPLY_FAILED,
    }
}

/// Decode the shared payload buffer and, if every field is valid, commit it.
///
/// The payload is released back to the router on every path, while the
/// payload lock is still held.
pub async fn apply_pending<E: PresenceEngine>(
    ctx: &PresenceContext<E>,
    tokenizer: &dyn FieldTokenizer,
) -> Result<(), ConfigError> {
    let mut slot = ctx.payload.lock().await;
    let outcome = decode_and_commit(ctx, tokenizer, slot.text.as_str()).await;
    ctx.release_payload(&mut slot);
    outcome
}

async fn decode_and_commit<E: PresenceEngine>(
    ctx: &PresenceContext<E>,
    tokenizer: &dyn FieldTokenizer,
    payload: &str,
) -> Result<(), ConfigError> {
    let (mut snapshot, bin_length) = {
        let engine = ctx.engine.lock().await;
        let config = engine.config().map_err(|e| {
            log::error!("Error while reading presence config: {:?}", e);
            ConfigError::Snapshot
        })?;
        (config, engine.bin_length())
    };

    decode_into(tokenizer, payload, &mut snapshot, bin_length)?;

    let mut engine = ctx.engine.lock().await;
    engine.set_config(&snapshot).map_err(|e| {
        log::error!("Error while setting new presence config: {:?}", e);
        ConfigError::Apply
    })?;
    engine.reset();
    log::info!("presence configuration updated and application resumed");
    Ok(())
}

/// Wait for one payload notice, apply it and queue its status reply.
pub async fn handle_next<E: PresenceEngine>(
    ctx: &PresenceContext<E>,
    tokenizer: &dyn FieldTokenizer,
) -> Result<(), ConfigError> {
    ctx.config_queue.receive().await;

    let outcome = apply_pending(ctx, tokenizer).await;
    if let Err(e) = &outcome {
        log::warn!("configuration rejected: {}", e);
    }

    ctx.publish_status(PublishCommand::publish(Topic::Status, status_message(&outcome)))
        .await;
    outcome
}

/// Consume configuration payloads forever.
pub async fn run<E: PresenceEngine>(ctx: &PresenceContext<E>, tokenizer: &dyn FieldTokenizer) {
    log::info!("Configuration consumer started");
    loop {
        let _ = handle_next(ctx, tokenizer).await;
    }
}
