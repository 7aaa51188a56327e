/// Remote configuration decoding.
///
/// A payload is a flat JSON object, e.g.
/// `{"mode":"micro_only","max_range":"2.5"}`. Values are strings or
/// numbers; numbers are handed on as their literal text. The tokenizer
/// splits the object into `(name, value)` pairs; each pair is looked up in
/// [`FIELDS`] and written into a snapshot of the engine configuration. Any
/// rejected field makes the whole payload invalid, but every field is still
/// visited so all problems are logged.
use core::fmt;

use heapless::String;
use serde::de::{DeserializeSeed, Deserializer, MapAccess, Visitor};

use crate::config::{
    Limits, PresenceConfig, PresenceMode, DISABLE_TOKEN, ENABLE_TOKEN, MACRO_THRESHOLD_LIMITS,
    MAX_RANGE_LIMITS, MICRO_THRESHOLD_LIMITS,
};
use crate::context::MAX_CONFIG_PAYLOAD;
use crate::error::{ConfigError, FieldError, FieldFault, TokenizeError};

/// Room for a full payload with every number wrapped in quotes.
const NORMALIZED_LEN: usize = 2 * MAX_CONFIG_PAYLOAD;

/// Characters that may continue a JSON number literal.
const NUMBER_CHARS: &str = "0123456789+-.eE";

/// Splits a payload into fields and hands each to `on_field` in order.
pub trait FieldTokenizer {
    fn for_each_field(
        &self,
        payload: &str,
        on_field: &mut dyn FnMut(&str, &str),
    ) -> Result<(), TokenizeError>;
}

/// [`FieldTokenizer`] backed by `serde_json_core`.
///
/// `serde_json_core` cannot deserialize a value of unknown type, so number
/// literals are first wrapped in quotes and every value is then read as a
/// borrowed string. Fields are reported while the object is parsed; a
/// syntax error later in the payload still fails the whole call.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTokenizer;

impl FieldTokenizer for JsonTokenizer {
    fn for_each_field(
        &self,
        payload: &str,
        on_field: &mut dyn FnMut(&str, &str),
    ) -> Result<(), TokenizeError> {
        let trimmed = payload.trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace());
        if trimmed.is_empty() {
            return Err(TokenizeError::Malformed);
        }

        let mut normalized: String<NORMALIZED_LEN> = String::new();
        quote_numbers(trimmed, &mut normalized)?;

        let mut de = serde_json_core::de::Deserializer::new(normalized.as_bytes(), None);
        FieldVisitor { on_field }
            .deserialize(&mut de)
            .map_err(|_| TokenizeError::Malformed)?;
        de.end().map_err(|_| TokenizeError::Malformed)?;
        Ok(())
    }
}

/// Copy `json` into `out`, wrapping every number literal outside a string
/// in double quotes.
fn quote_numbers<const N: usize>(json: &str, out: &mut String<N>) -> Result<(), TokenizeError> {
    let mut push = |c: char| out.push(c).map_err(|_| TokenizeError::Malformed);
    let mut in_string = false;
    let mut escaped = false;
    let mut in_number = false;

    for c in json.chars() {
        if in_number {
            if NUMBER_CHARS.contains(c) {
                push(c)?;
                continue;
            }
            push('"')?;
            in_number = false;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '-' || c.is_ascii_digit() {
            push('"')?;
            in_number = true;
        }
        push(c)?;
    }

    if in_number {
        push('"')?;
    }
    Ok(())
}

/// Walks a JSON object of string values, reporting each entry as it is read.
struct FieldVisitor<'f> {
    on_field: &'f mut dyn FnMut(&str, &str),
}

impl<'de> DeserializeSeed<'de> for FieldVisitor<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for FieldVisitor<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a flat object of string or number values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let on_field = self.on_field;
        while let Some((name, value)) = map.next_entry::<&'de str, &'de str>()? {
            on_field(name, value);
        }
        Ok(())
    }
}

// ── Field table ──────────────────────────────────────────────────────

/// Validates a raw value and writes it into the snapshot. The `f32` is the
/// engine's bin length in meters.
type ApplyFn = fn(&str, &mut PresenceConfig, f32) -> Result<(), FieldFault>;

/// One remotely writable parameter.
pub struct FieldSpec {
    pub name: &'static str,
    apply: ApplyFn,
}

/// Every parameter accepted over the configuration topic.
pub static FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "max_range",
        apply: apply_max_range,
    },
    FieldSpec {
        name: "macro_threshold",
        apply: apply_macro_threshold,
    },
    FieldSpec {
        name: "micro_threshold",
        apply: apply_micro_threshold,
    },
    FieldSpec {
        name: "bandpass_filter",
        apply: apply_bandpass_filter,
    },
    FieldSpec {
        name: "decimation_filter",
        apply: apply_decimation_filter,
    },
    FieldSpec {
        name: "mode",
        apply: apply_mode,
    },
];

fn parse_limited(value: &str, limits: Limits) -> Result<f32, FieldFault> {
    let parsed: f32 = value.trim().parse().map_err(|_| FieldFault::NotANumber)?;
    if limits.contains(parsed) {
        Ok(parsed)
    } else {
        Err(FieldFault::OutOfRange)
    }
}

fn parse_toggle(value: &str) -> Result<bool, FieldFault> {
    match value {
        ENABLE_TOKEN => Ok(true),
        DISABLE_TOKEN => Ok(false),
        _ => Err(FieldFault::BadToken),
    }
}

fn apply_max_range(
    value: &str,
    config: &mut PresenceConfig,
    bin_length: f32,
) -> Result<(), FieldFault> {
    let meters = parse_limited(value, MAX_RANGE_LIMITS)?;
    if !(bin_length > 0.0) {
        return Err(FieldFault::BinLength);
    }
    config.max_range_bin = (meters / bin_length) as i32;
    Ok(())
}

fn apply_macro_threshold(
    value: &str,
    config: &mut PresenceConfig,
    _: f32,
) -> Result<(), FieldFault> {
    config.macro_threshold = parse_limited(value, MACRO_THRESHOLD_LIMITS)?;
    Ok(())
}

fn apply_micro_threshold(
    value: &str,
    config: &mut PresenceConfig,
    _: f32,
) -> Result<(), FieldFault> {
    config.micro_threshold = parse_limited(value, MICRO_THRESHOLD_LIMITS)?;
    Ok(())
}

fn apply_bandpass_filter(
    value: &str,
    config: &mut PresenceConfig,
    _: f32,
) -> Result<(), FieldFault> {
    config.macro_fft_bandpass_filter_enabled = parse_toggle(value)?;
    Ok(())
}

fn apply_decimation_filter(
    value: &str,
    config: &mut PresenceConfig,
    _: f32,
) -> Result<(), FieldFault> {
    config.micro_fft_decimation_enabled = parse_toggle(value)?;
    Ok(())
}

fn apply_mode(
    value: &str,
    config: &mut PresenceConfig,
    _: f32,
) -> Result<(), FieldFault> {
    config.mode = PresenceMode::from_token(value).ok_or(FieldFault::BadToken)?;
    Ok(())
}

/// Validate one field and, if accepted, write it into `config`.
pub fn apply_field(
    name: &str,
    value: &str,
    config: &mut PresenceConfig,
    bin_length: f32,
) -> Result<(), FieldError> {
    let entry = FIELDS
        .iter()
        .find(|entry| entry.name == name)
        .ok_or(FieldError {
            field: None,
            fault: FieldFault::UnknownName,
        })?;
    (entry.apply)(value, config, bin_length).map_err(|fault| FieldError {
        field: Some(entry.name),
        fault,
    })?;
    log::info!("new {} value is: {}", entry.name, value);
    Ok(())
}

/// Decode a whole payload into `snapshot`.
///
/// On `Err` the snapshot may hold some accepted fields and must be
/// discarded. The error carries the first rejected field.
pub fn decode_into(
    tokenizer: &dyn FieldTokenizer,
    payload: &str,
    snapshot: &mut PresenceConfig,
    bin_length: f32,
) -> Result<(), ConfigError> {
    let mut first_error: Option<FieldError> = None;

    tokenizer
        .for_each_field(payload, &mut |name, value| {
            if let Err(err) = apply_field(name, value, snapshot, bin_length) {
                log::warn!("invalid configuration field {}", err);
                first_error.get_or_insert(err);
            }
        })
        .map_err(|e| {
            log::warn!("configuration payload rejected: {}", e);
            ConfigError::InvalidJson
        })?;

    match first_error {
        Some(err) => Err(ConfigError::InvalidField(err)),
        None => Ok(()),
    }
}
