/// Live configuration of the presence-detection engine.
///
/// Exactly one instance is live at a time, held inside the engine behind
/// the engine lock. Remote updates are decoded into a copy and committed
/// as a whole, so readers never observe a half-applied change.

/// Operating mode of the presence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceMode {
    MacroOnly,
    MicroOnly,
    MicroIfMacro,
    MicroAndMacro,
}

impl PresenceMode {
    /// All modes with their wire tokens.
    pub const TOKENS: [(&'static str, PresenceMode); 4] = [
        ("macro_only", PresenceMode::MacroOnly),
        ("micro_only", PresenceMode::MicroOnly),
        ("micro_if_macro", PresenceMode::MicroIfMacro),
        ("micro_and_macro", PresenceMode::MicroAndMacro),
    ];

    /// Parse a case-sensitive wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::TOKENS
            .iter()
            .find(|(name, _)| *name == token)
            .map(|&(_, mode)| mode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceMode::MacroOnly => "macro_only",
            PresenceMode::MicroOnly => "micro_only",
            PresenceMode::MicroIfMacro => "micro_if_macro",
            PresenceMode::MicroAndMacro => "micro_and_macro",
        }
    }
}

/// Inclusive bounds for a floating-point field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f32,
    pub max: f32,
}

impl Limits {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// True if `value` lies within `[min, max]`. NaN is never contained.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Maximum detection range in meters.
pub const MAX_RANGE_LIMITS: Limits = Limits::new(0.66, 5.0);
pub const MACRO_THRESHOLD_LIMITS: Limits = Limits::new(0.5, 2.0);
pub const MICRO_THRESHOLD_LIMITS: Limits = Limits::new(0.2, 50.0);

/// Toggle tokens, case-sensitive.
pub const ENABLE_TOKEN: &str = "enable";
pub const DISABLE_TOKEN: &str = "disable";

/// Parameters of the presence engine. Field names follow the engine's
/// own configuration record; only a subset is remotely writable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceConfig {
    /// Chirp bandwidth in Hz.
    pub bandwidth: f32,
    pub num_samples_per_chirp: u32,
    pub micro_fft_decimation_enabled: bool,
    pub micro_fft_size: u32,
    pub macro_threshold: f32,
    pub micro_threshold: f32,
    pub min_range_bin: i32,
    pub max_range_bin: i32,
    pub macro_compare_interval_ms: u32,
    pub macro_movement_validity_ms: u32,
    pub micro_movement_validity_ms: u32,
    pub macro_movement_confirmations: u32,
    pub macro_trigger_range: u32,
    pub mode: PresenceMode,
    pub macro_fft_bandpass_filter_enabled: bool,
    pub micro_movement_compare_idx: u32,
}

impl PresenceConfig {
    /// Power-on configuration the engine is allocated with.
    pub const fn new() -> Self {
        Self {
            bandwidth: 460.0e6,
            num_samples_per_chirp: crate::board::SAMPLES_PER_CHIRP as u32,
            micro_fft_decimation_enabled: false,
            micro_fft_size: 128,
            macro_threshold: 0.5,
            micro_threshold: 12.5,
            min_range_bin: 1,
            max_range_bin: 5,
            macro_compare_interval_ms: 250,
            macro_movement_validity_ms: 1000,
            micro_movement_validity_ms: 4000,
            macro_movement_confirmations: 0,
            macro_trigger_range: 1,
            mode: PresenceMode::MicroIfMacro,
            macro_fft_bandpass_filter_enabled: false,
            micro_movement_compare_idx: 5,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::new()
    }
}
