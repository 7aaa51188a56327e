/// Hardware constants for supported radar boards.
///
/// Each board module defines the frame geometry the sensor is programmed
/// with, selected at compile time via feature flags.

#[cfg(feature = "board-bgt60tr13c")]
mod hw {
    pub const SAMPLES_PER_CHIRP: usize = 128;
    pub const CHIRPS_PER_FRAME: usize = 16;
    pub const RX_ANTENNAS: usize = 1;
    pub const BOARD_NAME: &str = "bgt60tr13c";
}

#[cfg(all(feature = "board-bgt60utr11aip", not(feature = "board-bgt60tr13c")))]
mod hw {
    pub const SAMPLES_PER_CHIRP: usize = 64;
    pub const CHIRPS_PER_FRAME: usize = 32;
    pub const RX_ANTENNAS: usize = 1;
    pub const BOARD_NAME: &str = "bgt60utr11aip";
}

#[cfg(not(any(feature = "board-bgt60tr13c", feature = "board-bgt60utr11aip")))]
mod hw {
    pub const SAMPLES_PER_CHIRP: usize = 128;
    pub const CHIRPS_PER_FRAME: usize = 16;
    pub const RX_ANTENNAS: usize = 1;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// Samples in one sub-frame (one chirp across all receive antennas).
pub const SAMPLES_PER_SUBFRAME: usize = SAMPLES_PER_CHIRP * RX_ANTENNAS;

/// Raw samples delivered by the sensor FIFO per frame.
pub const SAMPLES_PER_FRAME: usize = SAMPLES_PER_SUBFRAME * CHIRPS_PER_FRAME;

/// 12-bit ADC full scale; raw samples are divided by this to normalize.
pub const ADC_FULL_SCALE: f32 = 4096.0;

/// Relative task priorities, highest first. The frame interrupt sits above
/// all of these. Firmware maps them onto executor or thread priorities.
///
/// The split only holds when each task runs on its own executor:
/// `DetectionLoop::run`, `configurator::run` and `Publisher::run` spawned
/// separately. `DetectionLoop::run_with_configurator` polls the consumer
/// inside the detection future, so both share `DETECTION`.
pub mod priority {
    pub const DETECTION: u8 = 3;
    pub const CONFIGURATION: u8 = 2;
    pub const PUBLISHER: u8 = 1;
}
