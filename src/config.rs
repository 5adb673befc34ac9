//! Compile-time configuration: axis limits, motion tuning, link parameters.

use fixed::types::U16F16;

/// Serial line coding the host is expected to open the port with.
pub const BAUD_RATE: u32 = 9600;

/// Maximum command length in bytes, terminator excluded.
pub const LINE_CAPACITY: usize = 20;

/// Longest outbound diagnostic line, prefix included.
pub const DIAGNOSTIC_CAPACITY: usize = 64;

/// Hold time after the homing write so the horns reach the midpoint.
pub const HOME_SETTLE_MS: u64 = 500;

/// How long boot waits for the host to open the port before carrying on.
pub const LINK_SETTLE_MS: u64 = 2_000;

pub const PITCH_LIMITS: AxisLimits = AxisLimits::new(0, 180);
pub const YAW_LIMITS: AxisLimits = AxisLimits::new(0, 180);

pub const DEFAULT_JITTER_DEADBAND_DEG: u8 = 1;
/// Per-tick rate limit. The default spans the whole travel, so moves are
/// shaped by the smoothing factor alone unless a lower limit is configured.
pub const DEFAULT_MAX_STEP_DEG: u8 = 180;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("Smoothing factor must be in (0, 1]")]
    SmoothingOutOfRange,
    #[error("Max step {max_step} must exceed the jitter deadband {deadband}")]
    StepWithinDeadband { max_step: u8, deadband: u8 },
}

/// Inclusive admissible range of one axis, in whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisLimits {
    pub min_deg: u8,
    pub max_deg: u8,
}

impl AxisLimits {
    /// Panics at compile time when used in a const with `min > max`.
    pub const fn new(min_deg: u8, max_deg: u8) -> Self {
        assert!(min_deg <= max_deg);
        Self { min_deg, max_deg }
    }

    /// Power-on position: midpoint of the range.
    pub const fn home(&self) -> u8 {
        self.min_deg + (self.max_deg - self.min_deg) / 2
    }

    pub fn clamp(&self, deg: i32) -> u8 {
        // both bounds fit in u8, so the cast cannot truncate
        deg.clamp(self.min_deg as i32, self.max_deg as i32) as u8
    }

    pub fn contains(&self, deg: u8) -> bool {
        (self.min_deg..=self.max_deg).contains(&deg)
    }
}

/// Motion smoother parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    smoothing: U16F16,
    deadband_deg: u8,
    max_step_deg: u8,
    tick_interval_ms: u64,
}

impl Tuning {
    pub fn new(
        smoothing: U16F16,
        deadband_deg: u8,
        max_step_deg: u8,
        tick_interval_ms: u64,
    ) -> Result<Self, ConfigError> {
        if smoothing == U16F16::ZERO || smoothing > U16F16::ONE {
            return Err(ConfigError::SmoothingOutOfRange);
        }
        if max_step_deg <= deadband_deg {
            return Err(ConfigError::StepWithinDeadband {
                max_step: max_step_deg,
                deadband: deadband_deg,
            });
        }
        Ok(Self {
            smoothing,
            deadband_deg,
            max_step_deg,
            tick_interval_ms,
        })
    }

    /// Fraction of the remaining error closed per tick.
    pub fn smoothing(&self) -> U16F16 {
        self.smoothing
    }

    pub fn deadband_deg(&self) -> u8 {
        self.deadband_deg
    }

    pub fn max_step_deg(&self) -> u8 {
        self.max_step_deg
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            smoothing: U16F16::from_bits(0x3333), // ~0.2
            deadband_deg: DEFAULT_JITTER_DEADBAND_DEG,
            max_step_deg: DEFAULT_MAX_STEP_DEG,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}
