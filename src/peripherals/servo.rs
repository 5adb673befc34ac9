//! Hobby-servo driver over any `embedded-hal` PWM channel.

use core::cmp::{max, min};
use embedded_hal::pwm::SetDutyCycle;
use fixed::FixedU16;
use fixed::types::extra::U4;

use crate::config::AxisLimits;
use crate::control::{AxisId, PositionOutput};

/// Servo signal timing (microseconds / whole degrees).
#[derive(Copy, Clone, Debug)]
pub struct ServoSpec {
    /// Full frame period (e.g. 20_000 for 50 Hz).
    pub frame_us: u32,

    /// Min pulse width (e.g. 500).
    pub pulse_min_us: u32,

    /// Max pulse width (e.g. 2500).
    pub pulse_max_us: u32,

    /// Angle corresponding to min pulse.
    pub angle_min_deg: u8,

    /// Angle corresponding to max pulse.
    pub angle_max_deg: u8,
}

impl ServoSpec {
    /// MakerHawk MG-995 DIGI Hi-Speed
    pub fn mg995() -> &'static Self {
        const MG995: ServoSpec = ServoSpec {
            frame_us: 20_000,
            pulse_min_us: 500,  // 0.5 ms (0 degree)
            pulse_max_us: 2500, // 2.5 ms (180 degree)
            angle_min_deg: 0,
            angle_max_deg: 180,
        };

        &MG995
    }

    /// TowerPro SG90 micro servo
    pub fn sg90() -> &'static Self {
        const SG90: ServoSpec = ServoSpec {
            frame_us: 20_000,
            pulse_min_us: 500,
            pulse_max_us: 2400,
            angle_min_deg: 0,
            angle_max_deg: 180,
        };

        &SG90
    }
}

#[derive(Debug, Clone)]
/// Servo driver configuration
pub struct ServoConfig {
    /// PWM top value (period - 1)
    pub top: u16,
    /// PWM divider (FixedU16 with 4 fractional bits)
    pub divider: FixedU16<U4>,
    /// Tick rate in Hz
    pub tick_hz: u32,

    /// Angle at `duty_min`
    pub angle_min: u8,
    /// Angle at `duty_max`
    pub angle_max: u8,

    /// Minimum duty cycle count
    pub duty_min: u16,
    /// Maximum duty cycle count
    pub duty_max: u16,
}

impl ServoConfig {
    /// Pre-compute servo timing for a PWM slice fed by `pwm_clock_hz`
    /// (125_000_000 on a stock RP2040).
    ///
    /// Edge-aligned PWM is assumed.
    pub fn new_precomputed(pwm_clock_hz: u32, spec: &ServoSpec) -> Self {
        // Sanity clamps
        let frame_us = max(1, spec.frame_us);
        let pulse_min_us = min(spec.pulse_min_us, frame_us.saturating_sub(1));
        let pulse_max_us = min(max(spec.pulse_max_us, pulse_min_us + 1), frame_us);

        // Pick a tick rate and divider so that TOP fits in u16.
        // 1 MHz (1 tick = 1 us) is preferred.
        let mut divider_q4: u32;
        let mut tick_hz: u32;
        let mut top: u32;

        let mut target_tick_hz: u32 = 1_000_000;

        // Frames longer than 65536us cannot use 1MHz with a u16 TOP.
        let max_tick_hz_for_top = ((u16::MAX as u64 + 1) * 1_000_000u64 / frame_us as u64) as u32;
        target_tick_hz = min(target_tick_hz, max(1, max_tick_hz_for_top));

        // divider_q4 ~= clock_hz * 16 / target_tick_hz
        divider_q4 = (((pwm_clock_hz as u64) * 16u64 + (target_tick_hz as u64 / 2))
            / (target_tick_hz as u64)) as u32;

        // Divider range is 1.0 (16 in Q4) to 255.9375 (255*16 + 15).
        divider_q4 = min(max(divider_q4, 16), 255 * 16 + 15);

        // Bump the divider until TOP fits (or the divider is maxed out).
        loop {
            tick_hz = ((pwm_clock_hz as u64) * 16u64 / divider_q4 as u64) as u32;
            let period_ticks = (frame_us as u64) * (tick_hz as u64) / 1_000_000u64;
            top = period_ticks.saturating_sub(1) as u32;

            if top <= u16::MAX as u32 || divider_q4 >= (255 * 16 + 15) {
                break;
            }
            divider_q4 += 1;
        }

        let top_u16 = min(top, u16::MAX as u32) as u16;
        let divider = FixedU16::<U4>::from_bits(divider_q4 as u16);

        let duty_min = us_to_counts(pulse_min_us, tick_hz, top_u16);
        let duty_max = us_to_counts(pulse_max_us, tick_hz, top_u16);

        Self {
            top: top_u16,
            divider,
            tick_hz,
            angle_min: spec.angle_min_deg,
            angle_max: spec.angle_max_deg,
            duty_min,
            duty_max,
        }
    }

    /// embassy-rp slice configuration matching this timing. Compare values
    /// start at zero, so the output stays idle until the first write.
    #[cfg(feature = "rp2040")]
    pub fn pwm_config(&self) -> embassy_rp::pwm::Config {
        let mut pwm_config = embassy_rp::pwm::Config::default();
        pwm_config.top = self.top;
        pwm_config.divider = self.divider;
        pwm_config
    }

    /// Duty count for an angle; angles outside the servo's range are clamped.
    pub fn duty_for(&self, angle_deg: u8) -> u16 {
        let (a0, a1) = (self.angle_min as u32, self.angle_max as u32);
        if a1 <= a0 {
            return self.duty_min;
        }

        let a = (angle_deg as u32).clamp(a0, a1);
        let (d0, d1) = (self.duty_min as u32, self.duty_max as u32);
        let span = a1 - a0;
        let duty = if d1 >= d0 {
            d0 + ((a - a0) * (d1 - d0) + span / 2) / span
        } else {
            d0 - ((a - a0) * (d0 - d1) + span / 2) / span
        };

        min(duty, self.top as u32) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoError {
    #[error("Failed to set duty cycle")]
    SetDutyCycle,
}

/// One axis servo bound to a PWM output.
pub struct Servo<P> {
    axis: AxisId,
    pwm: P,
    config: ServoConfig,
    limits: AxisLimits,
}

impl<P> Servo<P>
where
    P: SetDutyCycle,
{
    /// Bind `axis` to its PWM output. Nothing is driven until the first write.
    pub fn attach(axis: AxisId, pwm: P, config: ServoConfig, limits: AxisLimits) -> Self {
        info!(
            "{} servo attached: top={} duty={}..{}",
            axis, config.top, config.duty_min, config.duty_max
        );
        Self {
            axis,
            pwm,
            config,
            limits,
        }
    }

    /// Command a position. Out-of-range angles are clamped to the axis
    /// limits; the applied angle is returned.
    pub fn set_angle(&mut self, angle_deg: i32) -> Result<u8, ServoError> {
        let angle = self.limits.clamp(angle_deg);
        let duty = self.config.duty_for(angle);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|_| ServoError::SetDutyCycle)?;
        trace!("{} servo -> {} deg (duty {})", self.axis, angle, duty);
        Ok(angle)
    }
}

impl<P> PositionOutput for Servo<P>
where
    P: SetDutyCycle,
{
    fn write(&mut self, deg: u8) {
        // PWM faults are survivable: the next position write re-latches the duty.
        if let Err(e) = self.set_angle(i32::from(deg)) {
            error!("{} servo write failed: {}", self.axis, e);
        }
    }
}

fn us_to_counts(pulse_us: u32, tick_hz: u32, top: u16) -> u16 {
    // counts = pulse_us * tick_hz / 1_000_000, rounded
    let counts = ((pulse_us as u64) * (tick_hz as u64) + 500_000u64) / 1_000_000u64;
    let counts = min(counts as u32, top as u32);
    counts as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::{ErrorKind, ErrorType};

    const RP2040_CLOCK_HZ: u32 = 125_000_000;

    #[derive(Default)]
    struct FakePwm {
        duties: Vec<u16>,
    }

    impl ErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            20_000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duties.push(duty);
            Ok(())
        }
    }

    struct BrokenPwm;

    #[derive(Debug)]
    struct BrokenPwmError;

    impl embedded_hal::pwm::Error for BrokenPwmError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    impl ErrorType for BrokenPwm {
        type Error = BrokenPwmError;
    }

    impl SetDutyCycle for BrokenPwm {
        fn max_duty_cycle(&self) -> u16 {
            20_000
        }

        fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Self::Error> {
            Err(BrokenPwmError)
        }
    }

    #[test]
    fn mg995_timing_at_125mhz_uses_one_microsecond_ticks() {
        let config = ServoConfig::new_precomputed(RP2040_CLOCK_HZ, ServoSpec::mg995());
        assert_eq!(config.tick_hz, 1_000_000);
        assert_eq!(config.top, 19_999);
        assert_eq!(config.divider, FixedU16::<U4>::from_num(125));
        assert_eq!(config.duty_min, 500);
        assert_eq!(config.duty_max, 2500);
    }

    #[test]
    fn long_frames_raise_the_divider_to_fit_top() {
        let spec = ServoSpec {
            frame_us: 100_000,
            ..*ServoSpec::mg995()
        };
        let config = ServoConfig::new_precomputed(RP2040_CLOCK_HZ, &spec);
        assert!(config.tick_hz < 1_000_000);
        assert!(config.duty_min < config.duty_max);
    }

    #[test]
    fn duty_is_linear_in_angle() {
        let config = ServoConfig::new_precomputed(RP2040_CLOCK_HZ, ServoSpec::mg995());
        assert_eq!(config.duty_for(0), 500);
        assert_eq!(config.duty_for(90), 1500);
        assert_eq!(config.duty_for(180), 2500);
        assert_eq!(config.duty_for(45), 1000);
        assert_eq!(config.duty_for(255), 2500);
    }

    #[test]
    fn write_clamps_to_axis_limits() {
        let config = ServoConfig::new_precomputed(RP2040_CLOCK_HZ, ServoSpec::mg995());
        let mut servo = Servo::attach(
            AxisId::Yaw,
            FakePwm::default(),
            config,
            AxisLimits::new(45, 135),
        );

        assert_eq!(servo.set_angle(-20), Ok(45));
        assert_eq!(servo.set_angle(250), Ok(135));
        assert_eq!(servo.set_angle(100), Ok(100));
        assert_eq!(servo.pwm.duties, [1000, 2000, 1611]);
    }

    #[test]
    fn failed_write_is_reported() {
        let config = ServoConfig::new_precomputed(RP2040_CLOCK_HZ, ServoSpec::sg90());
        let mut servo = Servo::attach(AxisId::Pitch, BrokenPwm, config, AxisLimits::new(0, 180));

        assert_eq!(servo.set_angle(90), Err(ServoError::SetDutyCycle));
        // the trait path swallows the error
        PositionOutput::write(&mut servo, 90);
    }
}
