//! Per-axis state and the motion smoother.
//!
//! Each tick the axis closes a fixed fraction of the remaining error
//! (`smoothing`), never less than one step past the jitter deadband, never
//! more than `max_step`, and never past the target. A move that does not
//! clear the deadband is not written at all, so a settled axis produces no
//! PWM traffic.

use crate::config::{AxisLimits, Tuning};
use fixed::types::U16F16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisId {
    Pitch,
    Yaw,
}

/// Destination of position writes; the servo driver on hardware.
pub trait PositionOutput {
    fn write(&mut self, deg: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axis {
    limits: AxisLimits,
    current: u8,
    target: u8,
}

impl Axis {
    /// Axis parked at home: both `current` and `target` start at the midpoint.
    pub fn new(limits: AxisLimits) -> Self {
        let home = limits.home();
        Self {
            limits,
            current: home,
            target: home,
        }
    }

    pub fn limits(&self) -> AxisLimits {
        self.limits
    }

    /// Last position written to the servo.
    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    /// Clamp `deg` into the axis range and make it the new target.
    /// Returns the applied (post-clamp) value.
    pub fn set_target(&mut self, deg: i32) -> u8 {
        self.target = self.limits.clamp(deg);
        self.target
    }

    /// Write the home position directly, bypassing the smoother.
    pub fn home<O: PositionOutput>(&mut self, output: &mut O) {
        let home = self.limits.home();
        self.current = home;
        self.target = home;
        output.write(home);
    }

    /// Advance `current` one tick toward `target`.
    ///
    /// Returns the new position when it moved, `None` when the remaining
    /// error is within the deadband.
    pub fn advance(&mut self, tuning: &Tuning) -> Option<u8> {
        let distance = self.target.abs_diff(self.current);
        if distance == 0 {
            return None;
        }

        let deadband = tuning.deadband_deg();
        let filtered = (U16F16::from_num(distance) * tuning.smoothing())
            .int()
            .to_num::<u8>();
        let step = filtered
            .max(deadband.saturating_add(1))
            .min(tuning.max_step_deg())
            .min(distance);
        if step <= deadband {
            return None;
        }

        self.current = if self.target > self.current {
            self.current + step
        } else {
            self.current - step
        };
        Some(self.current)
    }

    /// One smoother tick: advance and write the new position if it changed.
    /// Returns whether a write was issued.
    pub fn tick<O: PositionOutput>(&mut self, tuning: &Tuning, output: &mut O) -> bool {
        match self.advance(tuning) {
            Some(position) => {
                output.write(position);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<u8>);

    impl PositionOutput for Recorder {
        fn write(&mut self, deg: u8) {
            self.0.push(deg);
        }
    }

    fn tuning(smoothing: f32, deadband: u8, max_step: u8) -> Tuning {
        Tuning::new(U16F16::from_num(smoothing), deadband, max_step, 20).unwrap()
    }

    fn run(axis: &mut Axis, tuning: &Tuning, out: &mut Recorder, ticks: usize) {
        for _ in 0..ticks {
            axis.tick(tuning, out);
        }
    }

    #[test]
    fn starts_at_home() {
        let axis = Axis::new(AxisLimits::new(0, 180));
        assert_eq!(axis.current(), 90);
        assert_eq!(axis.target(), 90);
    }

    #[test]
    fn settled_axis_does_not_write() {
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        run(&mut axis, &Tuning::default(), &mut out, 50);
        assert!(out.0.is_empty());
    }

    #[test]
    fn set_target_clamps() {
        let mut axis = Axis::new(AxisLimits::new(10, 170));
        assert_eq!(axis.set_target(-20), 10);
        assert_eq!(axis.set_target(250), 170);
        assert_eq!(axis.set_target(33), 33);
        assert_eq!(axis.current(), 90);
    }

    #[test]
    fn approach_is_monotone_and_converges() {
        let tuning = tuning(0.2, 1, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(120);

        let mut previous = axis.target().abs_diff(axis.current());
        for _ in 0..100 {
            axis.tick(&tuning, &mut out);
            let remaining = axis.target().abs_diff(axis.current());
            assert!(remaining <= previous);
            previous = remaining;
        }

        assert!(previous <= 1);
        assert_eq!(out.0.last().copied(), Some(axis.current()));
        assert!(out.0.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ascent_sequence_at_default_smoothing() {
        // the last four moves are floored steps raised to deadband + 1
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(120);
        run(&mut axis, &Tuning::default(), &mut out, 30);
        assert_eq!(out.0, [95, 99, 103, 106, 108, 110, 112, 114, 116, 118, 120]);
        assert_eq!(axis.current(), 120);
    }

    #[test]
    fn unit_smoothing_snaps_under_default_limits() {
        let defaults = Tuning::default();
        let tuning = Tuning::new(
            U16F16::ONE,
            defaults.deadband_deg(),
            defaults.max_step_deg(),
            defaults.tick_interval_ms(),
        )
        .unwrap();
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(0);
        assert!(axis.tick(&tuning, &mut out));
        assert_eq!(out.0, [0]);
    }

    #[test]
    fn every_write_clears_the_deadband() {
        let tuning = tuning(0.3, 2, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(3);
        run(&mut axis, &tuning, &mut out, 100);

        let mut last = 90u8;
        for &written in &out.0 {
            assert!(written.abs_diff(last) > 2);
            last = written;
        }
        assert!(axis.current().abs_diff(3) <= 2);
    }

    #[test]
    fn writes_stop_once_settled() {
        let tuning = tuning(0.2, 1, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(0);
        run(&mut axis, &tuning, &mut out, 200);

        let count = out.0.len();
        run(&mut axis, &tuning, &mut out, 50);
        assert_eq!(out.0.len(), count);
    }

    #[test]
    fn unit_smoothing_snaps_to_target() {
        let tuning = tuning(1.0, 1, 180);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(30);
        assert!(axis.tick(&tuning, &mut out));
        assert_eq!(axis.current(), 30);
        assert_eq!(out.0, [30]);
    }

    #[test]
    fn max_step_limits_each_move() {
        let tuning = tuning(1.0, 1, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(180);
        run(&mut axis, &tuning, &mut out, 3);
        assert_eq!(out.0, [100, 110, 120]);
    }

    #[test]
    fn never_overshoots_a_close_target() {
        let tuning = tuning(0.2, 1, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(92);
        assert!(axis.tick(&tuning, &mut out));
        assert_eq!(axis.current(), 92);
        assert!(!axis.tick(&tuning, &mut out));
    }

    #[test]
    fn error_inside_deadband_is_left_alone() {
        let tuning = tuning(0.5, 3, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(93);
        assert!(!axis.tick(&tuning, &mut out));
        assert_eq!(axis.current(), 90);
        assert!(out.0.is_empty());
    }

    #[test]
    fn retarget_mid_approach_reverses_on_next_tick() {
        let tuning = tuning(0.2, 1, 10);
        let mut axis = Axis::new(AxisLimits::new(0, 180));
        let mut out = Recorder::default();
        axis.set_target(180);
        axis.tick(&tuning, &mut out);
        let peak = axis.current();
        assert!(peak > 90);

        axis.set_target(0);
        axis.tick(&tuning, &mut out);
        assert!(axis.current() < peak);
    }

    #[test]
    fn home_writes_midpoint_directly() {
        let mut axis = Axis::new(AxisLimits::new(20, 160));
        let mut out = Recorder::default();
        axis.set_target(150);
        axis.home(&mut out);
        assert_eq!(out.0, [90]);
        assert_eq!(axis.current(), 90);
        assert_eq!(axis.target(), 90);
    }
}
