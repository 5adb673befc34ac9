//! The cooperative control loop body.
//!
//! [`Controller::step`] is one tick: drain the link until one line is
//! complete, apply it, then run the smoother on both axes. The caller owns
//! pacing, so the same code runs under the embassy executor on hardware and
//! in plain host tests.

use crate::config::{AxisLimits, Tuning};
use crate::control::axis::{Axis, PositionOutput};
use crate::protocol::{Command, CommandError, Diagnostic, LineBuffer, LineError, SerialLink};

pub struct Controller<P, Y> {
    pitch: Axis,
    yaw: Axis,
    pitch_servo: P,
    yaw_servo: Y,
    line: LineBuffer,
    tuning: Tuning,
}

impl<P, Y> Controller<P, Y>
where
    P: PositionOutput,
    Y: PositionOutput,
{
    pub fn new(
        pitch_servo: P,
        pitch_limits: AxisLimits,
        yaw_servo: Y,
        yaw_limits: AxisLimits,
        tuning: Tuning,
    ) -> Self {
        Self {
            pitch: Axis::new(pitch_limits),
            yaw: Axis::new(yaw_limits),
            pitch_servo,
            yaw_servo,
            line: LineBuffer::new(),
            tuning,
        }
    }

    pub fn pitch(&self) -> &Axis {
        &self.pitch
    }

    pub fn yaw(&self) -> &Axis {
        &self.yaw
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn servos(&self) -> (&P, &Y) {
        (&self.pitch_servo, &self.yaw_servo)
    }

    /// Drive both axes straight to their midpoints.
    pub fn home(&mut self) {
        self.pitch.home(&mut self.pitch_servo);
        self.yaw.home(&mut self.yaw_servo);
        info!(
            "Homed: pitch={} yaw={}",
            self.pitch.current(),
            self.yaw.current()
        );
    }

    /// Boot banner and usage hint.
    pub fn announce<L: SerialLink>(&self, link: &mut L) {
        Diagnostic::Banner.emit(link);
        Diagnostic::Usage {
            pitch: self.pitch.limits(),
            yaw: self.yaw.limits(),
        }
        .emit(link);
    }

    /// Feed buffered bytes into the line buffer until one line completes.
    ///
    /// Bytes after that line stay queued on the link for the next tick.
    /// Rejected lines emit a diagnostic and yield `None`.
    pub fn poll<L: SerialLink>(&mut self, link: &mut L) -> Option<Command> {
        while let Some(byte) = link.read_byte() {
            let line = match self.line.push(byte) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(LineError::TooLong) => {
                    warn!("Dropped line longer than {} bytes", LineBuffer::CAPACITY);
                    Diagnostic::CommandTooLong.emit(link);
                    return None;
                }
            };

            return match Command::parse(&line) {
                Ok(command) => Some(command),
                Err(CommandError::Blank | CommandError::Comment) => {
                    debug!("Ignored blank or comment line");
                    None
                }
                Err(e) => {
                    warn!("Rejected command: {}", e);
                    Diagnostic::InvalidCommand.emit(link);
                    None
                }
            };
        }
        None
    }

    /// Apply a parsed command to the targets and echo what was applied.
    pub fn dispatch<L: SerialLink>(&mut self, command: Command, link: &mut L) {
        let (pitch, yaw) = match command {
            Command::Yaw(yaw) => (self.pitch.target(), self.yaw.set_target(yaw)),
            Command::PitchYaw { pitch, yaw } => {
                (self.pitch.set_target(pitch), self.yaw.set_target(yaw))
            }
        };
        Diagnostic::Target { pitch, yaw }.emit(link);
    }

    /// One smoother pass over both axes.
    pub fn tick(&mut self) {
        self.pitch.tick(&self.tuning, &mut self.pitch_servo);
        self.yaw.tick(&self.tuning, &mut self.yaw_servo);
    }

    /// One full loop iteration, minus the delay.
    pub fn step<L: SerialLink>(&mut self, link: &mut L) {
        if let Some(command) = self.poll(link) {
            self.dispatch(command, link);
        }
        self.tick();
    }
}
