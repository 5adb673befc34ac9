//! # pantilt
//!
//! Firmware core for a two-axis (pitch/yaw) hobby-servo mount driven by
//! line-oriented serial commands.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`config`] | Axis limits, smoother tuning, link constants |
//! | [`control`] | Axis state, motion smoother, control loop body |
//! | [`protocol`] | Line buffer, command grammar, `# ` diagnostics |
//! | [`peripherals`] | Servo PWM driver; USB CDC link with the `rp2040` feature |
//!
//! Everything outside `peripherals::usb_serial` is hardware-independent and
//! tested on the host with a plain `cargo test`.
#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible to the modules below
mod fmt;

pub mod config;
pub mod control;
pub mod peripherals;
pub mod protocol;

pub use config::*;
pub use control::*;
pub use peripherals::*;
pub use protocol::*;
