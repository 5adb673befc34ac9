use core::fmt::{self, Write};

use crate::config::{AxisLimits, DIAGNOSTIC_CAPACITY};
use crate::protocol::SerialLink;

/// Outbound informational lines. Every rendering starts with `# ` so hosts
/// can tell them apart from anything else on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    Banner,
    Usage { pitch: AxisLimits, yaw: AxisLimits },
    /// Targets in effect after a command, post-clamp.
    Target { pitch: u8, yaw: u8 },
    CommandTooLong,
    InvalidCommand,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::CommandTooLong | Diagnostic::InvalidCommand)
    }

    /// Render into a fixed buffer, send it, and mirror it to the log.
    pub fn emit<L: SerialLink>(&self, link: &mut L) {
        let mut line: heapless::String<DIAGNOSTIC_CAPACITY> = heapless::String::new();
        if write!(line, "{}", self).is_err() {
            warn!("Diagnostic truncated to {} bytes", DIAGNOSTIC_CAPACITY);
        }

        if self.is_error() {
            warn!("{}", line.as_str());
        } else {
            info!("{}", line.as_str());
        }
        link.write_line(&line);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Banner => write!(
                f,
                "# {} v{} ready",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            Diagnostic::Usage { pitch, yaw } => write!(
                f,
                "# Send <yaw> or <pitch>,<yaw>; pitch {}-{}, yaw {}-{}",
                pitch.min_deg, pitch.max_deg, yaw.min_deg, yaw.max_deg
            ),
            Diagnostic::Target { pitch, yaw } => {
                write!(f, "# Target: pitch={} yaw={}", pitch, yaw)
            }
            Diagnostic::CommandTooLong => f.write_str("# Error: Command too long"),
            Diagnostic::InvalidCommand => f.write_str("# Error: Invalid command"),
        }
    }
}
